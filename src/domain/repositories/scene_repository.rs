use crate::domain::entities::Scene;
use crate::domain::value_objects::SceneId;
use crate::error::CoreResult;

/// Stateless lens over the durable store's `scenes` table.
pub trait SceneRepository: Send + Sync {
    fn insert(&self, scene: &Scene) -> CoreResult<()>;
    fn update(&self, scene: &Scene) -> CoreResult<()>;
    fn get(&self, id: &SceneId) -> CoreResult<Option<Scene>>;
    fn delete(&self, id: &SceneId) -> CoreResult<()>;
    fn list_all(&self) -> CoreResult<Vec<Scene>>;
}
