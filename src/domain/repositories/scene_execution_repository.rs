use crate::domain::entities::SceneExecution;
use crate::domain::value_objects::SceneExecutionId;
use crate::error::CoreResult;

/// Stateless lens over the durable store's `scene_executions` table.
pub trait SceneExecutionRepository: Send + Sync {
    fn insert(&self, execution: &SceneExecution) -> CoreResult<()>;
    fn update(&self, execution: &SceneExecution) -> CoreResult<()>;
    fn get(&self, id: &SceneExecutionId) -> CoreResult<Option<SceneExecution>>;

    /// Used by the Scene Executor's idempotency check (SPEC_FULL.md §4.C11):
    /// a prior execution sharing the same key is returned rather than
    /// re-running the scene.
    fn get_by_idempotency_key(&self, key: &str) -> CoreResult<Option<SceneExecution>>;

    fn list_for_scene(&self, scene_id: &crate::domain::value_objects::SceneId, limit: u32) -> CoreResult<Vec<SceneExecution>>;
}
