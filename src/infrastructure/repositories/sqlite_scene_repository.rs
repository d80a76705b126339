use std::sync::{Arc, Mutex};

use rusqlite::{params, OptionalExtension};

use crate::domain::entities::Scene;
use crate::domain::repositories::SceneRepository;
use crate::domain::value_objects::SceneId;
use crate::error::CoreResult;

pub struct SqliteSceneRepository {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteSceneRepository {
    pub fn new(conn: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self { conn }
    }

    fn row_to_scene(row: &rusqlite::Row) -> rusqlite::Result<Scene> {
        let members_json: String = row.get(4)?;
        Ok(Scene {
            scene_id: SceneId::from_string(row.get::<_, String>(0)?),
            name: row.get(1)?,
            coordinator_preference: serde_json::from_str(&row.get::<_, String>(2)?)
                .unwrap_or(crate::domain::entities::CoordinatorPreference::ArcFirst),
            fallback_policy: row.get(3)?,
            members: serde_json::from_str(&members_json).unwrap_or_default(),
            volume_ramp: row.get::<_, Option<i64>>(5)?.map(|v| v != 0),
            teardown: row.get::<_, Option<i64>>(6)?.map(|v| v != 0),
        })
    }
}

impl SceneRepository for SqliteSceneRepository {
    fn insert(&self, scene: &Scene) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scenes (scene_id, name, coordinator_preference, fallback_policy, members, volume_ramp, teardown)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                scene.scene_id.as_str(),
                scene.name,
                serde_json::to_string(&scene.coordinator_preference)?,
                scene.fallback_policy,
                serde_json::to_string(&scene.members)?,
                scene.volume_ramp.map(|v| v as i64),
                scene.teardown.map(|v| v as i64),
            ],
        )?;
        Ok(())
    }

    fn update(&self, scene: &Scene) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scenes SET name = ?2, coordinator_preference = ?3, fallback_policy = ?4,
             members = ?5, volume_ramp = ?6, teardown = ?7 WHERE scene_id = ?1",
            params![
                scene.scene_id.as_str(),
                scene.name,
                serde_json::to_string(&scene.coordinator_preference)?,
                scene.fallback_policy,
                serde_json::to_string(&scene.members)?,
                scene.volume_ramp.map(|v| v as i64),
                scene.teardown.map(|v| v as i64),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &SceneId) -> CoreResult<Option<Scene>> {
        let conn = self.conn.lock().unwrap();
        let scene = conn
            .query_row(
                "SELECT scene_id, name, coordinator_preference, fallback_policy, members, volume_ramp, teardown
                 FROM scenes WHERE scene_id = ?1",
                params![id.as_str()],
                Self::row_to_scene,
            )
            .optional()?;
        Ok(scene)
    }

    fn delete(&self, id: &SceneId) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM scenes WHERE scene_id = ?1", params![id.as_str()])?;
        Ok(())
    }

    fn list_all(&self) -> CoreResult<Vec<Scene>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT scene_id, name, coordinator_preference, fallback_policy, members, volume_ramp, teardown FROM scenes",
        )?;
        let rows = stmt.query_map([], Self::row_to_scene)?;
        let mut scenes = Vec::new();
        for row in rows {
            scenes.push(row?);
        }
        Ok(scenes)
    }
}
