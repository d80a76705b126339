use std::sync::{Arc, Mutex};

use rusqlite::{params, OptionalExtension};

use crate::domain::entities::SceneExecution;
use crate::domain::repositories::SceneExecutionRepository;
use crate::domain::value_objects::{SceneExecutionId, SceneExecutionStatus, SceneId};
use crate::error::CoreResult;
use crate::infrastructure::timefmt;

pub struct SqliteSceneExecutionRepository {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteSceneExecutionRepository {
    pub fn new(conn: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self { conn }
    }

    fn row_to_execution(row: &rusqlite::Row) -> rusqlite::Result<SceneExecution> {
        let status: String = row.get("status")?;
        let started_at: String = row.get("started_at")?;
        let ended_at: Option<String> = row.get("ended_at")?;
        let steps_json: String = row.get("steps")?;
        let verification_json: Option<String> = row.get("verification")?;

        Ok(SceneExecution {
            scene_execution_id: SceneExecutionId::from_string(row.get("scene_execution_id")?),
            scene_id: SceneId::from_string(row.get("scene_id")?),
            idempotency_key: row.get("idempotency_key")?,
            coordinator_used: row.get("coordinator_used")?,
            status: serde_json::from_value(serde_json::Value::String(status.clone()))
                .unwrap_or(SceneExecutionStatus::Starting),
            started_at: timefmt::parse(&started_at).unwrap_or_else(|_| chrono::Utc::now()),
            ended_at: ended_at.as_deref().and_then(|s| timefmt::parse(s).ok()),
            steps: serde_json::from_str(&steps_json).unwrap_or_default(),
            verification: verification_json.and_then(|s| serde_json::from_str(&s).ok()),
            error: row.get("error")?,
        })
    }
}

impl SceneExecutionRepository for SqliteSceneExecutionRepository {
    fn insert(&self, execution: &SceneExecution) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scene_executions (
                scene_execution_id, scene_id, idempotency_key, coordinator_used, status,
                started_at, ended_at, steps, verification, error
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                execution.scene_execution_id.as_str(),
                execution.scene_id.as_str(),
                execution.idempotency_key,
                execution.coordinator_used,
                serde_json::to_value(execution.status)?.as_str().unwrap_or_default(),
                timefmt::format(execution.started_at),
                execution.ended_at.map(timefmt::format),
                serde_json::to_string(&execution.steps)?,
                execution
                    .verification
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                execution.error,
            ],
        )?;
        Ok(())
    }

    fn update(&self, execution: &SceneExecution) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scene_executions SET coordinator_used=?2, status=?3, ended_at=?4, steps=?5,
             verification=?6, error=?7 WHERE scene_execution_id=?1",
            params![
                execution.scene_execution_id.as_str(),
                execution.coordinator_used,
                serde_json::to_value(execution.status)?.as_str().unwrap_or_default(),
                execution.ended_at.map(timefmt::format),
                serde_json::to_string(&execution.steps)?,
                execution
                    .verification
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                execution.error,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &SceneExecutionId) -> CoreResult<Option<SceneExecution>> {
        let conn = self.conn.lock().unwrap();
        let execution = conn
            .query_row(
                "SELECT * FROM scene_executions WHERE scene_execution_id = ?1",
                params![id.as_str()],
                Self::row_to_execution,
            )
            .optional()?;
        Ok(execution)
    }

    fn get_by_idempotency_key(&self, key: &str) -> CoreResult<Option<SceneExecution>> {
        let conn = self.conn.lock().unwrap();
        let execution = conn
            .query_row(
                "SELECT * FROM scene_executions WHERE idempotency_key = ?1",
                params![key],
                Self::row_to_execution,
            )
            .optional()?;
        Ok(execution)
    }

    fn list_for_scene(&self, scene_id: &SceneId, limit: u32) -> CoreResult<Vec<SceneExecution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM scene_executions WHERE scene_id = ?1 ORDER BY started_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![scene_id.as_str(), limit], Self::row_to_execution)?;
        let mut executions = Vec::new();
        for row in rows {
            executions.push(row?);
        }
        Ok(executions)
    }
}
