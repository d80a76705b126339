use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::domain::entities::Job;
use crate::domain::repositories::JobRepository;
use crate::domain::value_objects::{JobId, JobStatus, RoutineId, SceneExecutionId};
use crate::error::CoreResult;
use crate::infrastructure::timefmt;

pub struct SqliteJobRepository {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteJobRepository {
    pub fn new(conn: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self { conn }
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let status: String = row.get("status")?;
        let scheduled_for: String = row.get("scheduled_for")?;
        let retry_after: Option<String> = row.get("retry_after")?;
        let claimed_at: Option<String> = row.get("claimed_at")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        let parse_time = |raw: &str| -> DateTime<Utc> { timefmt::parse(raw).unwrap_or_else(|_| Utc::now()) };

        Ok(Job {
            job_id: JobId::from_string(row.get("job_id")?),
            routine_id: RoutineId::from_string(row.get("routine_id")?),
            scheduled_for: parse_time(&scheduled_for),
            status: JobStatus::parse(&status).unwrap_or(JobStatus::Pending),
            attempts: row.get::<_, i64>("attempts")? as u32,
            last_error: row.get("last_error")?,
            scene_execution_id: row
                .get::<_, Option<String>>("scene_execution_id")?
                .map(SceneExecutionId::from_string),
            retry_after: retry_after.as_deref().map(parse_time),
            claimed_at: claimed_at.as_deref().map(parse_time),
            idempotency_key: row.get("idempotency_key")?,
            created_at: parse_time(&created_at),
            updated_at: parse_time(&updated_at),
        })
    }
}

impl JobRepository for SqliteJobRepository {
    fn insert(&self, job: &Job) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs (
                job_id, routine_id, scheduled_for, status, attempts, last_error,
                scene_execution_id, retry_after, claimed_at, idempotency_key, created_at, updated_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                job.job_id.as_str(),
                job.routine_id.as_str(),
                timefmt::format(job.scheduled_for),
                job.status.as_str(),
                job.attempts,
                job.last_error,
                job.scene_execution_id.as_ref().map(|id| id.as_str().to_string()),
                job.retry_after.map(timefmt::format),
                job.claimed_at.map(timefmt::format),
                job.idempotency_key,
                timefmt::format(job.created_at),
                timefmt::format(job.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &JobId) -> CoreResult<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        let job = conn
            .query_row("SELECT * FROM jobs WHERE job_id = ?1", params![id.as_str()], Self::row_to_job)
            .optional()?;
        Ok(job)
    }

    fn get_by_idempotency_key(&self, key: &str) -> CoreResult<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        let job = conn
            .query_row(
                "SELECT * FROM jobs WHERE idempotency_key = ?1",
                params![key],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    fn list_for_routine(&self, routine_id: &RoutineId) -> CoreResult<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE routine_id = ?1 ORDER BY scheduled_for DESC")?;
        let rows = stmt.query_map(params![routine_id.as_str()], Self::row_to_job)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }

    fn list_pending(&self, limit: u32) -> CoreResult<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = 'PENDING' ORDER BY scheduled_for ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], Self::row_to_job)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }

    fn list_stale_claims(&self, status: JobStatus, older_than: DateTime<Utc>) -> CoreResult<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = ?1 AND claimed_at IS NOT NULL AND claimed_at < ?2",
        )?;
        let rows = stmt.query_map(params![status.as_str(), timefmt::format(older_than)], Self::row_to_job)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }

    fn claim(&self, id: &JobId, now: DateTime<Utc>) -> CoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE jobs SET status = 'CLAIMED', claimed_at = ?2, updated_at = ?2
             WHERE job_id = ?1 AND status = 'PENDING'",
            params![id.as_str(), timefmt::format(now)],
        )?;
        Ok(affected == 1)
    }

    fn start(&self, id: &JobId) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = 'RUNNING', updated_at = ?2 WHERE job_id = ?1 AND status = 'CLAIMED'",
            params![id.as_str(), timefmt::format(Utc::now())],
        )?;
        Ok(())
    }

    fn complete(&self, id: &JobId, scene_execution_id: SceneExecutionId) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = 'COMPLETED', scene_execution_id = ?2, updated_at = ?3
             WHERE job_id = ?1",
            params![id.as_str(), scene_execution_id.as_str(), timefmt::format(Utc::now())],
        )?;
        Ok(())
    }

    fn fail(&self, id: &JobId, message: &str, can_retry: bool, retry_after: Option<DateTime<Utc>>) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = timefmt::format(Utc::now());
        if can_retry {
            conn.execute(
                "UPDATE jobs SET status = 'PENDING', attempts = attempts + 1, last_error = ?2,
                 claimed_at = NULL, retry_after = ?3, updated_at = ?4 WHERE job_id = ?1",
                params![id.as_str(), message, retry_after.map(timefmt::format), now],
            )?;
        } else {
            conn.execute(
                "UPDATE jobs SET status = 'FAILED', attempts = attempts + 1, last_error = ?2, updated_at = ?3
                 WHERE job_id = ?1",
                params![id.as_str(), message, now],
            )?;
        }
        Ok(())
    }
}
