//! Job entity module
//!
//! A Job is a single scheduled occurrence of a routine: one row per instant
//! the routine is due to run, claimed exactly once by the runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{JobId, JobStatus, RoutineId, SceneExecutionId};

/// Builds the canonical idempotency key for a generated occurrence, per
/// SPEC_FULL.md §4.C7: `routine_id:RFC3339(scheduled_for)`.
pub fn idempotency_key(routine_id: &RoutineId, scheduled_for: DateTime<Utc>) -> String {
    format!("{routine_id}:{}", scheduled_for.to_rfc3339())
}

/// Builds the idempotency key for a manually-triggered job, per SPEC_FULL.md
/// §4.C8: `manual:{routine_id}:{nanos}`.
pub fn manual_idempotency_key(routine_id: &RoutineId, now: DateTime<Utc>) -> String {
    format!(
        "manual:{routine_id}:{}",
        now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp() * 1_000_000_000)
    )
}

/// A persisted plan to run one occurrence of a routine at a specific UTC
/// instant. See SPEC_FULL.md §3 for invariants and §4.C8 for the state
/// machine this entity's `status` field steps through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub job_id: JobId,
    pub routine_id: RoutineId,
    pub scheduled_for: DateTime<Utc>,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub scene_execution_id: Option<SceneExecutionId>,
    pub retry_after: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new_pending(
        routine_id: RoutineId,
        scheduled_for: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            routine_id,
            scheduled_for,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            scene_execution_id: None,
            retry_after: None,
            claimed_at: None,
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the job is due: its scheduled instant has passed and any
    /// backoff `retry_after` has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.scheduled_for > now {
            return false;
        }
        match self.retry_after {
            Some(retry_after) => retry_after <= now,
            None => true,
        }
    }

    /// Exponential backoff per SPEC_FULL.md §4.C8: `2^attempts` seconds,
    /// keyed to the pre-increment attempts value (so the first failure
    /// backs off 1s, the second 2s, the third 4s, ...).
    pub fn backoff_after(pre_increment_attempts: u32) -> chrono::Duration {
        let capped_exponent = pre_increment_attempts.min(20);
        chrono::Duration::seconds(1i64 << capped_exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_routine_and_rfc3339_instant() {
        let routine_id = RoutineId::from("r-1");
        let when = DateTime::parse_from_rfc3339("2024-03-04T17:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            idempotency_key(&routine_id, when),
            "r-1:2024-03-04T17:00:00+00:00"
        );
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        assert_eq!(Job::backoff_after(0), chrono::Duration::seconds(1));
        assert_eq!(Job::backoff_after(1), chrono::Duration::seconds(2));
        assert_eq!(Job::backoff_after(2), chrono::Duration::seconds(4));
    }

    #[test]
    fn is_due_respects_retry_after() {
        let mut job = Job::new_pending(RoutineId::new(), Utc::now() - chrono::Duration::seconds(5), None);
        let now = Utc::now();
        assert!(job.is_due(now));
        job.retry_after = Some(now + chrono::Duration::seconds(30));
        assert!(!job.is_due(now));
    }

    #[test]
    fn is_due_respects_scheduled_for_in_future() {
        let job = Job::new_pending(RoutineId::new(), Utc::now() + chrono::Duration::minutes(5), None);
        assert!(!job.is_due(Utc::now()));
    }
}
