use chrono::{DateTime, Utc};

use crate::domain::entities::Job;
use crate::domain::value_objects::{JobId, RoutineId, SceneExecutionId};
use crate::error::CoreResult;

/// Stateless lens over the durable store's `jobs` table.
///
/// The atomic [`JobRepository::claim`] is the linchpin of the at-most-once
/// property in SPEC_FULL.md §8: it is a single conditional update, not a
/// read-then-write, so two runner ticks racing the same job never both
/// succeed.
pub trait JobRepository: Send + Sync {
    /// Inserts a new PENDING job. Must surface a `CoreError::Conflict` (not
    /// panic or silently overwrite) on a uniqueness violation of
    /// `(routine_id, scheduled_for)` or `idempotency_key` — the Job
    /// Generator relies on catching that specific error to implement its
    /// duplicate-swallowing idempotency.
    fn insert(&self, job: &Job) -> CoreResult<()>;

    fn get(&self, id: &JobId) -> CoreResult<Option<Job>>;
    fn get_by_idempotency_key(&self, key: &str) -> CoreResult<Option<Job>>;
    fn list_for_routine(&self, routine_id: &RoutineId) -> CoreResult<Vec<Job>>;

    /// Up to `limit` PENDING jobs ordered by `scheduled_for` ascending.
    fn list_pending(&self, limit: u32) -> CoreResult<Vec<Job>>;

    /// Jobs stuck in CLAIMED or RUNNING with `claimed_at` older than the
    /// stale-claim timeout, for startup crash recovery.
    fn list_stale_claims(&self, status: crate::domain::value_objects::JobStatus, older_than: DateTime<Utc>) -> CoreResult<Vec<Job>>;

    /// Atomically transitions PENDING -> CLAIMED, setting `claimed_at`.
    /// Returns `true` if this call performed the transition, `false` if
    /// the job was no longer PENDING (already claimed by another tick).
    fn claim(&self, id: &JobId, now: DateTime<Utc>) -> CoreResult<bool>;

    /// Transitions CLAIMED -> RUNNING.
    fn start(&self, id: &JobId) -> CoreResult<()>;

    /// Transitions RUNNING -> COMPLETED, recording the resulting execution.
    fn complete(&self, id: &JobId, scene_execution_id: SceneExecutionId) -> CoreResult<()>;

    /// Fails a job per SPEC_FULL.md §4.C8: if `can_retry`, returns it to
    /// PENDING with `claimed_at` cleared and `retry_after` set; otherwise
    /// moves it to the terminal FAILED state. Either way, `attempts` is
    /// incremented and `last_error` recorded.
    fn fail(&self, id: &JobId, message: &str, can_retry: bool, retry_after: Option<DateTime<Utc>>) -> CoreResult<()>;
}
