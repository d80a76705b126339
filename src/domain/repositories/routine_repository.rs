use chrono::{DateTime, Utc};

use crate::domain::entities::Routine;
use crate::domain::value_objects::RoutineId;
use crate::error::CoreResult;

/// Stateless lens over the durable store's `routines` table.
///
/// Implementations must enforce no invariants themselves beyond what the
/// store's schema enforces — validation belongs to [`Routine::validate`],
/// called by the use cases before a write reaches the repository.
pub trait RoutineRepository: Send + Sync {
    fn insert(&self, routine: &Routine) -> CoreResult<()>;
    fn update(&self, routine: &Routine) -> CoreResult<()>;
    fn get(&self, id: &RoutineId) -> CoreResult<Option<Routine>>;
    fn delete(&self, id: &RoutineId) -> CoreResult<()>;
    fn list_all(&self) -> CoreResult<Vec<Routine>>;

    /// Routines where `enabled AND NOT skip_next AND (snooze_until IS NULL
    /// OR snooze_until <= now)`, per SPEC_FULL.md §4.C7.
    fn list_eligible(&self, now: DateTime<Utc>) -> CoreResult<Vec<Routine>>;

    /// Sets `last_run_at`. Called best-effort by the runner on job success;
    /// a failure here must not fail the job.
    fn touch_last_run(&self, id: &RoutineId, at: DateTime<Utc>) -> CoreResult<()>;
}
