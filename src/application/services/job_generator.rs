//! Job Generator (C7)
//!
//! Periodic tick that turns eligible routines into due [`Job`] rows: compute
//! `next_run`, fold in the routine's holiday policy, and insert idempotently.
//! Swallowing the uniqueness conflict on insert — rather than checking first
//! — is what makes `generate_due` safe to call twice for the same tick
//! (SPEC_FULL.md §8's idempotence law).

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{error, warn};

use crate::domain::entities::{job::idempotency_key, Job, Routine};
use crate::domain::repositories::{HolidayRepository, JobRepository, RoutineRepository};
use crate::domain::value_objects::HolidayBehavior;
use crate::error::{CoreError, CoreResult};

use super::clock::Clock;
use super::schedule_calculator::{self, next_run};

const DELAY_SCAN_DAYS: i64 = 30;

pub struct JobGenerator {
    clock: Arc<dyn Clock>,
    routines: Arc<dyn RoutineRepository>,
    jobs: Arc<dyn JobRepository>,
    holidays: Arc<dyn HolidayRepository>,
}

impl JobGenerator {
    pub fn new(
        clock: Arc<dyn Clock>,
        routines: Arc<dyn RoutineRepository>,
        jobs: Arc<dyn JobRepository>,
        holidays: Arc<dyn HolidayRepository>,
    ) -> Self {
        Self {
            clock,
            routines,
            jobs,
            holidays,
        }
    }

    /// Inserts zero or more jobs for the routines due right now, returning
    /// the count actually inserted (duplicates across ticks are not
    /// counted).
    pub fn generate_due(&self) -> CoreResult<u32> {
        let now = self.clock.now();
        let routines = self.routines.list_eligible(now)?;
        let mut inserted = 0u32;

        for routine in routines {
            match self.generate_for_routine(&routine, now) {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(routine_id = %routine.routine_id, error = %err, "job generation failed for routine");
                }
            }
        }

        Ok(inserted)
    }

    fn generate_for_routine(&self, routine: &Routine, now: DateTime<Utc>) -> CoreResult<bool> {
        let Some(next) = next_run(routine, now)? else {
            return Ok(false);
        };

        let scheduled_for = match self.apply_holiday_policy(routine, next)? {
            Some(when) => when,
            None => return Ok(false),
        };

        let key = idempotency_key(&routine.routine_id, scheduled_for);
        let job = Job::new_pending(routine.routine_id.clone(), scheduled_for, Some(key));

        match self.jobs.insert(&job) {
            Ok(()) => Ok(true),
            Err(CoreError::Conflict(_)) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Applies §4.C7's holiday policy to a computed `next_run` instant.
    /// Returns `None` when SKIP suppresses the occurrence entirely.
    fn apply_holiday_policy(&self, routine: &Routine, next: DateTime<Utc>) -> CoreResult<Option<DateTime<Utc>>> {
        match routine.holiday_behavior {
            HolidayBehavior::Run => Ok(Some(next)),
            HolidayBehavior::Skip => {
                let tz = schedule_calculator::resolve_tz(routine)?;
                let local_date = next.with_timezone(&tz).date_naive();
                if self.holidays.is_holiday(local_date)? {
                    Ok(None)
                } else {
                    Ok(Some(next))
                }
            }
            HolidayBehavior::Delay => {
                let tz = schedule_calculator::resolve_tz(routine)?;
                let local_date = next.with_timezone(&tz).date_naive();
                if !self.holidays.is_holiday(local_date)? {
                    return Ok(Some(next));
                }

                let local_time = next.with_timezone(&tz).time();
                let mut candidate_date = local_date;
                for _ in 0..DELAY_SCAN_DAYS {
                    candidate_date += ChronoDuration::days(1);
                    if !self.holidays.is_holiday(candidate_date)? {
                        let naive = candidate_date.and_time(local_time);
                        return Ok(Some(schedule_calculator::resolve_local(&tz, naive)));
                    }
                }

                warn!(routine_id = %routine.routine_id, "holiday DELAY exhausted 30-day scan window");
                Err(CoreError::Internal(format!(
                    "no non-holiday day found within {DELAY_SCAN_DAYS} days for routine {}",
                    routine.routine_id
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::application::services::clock::FixedClock;
    use crate::domain::entities::Holiday;
    use crate::domain::value_objects::{LocalTimeOfDay, RoutineId, SceneId, ScheduleType};

    #[derive(Default)]
    struct InMemoryRoutines(Mutex<Vec<Routine>>);
    impl RoutineRepository for InMemoryRoutines {
        fn insert(&self, routine: &Routine) -> CoreResult<()> {
            self.0.lock().unwrap().push(routine.clone());
            Ok(())
        }
        fn update(&self, _: &Routine) -> CoreResult<()> {
            Ok(())
        }
        fn get(&self, id: &RoutineId) -> CoreResult<Option<Routine>> {
            Ok(self.0.lock().unwrap().iter().find(|r| &r.routine_id == id).cloned())
        }
        fn delete(&self, _: &RoutineId) -> CoreResult<()> {
            Ok(())
        }
        fn list_all(&self) -> CoreResult<Vec<Routine>> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn list_eligible(&self, now: DateTime<Utc>) -> CoreResult<Vec<Routine>> {
            Ok(self.0.lock().unwrap().iter().filter(|r| r.is_eligible(now)).cloned().collect())
        }
        fn touch_last_run(&self, _: &RoutineId, _: DateTime<Utc>) -> CoreResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryJobs(Mutex<Vec<Job>>);
    impl JobRepository for InMemoryJobs {
        fn insert(&self, job: &Job) -> CoreResult<()> {
            let mut jobs = self.0.lock().unwrap();
            let dup = jobs
                .iter()
                .any(|j| j.routine_id == job.routine_id && j.scheduled_for == job.scheduled_for);
            if dup {
                return Err(CoreError::Conflict("duplicate occurrence".to_string()));
            }
            jobs.push(job.clone());
            Ok(())
        }
        fn get(&self, id: &crate::domain::value_objects::JobId) -> CoreResult<Option<Job>> {
            Ok(self.0.lock().unwrap().iter().find(|j| &j.job_id == id).cloned())
        }
        fn get_by_idempotency_key(&self, key: &str) -> CoreResult<Option<Job>> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.idempotency_key.as_deref() == Some(key))
                .cloned())
        }
        fn list_for_routine(&self, routine_id: &RoutineId) -> CoreResult<Vec<Job>> {
            Ok(self.0.lock().unwrap().iter().filter(|j| &j.routine_id == routine_id).cloned().collect())
        }
        fn list_pending(&self, _: u32) -> CoreResult<Vec<Job>> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn list_stale_claims(
            &self,
            _: crate::domain::value_objects::JobStatus,
            _: DateTime<Utc>,
        ) -> CoreResult<Vec<Job>> {
            Ok(Vec::new())
        }
        fn claim(&self, _: &crate::domain::value_objects::JobId, _: DateTime<Utc>) -> CoreResult<bool> {
            Ok(true)
        }
        fn start(&self, _: &crate::domain::value_objects::JobId) -> CoreResult<()> {
            Ok(())
        }
        fn complete(
            &self,
            _: &crate::domain::value_objects::JobId,
            _: crate::domain::value_objects::SceneExecutionId,
        ) -> CoreResult<()> {
            Ok(())
        }
        fn fail(&self, _: &crate::domain::value_objects::JobId, _: &str, _: bool, _: Option<DateTime<Utc>>) -> CoreResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryHolidays(Mutex<HashMap<NaiveDate, Holiday>>);
    impl HolidayRepository for InMemoryHolidays {
        fn insert(&self, holiday: &Holiday) -> CoreResult<()> {
            self.0.lock().unwrap().insert(holiday.date, holiday.clone());
            Ok(())
        }
        fn delete(&self, date: NaiveDate) -> CoreResult<()> {
            self.0.lock().unwrap().remove(&date);
            Ok(())
        }
        fn get_by_date(&self, date: NaiveDate) -> CoreResult<Option<Holiday>> {
            Ok(self.0.lock().unwrap().get(&date).cloned())
        }
        fn is_holiday(&self, date: NaiveDate) -> CoreResult<bool> {
            Ok(self.0.lock().unwrap().contains_key(&date))
        }
        fn list_range(&self, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Holiday>> {
            Ok(self.0.lock().unwrap().values().filter(|h| h.date >= from && h.date <= to).cloned().collect())
        }
    }

    fn daily_routine(holiday_behavior: HolidayBehavior) -> Routine {
        let mut r = Routine::new(
            "Morning Jazz".to_string(),
            "America/Los_Angeles".to_string(),
            ScheduleType::Weekly,
            SceneId::new(),
        );
        r.schedule_time = Some(LocalTimeOfDay::parse("09:00").unwrap());
        r.schedule_weekdays = (0..=6).collect();
        r.holiday_behavior = holiday_behavior;
        r
    }

    fn harness(
        now: DateTime<Utc>,
        routine: Routine,
        holidays: Vec<Holiday>,
    ) -> (JobGenerator, Arc<InMemoryJobs>) {
        let routines = Arc::new(InMemoryRoutines::default());
        routines.insert(&routine).unwrap();
        let jobs = Arc::new(InMemoryJobs::default());
        let holiday_repo = Arc::new(InMemoryHolidays::default());
        for h in holidays {
            holiday_repo.insert(&h).unwrap();
        }
        let clock = Arc::new(FixedClock(now));
        (JobGenerator::new(clock, routines, jobs.clone(), holiday_repo), jobs)
    }

    #[test]
    fn inserts_a_job_for_an_eligible_routine() {
        let now = DateTime::parse_from_rfc3339("2024-03-04T00:00:00Z").unwrap().with_timezone(&Utc);
        let (generator, jobs) = harness(now, daily_routine(HolidayBehavior::Run), vec![]);
        let count = generator.generate_due().unwrap();
        assert_eq!(count, 1);
        assert_eq!(jobs.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn generate_due_is_idempotent_across_repeated_ticks() {
        let now = DateTime::parse_from_rfc3339("2024-03-04T00:00:00Z").unwrap().with_timezone(&Utc);
        let (generator, jobs) = harness(now, daily_routine(HolidayBehavior::Run), vec![]);
        generator.generate_due().unwrap();
        let second = generator.generate_due().unwrap();
        assert_eq!(second, 0);
        assert_eq!(jobs.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn holiday_skip_suppresses_job_on_a_holiday() {
        let now = DateTime::parse_from_rfc3339("2024-07-03T23:30:00Z").unwrap().with_timezone(&Utc);
        let mut routine = daily_routine(HolidayBehavior::Skip);
        routine.schedule_weekdays = (0..=6).collect();
        let holiday = Holiday::new(NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(), "Independence Day".to_string(), false);
        let (generator, jobs) = harness(now, routine, vec![holiday]);
        let count = generator.generate_due().unwrap();
        assert_eq!(count, 0);
        assert!(jobs.0.lock().unwrap().is_empty());
    }

    #[test]
    fn holiday_delay_scans_forward_to_first_non_holiday_day() {
        let now = DateTime::parse_from_rfc3339("2024-07-03T23:30:00Z").unwrap().with_timezone(&Utc);
        let mut routine = daily_routine(HolidayBehavior::Delay);
        routine.schedule_weekdays = (0..=6).collect();
        let h1 = Holiday::new(NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(), "Independence Day".to_string(), false);
        let h2 = Holiday::new(NaiveDate::from_ymd_opt(2024, 7, 5).unwrap(), "Company Holiday".to_string(), true);
        let (generator, jobs) = harness(now, routine, vec![h1, h2]);
        generator.generate_due().unwrap();
        let stored = jobs.0.lock().unwrap();
        let job = stored.first().unwrap();
        assert_eq!(job.scheduled_for.date_naive(), NaiveDate::from_ymd_opt(2024, 7, 6).unwrap());
    }
}
