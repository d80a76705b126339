//! Routine entity module
//!
//! A Routine binds a recurrence schedule to a scene and an optional music
//! policy. It is the user-facing unit of configuration; the scheduler turns
//! it into [`super::Job`] rows, one per occurrence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    HolidayBehavior, LocalTimeOfDay, MusicPolicyType, RoutineId, SceneId, ScheduleType, WeekdaySet,
};
use crate::error::{CoreError, CoreResult};

/// Music-selection configuration carried by a routine.
///
/// Kept as a flat struct of optional fields (mirroring how the upstream
/// `SchedulingInfo` groups a family of related optional attributes) rather
/// than as its own entity, since a routine owns exactly one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MusicPolicy {
    pub policy_type: Option<MusicPolicyType>,
    pub set_id: Option<String>,
    pub favorite_id: Option<String>,
    pub content_blob: Option<String>,
    pub no_repeat_window_minutes: Option<u32>,
    pub fallback_behavior: Option<String>,
}

/// A user-defined schedule bound to a scene.
///
/// See SPEC_FULL.md §3 for the full invariant list; [`Routine::validate`]
/// enforces all of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Routine {
    pub routine_id: RoutineId,
    pub name: String,
    pub enabled: bool,
    pub timezone: String,
    pub schedule_type: ScheduleType,
    pub schedule_time: Option<LocalTimeOfDay>,
    pub schedule_weekdays: WeekdaySet,
    pub schedule_month: Option<u8>,
    pub schedule_day: Option<u8>,
    pub interval_minutes: Option<i64>,
    pub cron_expression: Option<String>,
    pub holiday_behavior: HolidayBehavior,
    pub scene_id: SceneId,
    pub music_policy: MusicPolicy,
    pub skip_next: bool,
    pub snooze_until: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Routine {
    /// Creates a new, disabled-by-default routine with minimal required
    /// fields; callers set the schedule-type-specific fields afterward and
    /// call [`Routine::validate`] before persisting.
    pub fn new(name: String, timezone: String, schedule_type: ScheduleType, scene_id: SceneId) -> Self {
        let now = Utc::now();
        Self {
            routine_id: RoutineId::new(),
            name,
            enabled: true,
            timezone,
            schedule_type,
            schedule_time: None,
            schedule_weekdays: WeekdaySet::new(),
            schedule_month: None,
            schedule_day: None,
            interval_minutes: None,
            cron_expression: None,
            holiday_behavior: HolidayBehavior::Run,
            scene_id,
            music_policy: MusicPolicy::default(),
            skip_next: false,
            snooze_until: None,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this routine should be considered for job generation right
    /// now: enabled, not one-shot-skipped, and not currently snoozed.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled || self.skip_next {
            return false;
        }
        match self.snooze_until {
            Some(until) => until <= now,
            None => true,
        }
    }

    /// Validates the invariants from SPEC_FULL.md §3.
    pub fn validate(&self) -> CoreResult<()> {
        use chrono_tz::Tz;
        use std::str::FromStr;

        if Tz::from_str(&self.timezone).is_err() {
            return Err(CoreError::Validation(format!(
                "timezone '{}' does not resolve",
                self.timezone
            )));
        }

        match self.schedule_type {
            ScheduleType::Weekly => {
                if self.schedule_weekdays.is_empty() {
                    return Err(CoreError::Validation(
                        "weekly routine requires a non-empty schedule_weekdays".to_string(),
                    ));
                }
                if self.schedule_time.is_none() {
                    return Err(CoreError::Validation(
                        "weekly routine requires schedule_time".to_string(),
                    ));
                }
            }
            ScheduleType::Monthly => {
                if self.schedule_day.is_none() {
                    return Err(CoreError::Validation(
                        "monthly routine requires schedule_day".to_string(),
                    ));
                }
                if self.schedule_time.is_none() {
                    return Err(CoreError::Validation(
                        "monthly routine requires schedule_time".to_string(),
                    ));
                }
            }
            ScheduleType::Yearly | ScheduleType::Once => {
                if self.schedule_month.is_none() || self.schedule_day.is_none() {
                    return Err(CoreError::Validation(format!(
                        "{} routine requires schedule_month and schedule_day",
                        self.schedule_type
                    )));
                }
                if self.schedule_time.is_none() {
                    return Err(CoreError::Validation(format!(
                        "{} routine requires schedule_time",
                        self.schedule_type
                    )));
                }
            }
            ScheduleType::Cron => {
                if self.cron_expression.is_none() {
                    return Err(CoreError::Validation(
                        "cron routine requires cron_expression".to_string(),
                    ));
                }
            }
            ScheduleType::Interval => {
                if self.interval_minutes.is_none() {
                    return Err(CoreError::Validation(
                        "interval routine missing interval_minutes".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly_routine() -> Routine {
        let mut r = Routine::new(
            "Morning Jazz".to_string(),
            "America/Los_Angeles".to_string(),
            ScheduleType::Weekly,
            SceneId::new(),
        );
        r.schedule_time = Some(LocalTimeOfDay::parse("09:00").unwrap());
        r.schedule_weekdays = [1, 2, 3, 4, 5].into_iter().collect();
        r
    }

    #[test]
    fn valid_weekly_routine_passes() {
        assert!(weekly_routine().validate().is_ok());
    }

    #[test]
    fn weekly_routine_without_weekdays_fails() {
        let mut r = weekly_routine();
        r.schedule_weekdays.clear();
        assert!(r.validate().is_err());
    }

    #[test]
    fn unknown_timezone_fails() {
        let mut r = weekly_routine();
        r.timezone = "Not/AZone".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn is_eligible_respects_snooze() {
        let mut r = weekly_routine();
        let now = Utc::now();
        r.snooze_until = Some(now + chrono::Duration::hours(1));
        assert!(!r.is_eligible(now));
        r.snooze_until = Some(now - chrono::Duration::hours(1));
        assert!(r.is_eligible(now));
    }

    #[test]
    fn is_eligible_respects_skip_next() {
        let mut r = weekly_routine();
        r.skip_next = true;
        assert!(!r.is_eligible(Utc::now()));
    }

    #[test]
    fn cron_routine_requires_cron_expression() {
        let mut r = Routine::new(
            "Nightly".to_string(),
            "UTC".to_string(),
            ScheduleType::Cron,
            SceneId::new(),
        );
        assert!(r.validate().is_err());
        r.cron_expression = Some("0 22 * * *".to_string());
        assert!(r.validate().is_ok());
    }
}
