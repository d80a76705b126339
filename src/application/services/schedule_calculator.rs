//! Schedule Calculator
//!
//! Computes the first instant strictly after a reference time at which a
//! routine fires, per recurrence type, with all local-time arithmetic done
//! in the routine's own IANA zone before converting back to UTC.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::domain::entities::Routine;
use crate::domain::value_objects::ScheduleType;
use crate::error::{CoreError, CoreResult};

/// Resolves a local naive datetime against a zone, picking the earliest
/// representation for ambiguous (DST fall-back) instants and skipping
/// non-existent (DST spring-forward) ones by nudging forward a minute at a
/// time until a valid representation appears.
pub(crate) fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _latest) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let mut probe = naive;
            loop {
                probe += Duration::minutes(1);
                if let LocalResult::Single(dt) = tz.from_local_datetime(&probe) {
                    return dt.with_timezone(&Utc);
                }
            }
        }
    }
}

pub(crate) fn resolve_tz(routine: &Routine) -> CoreResult<Tz> {
    Tz::from_str(&routine.timezone)
        .map_err(|_| CoreError::Validation(format!("timezone '{}' does not resolve", routine.timezone)))
}

fn schedule_time(routine: &Routine) -> CoreResult<(u32, u32)> {
    let t = routine
        .schedule_time
        .ok_or_else(|| CoreError::Validation("routine missing schedule_time".to_string()))?;
    Ok((t.hour as u32, t.minute as u32))
}

fn weekly_next(routine: &Routine, tz: &Tz, local_after: DateTime<Tz>) -> CoreResult<DateTime<Utc>> {
    let (hour, minute) = schedule_time(routine)?;
    for offset in 0..8i64 {
        let candidate_date = local_after.date_naive() + Duration::days(offset);
        let weekday_num = candidate_date.weekday().num_days_from_sunday() as u8;
        if !routine.schedule_weekdays.contains(&weekday_num) {
            continue;
        }
        let naive = candidate_date
            .and_hms_opt(hour, minute, 0)
            .expect("hour/minute validated by Routine::validate");
        let candidate = resolve_local(tz, naive);
        if candidate > local_after.with_timezone(&Utc) {
            return Ok(candidate);
        }
    }
    Err(CoreError::Internal(
        "weekly schedule found no matching weekday within 8 days".to_string(),
    ))
}

fn monthly_next(routine: &Routine, tz: &Tz, local_after: DateTime<Tz>) -> CoreResult<DateTime<Utc>> {
    let (hour, minute) = schedule_time(routine)?;
    let day = routine
        .schedule_day
        .ok_or_else(|| CoreError::Validation("monthly routine missing schedule_day".to_string()))?;

    let mut year = local_after.year();
    let mut month = local_after.month();
    for _ in 0..24 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day as u32) {
            let naive = date
                .and_hms_opt(hour, minute, 0)
                .expect("hour/minute validated by Routine::validate");
            let candidate = resolve_local(tz, naive);
            if candidate > local_after.with_timezone(&Utc) {
                return Ok(candidate);
            }
        }
        if month == 12 {
            month = 1;
            year += 1;
        } else {
            month += 1;
        }
    }
    Err(CoreError::Internal(
        "monthly schedule found no valid day within 24 months".to_string(),
    ))
}

fn yearly_next(routine: &Routine, tz: &Tz, local_after: DateTime<Tz>) -> CoreResult<DateTime<Utc>> {
    let (hour, minute) = schedule_time(routine)?;
    let month = routine
        .schedule_month
        .ok_or_else(|| CoreError::Validation("yearly routine missing schedule_month".to_string()))?;
    let day = routine
        .schedule_day
        .ok_or_else(|| CoreError::Validation("yearly routine missing schedule_day".to_string()))?;

    for year in [local_after.year(), local_after.year() + 1] {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month as u32, day as u32) {
            let naive = date
                .and_hms_opt(hour, minute, 0)
                .expect("hour/minute validated by Routine::validate");
            let candidate = resolve_local(tz, naive);
            if candidate > local_after.with_timezone(&Utc) {
                return Ok(candidate);
            }
        }
    }
    Err(CoreError::Validation(format!(
        "no valid {}-{} date found for yearly routine",
        month, day
    )))
}

fn once_next(routine: &Routine, tz: &Tz, local_after: DateTime<Tz>) -> CoreResult<Option<DateTime<Utc>>> {
    let (hour, minute) = schedule_time(routine)?;
    let month = routine
        .schedule_month
        .ok_or_else(|| CoreError::Validation("once routine missing schedule_month".to_string()))?;
    let day = routine
        .schedule_day
        .ok_or_else(|| CoreError::Validation("once routine missing schedule_day".to_string()))?;

    let date = NaiveDate::from_ymd_opt(local_after.year(), month as u32, day as u32)
        .ok_or_else(|| CoreError::Validation(format!("invalid date {}-{} for once routine", month, day)))?;
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .expect("hour/minute validated by Routine::validate");
    let candidate = resolve_local(tz, naive);
    if candidate > local_after.with_timezone(&Utc) {
        Ok(Some(candidate))
    } else {
        Ok(None)
    }
}

/// SPEC_FULL.md §4.C6 specifies 5-field cron (`minute hour dom month dow`);
/// the `cron` crate only parses its own 6-field form with a leading seconds
/// field. Prepend `"0 "` so a spec-compliant expression still parses; an
/// expression that already carries 6 fields is passed through unchanged.
fn normalize_cron_expression(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

fn cron_next(routine: &Routine, tz: &Tz, local_after: DateTime<Tz>) -> CoreResult<Option<DateTime<Utc>>> {
    let expr = routine
        .cron_expression
        .as_deref()
        .ok_or_else(|| CoreError::Validation("cron routine missing cron_expression".to_string()))?;
    let normalized = normalize_cron_expression(expr);
    let schedule = Schedule::from_str(&normalized)
        .map_err(|e| CoreError::Validation(format!("invalid cron expression '{expr}': {e}")))?;
    Ok(schedule
        .after(&local_after)
        .next()
        .map(|dt| dt.with_timezone(&Utc)))
}

fn interval_next(routine: &Routine, after_utc: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
    let minutes = routine
        .interval_minutes
        .ok_or_else(|| CoreError::Validation("interval routine missing interval_minutes".to_string()))?;
    if minutes <= 0 {
        return Err(CoreError::Validation(
            "interval_minutes must be positive".to_string(),
        ));
    }
    let step = Duration::minutes(minutes);
    let anchor = routine.created_at;
    let elapsed = after_utc.signed_duration_since(anchor);
    let steps_elapsed = elapsed.num_minutes().div_euclid(minutes) + 1;
    Ok(anchor + step * steps_elapsed as i32)
}

/// Computes the first instant strictly after `after_utc` at which `routine`
/// fires. `Ok(None)` means the routine will never fire again (a `once`
/// routine whose date has passed); `Err` surfaces validation or arithmetic
/// failures.
pub fn next_run(routine: &Routine, after_utc: DateTime<Utc>) -> CoreResult<Option<DateTime<Utc>>> {
    let tz = resolve_tz(routine)?;
    let local_after = after_utc.with_timezone(&tz);

    match routine.schedule_type {
        ScheduleType::Weekly => weekly_next(routine, &tz, local_after).map(Some),
        ScheduleType::Monthly => monthly_next(routine, &tz, local_after).map(Some),
        ScheduleType::Yearly => yearly_next(routine, &tz, local_after).map(Some),
        ScheduleType::Once => once_next(routine, &tz, local_after),
        ScheduleType::Cron => cron_next(routine, &tz, local_after),
        ScheduleType::Interval => interval_next(routine, after_utc).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{LocalTimeOfDay, SceneId};

    fn base_routine(schedule_type: ScheduleType) -> Routine {
        Routine::new(
            "Test".to_string(),
            "America/Los_Angeles".to_string(),
            schedule_type,
            SceneId::new(),
        )
    }

    #[test]
    fn weekly_advances_to_next_matching_weekday() {
        let mut r = base_routine(ScheduleType::Weekly);
        r.schedule_time = Some(LocalTimeOfDay::parse("09:00").unwrap());
        r.schedule_weekdays = [1].into_iter().collect(); // Monday

        let after = DateTime::parse_from_rfc3339("2024-03-04T20:00:00Z") // Monday after 9am PT
            .unwrap()
            .with_timezone(&Utc);
        let next = next_run(&r, after).unwrap().unwrap();
        assert!(next > after);
        let tz = Tz::from_str(&r.timezone).unwrap();
        let local = next.with_timezone(&tz);
        assert_eq!(local.weekday().num_days_from_sunday(), 1);
    }

    #[test]
    fn once_returns_none_after_date_passed() {
        let mut r = base_routine(ScheduleType::Once);
        r.schedule_time = Some(LocalTimeOfDay::parse("09:00").unwrap());
        r.schedule_month = Some(1);
        r.schedule_day = Some(1);
        let after = DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(next_run(&r, after).unwrap().is_none());
    }

    #[test]
    fn interval_steps_from_anchor() {
        let mut r = base_routine(ScheduleType::Interval);
        r.interval_minutes = Some(30);
        let anchor = r.created_at;
        let after = anchor + Duration::minutes(10);
        let next = next_run(&r, after).unwrap().unwrap();
        assert_eq!(next, anchor + Duration::minutes(30));
    }

    #[test]
    fn interval_missing_minutes_errors() {
        let r = base_routine(ScheduleType::Interval);
        let after = r.created_at;
        assert!(next_run(&r, after).is_err());
    }

    #[test]
    fn monthly_rolls_forward_past_short_months() {
        let mut r = base_routine(ScheduleType::Monthly);
        r.schedule_time = Some(LocalTimeOfDay::parse("09:00").unwrap());
        r.schedule_day = Some(31);
        let after = DateTime::parse_from_rfc3339("2024-04-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let next = next_run(&r, after).unwrap().unwrap();
        let tz = Tz::from_str(&r.timezone).unwrap();
        let local = next.with_timezone(&tz);
        assert_eq!(local.day(), 31);
    }

    #[test]
    fn cron_missing_expression_errors() {
        let r = base_routine(ScheduleType::Cron);
        assert!(next_run(&r, Utc::now()).is_err());
    }

    #[test]
    fn cron_five_field_expression_parses() {
        let mut r = base_routine(ScheduleType::Cron);
        r.cron_expression = Some("0 22 * * *".to_string());
        let after = DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let next = next_run(&r, after).unwrap().unwrap();
        assert!(next > after);
        let tz = Tz::from_str(&r.timezone).unwrap();
        assert_eq!(next.with_timezone(&tz).hour(), 22);
    }

    proptest::proptest! {
        /// SPEC_FULL.md §8: "for every routine and instant t, next_run(r,
        /// next_run(r, t)) > next_run(r, t)" — re-querying from a fire time
        /// always advances, it never repeats or goes backward.
        #[test]
        fn weekly_next_run_is_strictly_monotonic(
            weekday_mask in 1u8..0x7f,
            hour in 0u8..24,
            minute in 0u8..60,
            after_offset_minutes in 0i64..(60 * 24 * 400),
        ) {
            let mut r = base_routine(ScheduleType::Weekly);
            r.schedule_time = Some(LocalTimeOfDay::parse(&format!("{hour:02}:{minute:02}")).unwrap());
            r.schedule_weekdays = (0..7u8).filter(|d| weekday_mask & (1 << d) != 0).collect();

            let epoch = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
            let after = epoch + Duration::minutes(after_offset_minutes);

            let first = next_run(&r, after).unwrap().unwrap();
            prop_assert!(first > after);

            let second = next_run(&r, first).unwrap().unwrap();
            prop_assert!(second > first);
        }
    }
}
