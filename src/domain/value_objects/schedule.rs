//! Value objects describing how a routine recurs in time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The recurrence family a routine's schedule belongs to.
///
/// See SPEC_FULL.md §4.C6 for the per-type `next_run` algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Weekly,
    Monthly,
    Yearly,
    Once,
    Cron,
    Interval,
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScheduleType::Weekly => "weekly",
            ScheduleType::Monthly => "monthly",
            ScheduleType::Yearly => "yearly",
            ScheduleType::Once => "once",
            ScheduleType::Cron => "cron",
            ScheduleType::Interval => "interval",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ScheduleType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "weekly" => Ok(ScheduleType::Weekly),
            "monthly" => Ok(ScheduleType::Monthly),
            "yearly" => Ok(ScheduleType::Yearly),
            "once" => Ok(ScheduleType::Once),
            "cron" => Ok(ScheduleType::Cron),
            "interval" => Ok(ScheduleType::Interval),
            other => Err(format!("unknown schedule_type '{other}'")),
        }
    }
}

/// How a routine reacts when its computed next-run date is a holiday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HolidayBehavior {
    /// Generate no job for that occurrence.
    Skip,
    /// Scan forward for the first non-holiday day at the same local time.
    Delay,
    /// Ignore the holiday registry entirely.
    Run,
}

impl fmt::Display for HolidayBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HolidayBehavior::Skip => "SKIP",
            HolidayBehavior::Delay => "DELAY",
            HolidayBehavior::Run => "RUN",
        };
        write!(f, "{s}")
    }
}

impl FromStr for HolidayBehavior {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SKIP" => Ok(HolidayBehavior::Skip),
            "DELAY" => Ok(HolidayBehavior::Delay),
            "RUN" => Ok(HolidayBehavior::Run),
            other => Err(format!("unknown holiday_behavior '{other}'")),
        }
    }
}

/// A parsed `HH:MM` local time-of-day, validated per the Routine invariants
/// (`0 <= H <= 23`, `0 <= M <= 59`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl LocalTimeOfDay {
    pub fn parse(value: &str) -> Result<Self, String> {
        let (h, m) = value
            .split_once(':')
            .ok_or_else(|| format!("schedule_time must be HH:MM, got '{value}'"))?;
        let hour: u8 = h
            .parse()
            .map_err(|_| format!("invalid hour in '{value}'"))?;
        let minute: u8 = m
            .parse()
            .map_err(|_| format!("invalid minute in '{value}'"))?;
        if hour > 23 || minute > 59 {
            return Err(format!("schedule_time out of range: '{value}'"));
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for LocalTimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A set of ISO-ish weekdays, `0` = Sunday .. `6` = Saturday, matching
/// `chrono::Weekday::num_days_from_sunday()`.
pub type WeekdaySet = BTreeSet<u8>;

pub fn weekday_set_from_csv(value: &str) -> WeekdaySet {
    value
        .split(',')
        .filter_map(|part| part.trim().parse::<u8>().ok())
        .filter(|d| *d <= 6)
        .collect()
}

pub fn weekday_set_to_csv(set: &WeekdaySet) -> String {
    set.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_time() {
        let t = LocalTimeOfDay::parse("09:05").unwrap();
        assert_eq!(t.hour, 9);
        assert_eq!(t.minute, 5);
    }

    #[test]
    fn rejects_out_of_range_time() {
        assert!(LocalTimeOfDay::parse("24:00").is_err());
        assert!(LocalTimeOfDay::parse("10:60").is_err());
        assert!(LocalTimeOfDay::parse("garbage").is_err());
    }

    #[test]
    fn weekday_csv_round_trips() {
        let set = weekday_set_from_csv("1,3,5");
        assert_eq!(set, BTreeSet::from([1, 3, 5]));
        assert_eq!(weekday_set_to_csv(&set), "1,3,5");
    }

    #[test]
    fn schedule_type_round_trips_through_display_and_from_str() {
        for variant in [
            ScheduleType::Weekly,
            ScheduleType::Monthly,
            ScheduleType::Yearly,
            ScheduleType::Once,
            ScheduleType::Cron,
            ScheduleType::Interval,
        ] {
            let parsed: ScheduleType = variant.to_string().parse().unwrap();
            assert_eq!(parsed, variant);
        }
    }

    #[test]
    fn holiday_behavior_round_trips_through_display_and_from_str() {
        for variant in [HolidayBehavior::Skip, HolidayBehavior::Delay, HolidayBehavior::Run] {
            let parsed: HolidayBehavior = variant.to_string().parse().unwrap();
            assert_eq!(parsed, variant);
        }
    }
}
