use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::domain::entities::{MusicPolicy, Routine};
use crate::domain::repositories::RoutineRepository;
use crate::domain::value_objects::{
    weekday_set_from_csv, weekday_set_to_csv, HolidayBehavior, LocalTimeOfDay, RoutineId, ScheduleType, SceneId,
};
use crate::error::CoreResult;
use crate::infrastructure::timefmt;

pub struct SqliteRoutineRepository {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteRoutineRepository {
    pub fn new(conn: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self { conn }
    }

    fn row_to_routine(row: &rusqlite::Row) -> rusqlite::Result<Routine> {
        let schedule_time: Option<String> = row.get("schedule_time")?;
        let schedule_weekdays: String = row.get("schedule_weekdays")?;
        let schedule_type: String = row.get("schedule_type")?;
        let holiday_behavior: String = row.get("holiday_behavior")?;
        let snooze_until: Option<String> = row.get("snooze_until")?;
        let last_run_at: Option<String> = row.get("last_run_at")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        let parse_time = |raw: &str| -> DateTime<Utc> {
            timefmt::parse(raw).unwrap_or_else(|_| Utc::now())
        };

        Ok(Routine {
            routine_id: RoutineId::from_string(row.get("routine_id")?),
            name: row.get("name")?,
            enabled: row.get::<_, i64>("enabled")? != 0,
            timezone: row.get("timezone")?,
            schedule_type: schedule_type.parse().unwrap_or(ScheduleType::Weekly),
            schedule_time: schedule_time.and_then(|t| LocalTimeOfDay::parse(&t).ok()),
            schedule_weekdays: weekday_set_from_csv(&schedule_weekdays),
            schedule_month: row.get::<_, Option<i64>>("schedule_month")?.map(|v| v as u8),
            schedule_day: row.get::<_, Option<i64>>("schedule_day")?.map(|v| v as u8),
            interval_minutes: row.get("interval_minutes")?,
            cron_expression: row.get("cron_expression")?,
            holiday_behavior: holiday_behavior.parse().unwrap_or(HolidayBehavior::Run),
            scene_id: SceneId::from_string(row.get("scene_id")?),
            music_policy: MusicPolicy {
                policy_type: row
                    .get::<_, Option<String>>("music_policy_type")?
                    .and_then(|s| serde_json::from_value(serde_json::Value::String(s)).ok()),
                set_id: row.get("set_id")?,
                favorite_id: row.get("favorite_id")?,
                content_blob: row.get("music_content")?,
                no_repeat_window_minutes: row.get::<_, Option<i64>>("no_repeat_window_minutes")?.map(|v| v as u32),
                fallback_behavior: row.get("fallback_behavior")?,
            },
            skip_next: row.get::<_, i64>("skip_next")? != 0,
            snooze_until: snooze_until.as_deref().map(parse_time),
            last_run_at: last_run_at.as_deref().map(parse_time),
            created_at: parse_time(&created_at),
            updated_at: parse_time(&updated_at),
        })
    }

    fn bind(routine: &Routine) -> RoutineParams {
        RoutineParams {
            schedule_time: routine.schedule_time.map(|t| t.to_string()),
            schedule_weekdays: weekday_set_to_csv(&routine.schedule_weekdays),
            schedule_type: routine.schedule_type.to_string(),
            holiday_behavior: routine.holiday_behavior.to_string(),
            snooze_until: routine.snooze_until.map(timefmt::format),
            last_run_at: routine.last_run_at.map(timefmt::format),
            created_at: timefmt::format(routine.created_at),
            updated_at: timefmt::format(routine.updated_at),
        }
    }
}

struct RoutineParams {
    schedule_time: Option<String>,
    schedule_weekdays: String,
    schedule_type: String,
    holiday_behavior: String,
    snooze_until: Option<String>,
    last_run_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RoutineRepository for SqliteRoutineRepository {
    fn insert(&self, routine: &Routine) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let p = Self::bind(routine);
        let policy_type_json = routine
            .music_policy
            .policy_type
            .map(|t| serde_json::to_value(t).unwrap().as_str().unwrap().to_string());
        conn.execute(
            "INSERT INTO routines (
                routine_id, name, enabled, timezone, schedule_type, schedule_time,
                schedule_weekdays, schedule_month, schedule_day, interval_minutes, cron_expression,
                holiday_behavior, scene_id, music_policy_type, set_id, favorite_id, music_content,
                no_repeat_window_minutes, fallback_behavior,
                skip_next, snooze_until, last_run_at, created_at, updated_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24)",
            params![
                routine.routine_id.as_str(),
                routine.name,
                routine.enabled as i64,
                routine.timezone,
                p.schedule_type,
                p.schedule_time,
                p.schedule_weekdays,
                routine.schedule_month.map(|v| v as i64),
                routine.schedule_day.map(|v| v as i64),
                routine.interval_minutes,
                routine.cron_expression,
                p.holiday_behavior,
                routine.scene_id.as_str(),
                policy_type_json,
                routine.music_policy.set_id,
                routine.music_policy.favorite_id,
                routine.music_policy.content_blob,
                routine.music_policy.no_repeat_window_minutes.map(|v| v as i64),
                routine.music_policy.fallback_behavior,
                routine.skip_next as i64,
                p.snooze_until,
                p.last_run_at,
                p.created_at,
                p.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update(&self, routine: &Routine) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let p = Self::bind(routine);
        let policy_type_json = routine
            .music_policy
            .policy_type
            .map(|t| serde_json::to_value(t).unwrap().as_str().unwrap().to_string());
        conn.execute(
            "UPDATE routines SET name=?2, enabled=?3, timezone=?4, schedule_type=?5, schedule_time=?6,
             schedule_weekdays=?7, schedule_month=?8, schedule_day=?9, interval_minutes=?10, cron_expression=?11,
             holiday_behavior=?12, scene_id=?13, music_policy_type=?14, set_id=?15, favorite_id=?16,
             music_content=?17, no_repeat_window_minutes=?18, fallback_behavior=?19,
             skip_next=?20, snooze_until=?21, last_run_at=?22, updated_at=?23
             WHERE routine_id=?1",
            params![
                routine.routine_id.as_str(),
                routine.name,
                routine.enabled as i64,
                routine.timezone,
                p.schedule_type,
                p.schedule_time,
                p.schedule_weekdays,
                routine.schedule_month.map(|v| v as i64),
                routine.schedule_day.map(|v| v as i64),
                routine.interval_minutes,
                routine.cron_expression,
                p.holiday_behavior,
                routine.scene_id.as_str(),
                policy_type_json,
                routine.music_policy.set_id,
                routine.music_policy.favorite_id,
                routine.music_policy.content_blob,
                routine.music_policy.no_repeat_window_minutes.map(|v| v as i64),
                routine.music_policy.fallback_behavior,
                routine.skip_next as i64,
                p.snooze_until,
                p.last_run_at,
                p.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &RoutineId) -> CoreResult<Option<Routine>> {
        let conn = self.conn.lock().unwrap();
        let routine = conn
            .query_row(
                "SELECT * FROM routines WHERE routine_id = ?1",
                params![id.as_str()],
                Self::row_to_routine,
            )
            .optional()?;
        Ok(routine)
    }

    fn delete(&self, id: &RoutineId) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM routines WHERE routine_id = ?1", params![id.as_str()])?;
        Ok(())
    }

    fn list_all(&self) -> CoreResult<Vec<Routine>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM routines")?;
        let rows = stmt.query_map([], Self::row_to_routine)?;
        let mut routines = Vec::new();
        for row in rows {
            routines.push(row?);
        }
        Ok(routines)
    }

    fn list_eligible(&self, now: DateTime<Utc>) -> CoreResult<Vec<Routine>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM routines WHERE enabled = 1 AND skip_next = 0
             AND (snooze_until IS NULL OR snooze_until <= ?1)",
        )?;
        let rows = stmt.query_map(params![timefmt::format(now)], Self::row_to_routine)?;
        let mut routines = Vec::new();
        for row in rows {
            routines.push(row?);
        }
        Ok(routines)
    }

    fn touch_last_run(&self, id: &RoutineId, at: DateTime<Utc>) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE routines SET last_run_at = ?2, updated_at = ?2 WHERE routine_id = ?1",
            params![id.as_str(), timefmt::format(at)],
        )?;
        Ok(())
    }
}
