//! Idempotent schema creation
//!
//! Stands up the crate's own tables with `CREATE TABLE IF NOT EXISTS` +
//! `CREATE INDEX IF NOT EXISTS`, run once at [`crate::service::Service`]
//! startup. A dedicated external migration tool is explicitly out of scope
//! (SPEC_FULL.md §6); this is the minimal idempotent form that still lets
//! the crate stand its own store up.

use rusqlite::Connection;

use crate::error::CoreResult;

pub fn initialize(conn: &Connection) -> CoreResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS routines (
            routine_id          TEXT PRIMARY KEY,
            name                TEXT NOT NULL,
            enabled             INTEGER NOT NULL,
            timezone            TEXT NOT NULL,
            schedule_type       TEXT NOT NULL,
            schedule_time       TEXT,
            schedule_weekdays   TEXT NOT NULL DEFAULT '',
            schedule_month      INTEGER,
            schedule_day        INTEGER,
            interval_minutes    INTEGER,
            cron_expression     TEXT,
            holiday_behavior    TEXT NOT NULL,
            scene_id            TEXT NOT NULL REFERENCES scenes(scene_id),
            music_policy_type   TEXT,
            set_id              TEXT,
            favorite_id         TEXT,
            music_content       TEXT,
            no_repeat_window_minutes INTEGER,
            fallback_behavior   TEXT,
            skip_next           INTEGER NOT NULL DEFAULT 0,
            snooze_until        TEXT,
            last_run_at         TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_routines_enabled_snooze
            ON routines(enabled, snooze_until);

        CREATE TABLE IF NOT EXISTS scenes (
            scene_id                TEXT PRIMARY KEY,
            name                    TEXT NOT NULL,
            coordinator_preference  TEXT NOT NULL,
            fallback_policy         TEXT,
            members                 TEXT NOT NULL,
            volume_ramp             INTEGER,
            teardown                INTEGER
        );

        CREATE TABLE IF NOT EXISTS jobs (
            job_id              TEXT PRIMARY KEY,
            routine_id          TEXT NOT NULL REFERENCES routines(routine_id) ON DELETE CASCADE,
            scheduled_for       TEXT NOT NULL,
            status              TEXT NOT NULL,
            attempts            INTEGER NOT NULL DEFAULT 0,
            last_error          TEXT,
            scene_execution_id  TEXT,
            retry_after         TEXT,
            claimed_at          TEXT,
            idempotency_key     TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            UNIQUE(routine_id, scheduled_for)
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_status_scheduled_for
            ON jobs(status, scheduled_for);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_idempotency_key
            ON jobs(idempotency_key) WHERE idempotency_key IS NOT NULL;

        CREATE TABLE IF NOT EXISTS scene_executions (
            scene_execution_id  TEXT PRIMARY KEY,
            scene_id            TEXT REFERENCES scenes(scene_id),
            idempotency_key     TEXT,
            coordinator_used    TEXT,
            status              TEXT NOT NULL,
            started_at          TEXT NOT NULL,
            ended_at            TEXT,
            steps               TEXT NOT NULL,
            verification        TEXT,
            error               TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_scene_executions_idempotency_key
            ON scene_executions(idempotency_key) WHERE idempotency_key IS NOT NULL;

        CREATE TABLE IF NOT EXISTS holidays (
            date        TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            is_custom   INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}
