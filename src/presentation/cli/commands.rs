//! CLI command implementations
//!
//! Each action opens the durable store, runs one repository/use-case call,
//! and prints a result — the CLI is a thin administrative front for the
//! same repositories the HTTP surface and the runner use, per SPEC_FULL.md
//! §6. `serve` is the only command that starts the long-lived loops.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::application::config::Config;
use crate::application::service::Service;
use crate::application::services::{Clock, JobGenerator, JobRunner, JobRunnerConfig, SystemClock};
use crate::domain::entities::{job::manual_idempotency_key, Holiday, Job, Routine, Scene};
use crate::domain::repositories::{
    HolidayRepository, JobRepository, RoutineRepository, SceneExecutionRepository, SceneRepository,
};
use crate::domain::value_objects::RoutineId;
use crate::infrastructure::music::StubMusicResolver;
use crate::infrastructure::repositories::{
    SqliteHolidayRepository, SqliteJobRepository, SqliteRoutineRepository, SqliteSceneExecutionRepository,
    SqliteSceneRepository,
};
use crate::infrastructure::rpc::HttpEndpointRpc;
use crate::infrastructure::schema;
use crate::infrastructure::topology::StaticTopologyCache;
use crate::application::services::CoordinatorLock;

/// Opens (and schema-initializes) the configured SQLite database, then
/// builds every repository over the same shared connection.
pub struct Repositories {
    pub routines: Arc<dyn RoutineRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub scenes: Arc<dyn SceneRepository>,
    pub holidays: Arc<dyn HolidayRepository>,
    pub executions: Arc<dyn SceneExecutionRepository>,
}

impl Repositories {
    pub fn open(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)
            .with_context(|| format!("opening database at {database_path}"))?;
        schema::initialize(&conn).context("initializing schema")?;
        let conn = Arc::new(Mutex::new(conn));

        Ok(Self {
            routines: Arc::new(SqliteRoutineRepository::new(conn.clone())),
            jobs: Arc::new(SqliteJobRepository::new(conn.clone())),
            scenes: Arc::new(SqliteSceneRepository::new(conn.clone())),
            holidays: Arc::new(SqliteHolidayRepository::new(conn.clone())),
            executions: Arc::new(SqliteSceneExecutionRepository::new(conn)),
        })
    }
}

pub struct InitDbCommand;

impl InitDbCommand {
    pub fn execute(database_path: &str) -> Result<()> {
        Repositories::open(database_path)?;
        println!("database initialized at {database_path}");
        Ok(())
    }
}

pub struct ServeCommand;

impl ServeCommand {
    pub async fn execute(mut config: Config) -> Result<()> {
        if !Path::new(&config.database_path).exists() {
            info!(path = %config.database_path, "database does not exist yet, it will be created");
        }
        let repos = Repositories::open(&config.database_path)?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let generator = JobGenerator::new(
            clock.clone(),
            repos.routines.clone(),
            repos.jobs.clone(),
            repos.holidays.clone(),
        );

        let lock = Arc::new(CoordinatorLock::new());
        let topology = Arc::new(StaticTopologyCache::new());
        let rpc = Arc::new(HttpEndpointRpc::new(config.endpoint_rpc_timeout));
        let music_resolver = Arc::new(StubMusicResolver);

        let runner_config = JobRunnerConfig {
            poll_interval: config.poll_interval,
            max_retries: config.max_retries,
            stale_claim_timeout: config.stale_claim_timeout,
            max_pending_fetch: config.max_pending_fetch,
            lock_acquire_timeout: config.lock_acquire_timeout,
            preflight_max_retries: config.preflight_max_retries,
        };
        let runner = JobRunner::new(
            clock,
            repos.jobs.clone(),
            repos.routines.clone(),
            repos.scenes.clone(),
            repos.executions.clone(),
            music_resolver,
            rpc,
            topology,
            lock,
            runner_config,
        );

        let mut service = Service::new(generator, runner, config.job_generation_interval);
        service.start();

        let web_config = crate::web::WebConfig {
            host: std::mem::take(&mut config.host),
            port: config.port,
            database_path: config.database_path.clone(),
        };
        let web_handle = tokio::spawn(crate::web::start_web_server(web_config, repos.routines, repos.jobs, repos.scenes, repos.holidays, repos.executions));

        info!("routinehub is running; press ctrl-c to stop");
        tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
        info!("shutdown requested");

        service.stop().await;
        web_handle.abort();
        Ok(())
    }
}

pub struct RoutineCommand;

impl RoutineCommand {
    pub fn create(repos: &Repositories, file: &PathBuf) -> Result<()> {
        let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let routine: Routine = serde_json::from_str(&raw).context("parsing routine JSON")?;
        routine.validate().context("routine failed validation")?;
        repos.routines.insert(&routine)?;
        println!("created routine {}", routine.routine_id);
        Ok(())
    }

    pub fn list(repos: &Repositories) -> Result<()> {
        for routine in repos.routines.list_all()? {
            println!(
                "{}\t{}\t{}\t{}\tenabled={}",
                routine.routine_id, routine.name, routine.schedule_type, routine.timezone, routine.enabled
            );
        }
        Ok(())
    }

    pub fn get(repos: &Repositories, id: &str) -> Result<()> {
        match repos.routines.get(&RoutineId::from(id))? {
            Some(routine) => println!("{}", serde_json::to_string_pretty(&routine)?),
            None => println!("no routine with id {id}"),
        }
        Ok(())
    }

    pub fn delete(repos: &Repositories, id: &str) -> Result<()> {
        repos.routines.delete(&RoutineId::from(id))?;
        println!("deleted routine {id} (cascading jobs)");
        Ok(())
    }

    pub fn set_enabled(repos: &Repositories, id: &str, enabled: bool) -> Result<()> {
        let mut routine = Self::require(repos, id)?;
        routine.enabled = enabled;
        routine.updated_at = Utc::now();
        repos.routines.update(&routine)?;
        println!("routine {id} enabled={enabled}");
        Ok(())
    }

    pub fn set_skip_next(repos: &Repositories, id: &str, skip: bool) -> Result<()> {
        let mut routine = Self::require(repos, id)?;
        routine.skip_next = skip;
        routine.updated_at = Utc::now();
        repos.routines.update(&routine)?;
        println!("routine {id} skip_next={skip}");
        Ok(())
    }

    pub fn snooze(repos: &Repositories, id: &str, until: &str) -> Result<()> {
        let until = DateTime::parse_from_rfc3339(until)
            .context("until must be RFC3339")?
            .with_timezone(&Utc);
        let mut routine = Self::require(repos, id)?;
        routine.snooze_until = Some(until);
        routine.updated_at = Utc::now();
        repos.routines.update(&routine)?;
        println!("routine {id} snoozed until {until}");
        Ok(())
    }

    pub fn unsnooze(repos: &Repositories, id: &str) -> Result<()> {
        let mut routine = Self::require(repos, id)?;
        routine.snooze_until = None;
        routine.updated_at = Utc::now();
        repos.routines.update(&routine)?;
        println!("routine {id} unsnoozed");
        Ok(())
    }

    /// Manual trigger: inserts a job scheduled for now with the
    /// `manual:{routine_id}:{nanos}` idempotency key from SPEC_FULL.md §6.
    pub fn trigger(repos: &Repositories, id: &str) -> Result<()> {
        let routine_id = RoutineId::from(id);
        let routine = repos
            .routines
            .get(&routine_id)?
            .ok_or_else(|| anyhow::anyhow!("no routine with id {id}"))?;
        let now = Utc::now();
        let key = manual_idempotency_key(&routine.routine_id, now);
        let job = Job::new_pending(routine.routine_id, now, Some(key));
        let job_id = job.job_id.clone();
        repos.jobs.insert(&job)?;
        println!("triggered job {job_id} for routine {id}");
        Ok(())
    }

    fn require(repos: &Repositories, id: &str) -> Result<Routine> {
        repos
            .routines
            .get(&RoutineId::from(id))?
            .ok_or_else(|| anyhow::anyhow!("no routine with id {id}"))
    }
}

pub struct SceneCommand;

impl SceneCommand {
    pub fn create(repos: &Repositories, file: &PathBuf) -> Result<()> {
        let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let scene: Scene = serde_json::from_str(&raw).context("parsing scene JSON")?;
        scene.validate().context("scene failed validation")?;
        repos.scenes.insert(&scene)?;
        println!("created scene {}", scene.scene_id);
        Ok(())
    }

    pub fn list(repos: &Repositories) -> Result<()> {
        for scene in repos.scenes.list_all()? {
            println!("{}\t{}\t{} member(s)", scene.scene_id, scene.name, scene.members.len());
        }
        Ok(())
    }

    pub fn get(repos: &Repositories, id: &str) -> Result<()> {
        match repos.scenes.get(&id.into())? {
            Some(scene) => println!("{}", serde_json::to_string_pretty(&scene)?),
            None => println!("no scene with id {id}"),
        }
        Ok(())
    }

    pub fn delete(repos: &Repositories, id: &str) -> Result<()> {
        repos.scenes.delete(&id.into())?;
        println!("deleted scene {id}");
        Ok(())
    }
}

pub struct JobCommand;

impl JobCommand {
    pub fn get(repos: &Repositories, id: &str) -> Result<()> {
        match repos.jobs.get(&id.into())? {
            Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
            None => println!("no job with id {id}"),
        }
        Ok(())
    }

    pub fn for_routine(repos: &Repositories, routine_id: &str) -> Result<()> {
        for job in repos.jobs.list_for_routine(&RoutineId::from(routine_id))? {
            println!(
                "{}\t{}\t{}\tattempts={}",
                job.job_id, job.scheduled_for, job.status, job.attempts
            );
        }
        Ok(())
    }
}

pub struct HolidayCommand;

impl HolidayCommand {
    pub fn add(repos: &Repositories, date: &str, name: &str, custom: bool) -> Result<()> {
        let date: NaiveDate = date.parse().context("date must be YYYY-MM-DD")?;
        repos.holidays.insert(&Holiday::new(date, name.to_string(), custom))?;
        println!("added holiday {date} ({name})");
        Ok(())
    }

    pub fn list(repos: &Repositories, from: &str, to: &str) -> Result<()> {
        let from: NaiveDate = from.parse().context("from must be YYYY-MM-DD")?;
        let to: NaiveDate = to.parse().context("to must be YYYY-MM-DD")?;
        for holiday in repos.holidays.list_range(from, to)? {
            println!("{}\t{}\tcustom={}", holiday.date, holiday.name, holiday.is_custom);
        }
        Ok(())
    }

    pub fn check(repos: &Repositories, date: &str) -> Result<()> {
        let date: NaiveDate = date.parse().context("date must be YYYY-MM-DD")?;
        println!("{}", repos.holidays.is_holiday(date)?);
        Ok(())
    }

    pub fn delete(repos: &Repositories, date: &str) -> Result<()> {
        let date: NaiveDate = date.parse().context("date must be YYYY-MM-DD")?;
        repos.holidays.delete(date)?;
        println!("deleted holiday {date}");
        Ok(())
    }
}
