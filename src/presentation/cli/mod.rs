pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "routinehub")]
#[command(author = "RoutineHub Team")]
#[command(version = "0.1.0")]
#[command(about = "Scheduler and scene executor for recurring audio-endpoint routines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Overrides ROUTINEHUB_DATABASE_PATH for this invocation.
    #[arg(long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs the job generator, job runner, and HTTP surface until terminated.
    Serve {
        #[arg(long, value_name = "HOST")]
        host: Option<String>,
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Creates the crate's own tables and indices if they do not exist.
    InitDb,

    /// Routine management (schedule + scene + music policy).
    Routine {
        #[command(subcommand)]
        action: RoutineAction,
    },

    /// Scene management (coordinator + member volume targets).
    Scene {
        #[command(subcommand)]
        action: SceneAction,
    },

    /// Job inspection. Jobs are created by the generator or by `routine trigger`.
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Holiday registry management.
    Holiday {
        #[command(subcommand)]
        action: HolidayAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoutineAction {
    /// Creates a new routine from a JSON file (see Routine's serde shape).
    Create {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    List,
    Get {
        routine_id: String,
    },
    Delete {
        routine_id: String,
    },
    Enable {
        routine_id: String,
    },
    Disable {
        routine_id: String,
    },
    /// Sets the one-shot skip-next flag; cleared automatically once consumed
    /// by the next successful [crate::domain::entities::Routine::is_eligible] check by the generator.
    Skip {
        routine_id: String,
    },
    Unskip {
        routine_id: String,
    },
    Snooze {
        routine_id: String,
        /// RFC3339 instant to snooze until.
        until: String,
    },
    Unsnooze {
        routine_id: String,
    },
    /// Inserts a job with `scheduled_for = now` and idempotency key
    /// `manual:{routine_id}:{nanos}`, per SPEC_FULL.md §6.
    Trigger {
        routine_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SceneAction {
    Create {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    List,
    Get {
        scene_id: String,
    },
    Delete {
        scene_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobAction {
    Get {
        job_id: String,
    },
    ForRoutine {
        routine_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum HolidayAction {
    Add {
        /// Calendar date, YYYY-MM-DD.
        date: String,
        name: String,
        #[arg(long)]
        custom: bool,
    },
    List {
        from: String,
        to: String,
    },
    Check {
        date: String,
    },
    Delete {
        date: String,
    },
}
