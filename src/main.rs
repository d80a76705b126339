use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use routinehub::application::Config;
use routinehub::presentation::cli::commands::{
    HolidayCommand, InitDbCommand, JobCommand, Repositories, RoutineCommand, SceneCommand, ServeCommand,
};
use routinehub::presentation::cli::{Cli, Commands, HolidayAction, JobAction, RoutineAction, SceneAction};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("routinehub=debug,info")
    } else {
        EnvFilter::new("routinehub=info")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = Config::from_env();
    if let Some(database) = &cli.database {
        config = config.with_database_path(database.display().to_string());
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            ServeCommand::execute(config).await?;
        }
        Commands::InitDb => InitDbCommand::execute(&config.database_path)?,
        Commands::Routine { action } => {
            let repos = Repositories::open(&config.database_path)?;
            match action {
                RoutineAction::Create { file } => RoutineCommand::create(&repos, &file)?,
                RoutineAction::List => RoutineCommand::list(&repos)?,
                RoutineAction::Get { routine_id } => RoutineCommand::get(&repos, &routine_id)?,
                RoutineAction::Delete { routine_id } => RoutineCommand::delete(&repos, &routine_id)?,
                RoutineAction::Enable { routine_id } => RoutineCommand::set_enabled(&repos, &routine_id, true)?,
                RoutineAction::Disable { routine_id } => RoutineCommand::set_enabled(&repos, &routine_id, false)?,
                RoutineAction::Skip { routine_id } => RoutineCommand::set_skip_next(&repos, &routine_id, true)?,
                RoutineAction::Unskip { routine_id } => RoutineCommand::set_skip_next(&repos, &routine_id, false)?,
                RoutineAction::Snooze { routine_id, until } => RoutineCommand::snooze(&repos, &routine_id, &until)?,
                RoutineAction::Unsnooze { routine_id } => RoutineCommand::unsnooze(&repos, &routine_id)?,
                RoutineAction::Trigger { routine_id } => RoutineCommand::trigger(&repos, &routine_id)?,
            }
        }
        Commands::Scene { action } => {
            let repos = Repositories::open(&config.database_path)?;
            match action {
                SceneAction::Create { file } => SceneCommand::create(&repos, &file)?,
                SceneAction::List => SceneCommand::list(&repos)?,
                SceneAction::Get { scene_id } => SceneCommand::get(&repos, &scene_id)?,
                SceneAction::Delete { scene_id } => SceneCommand::delete(&repos, &scene_id)?,
            }
        }
        Commands::Job { action } => {
            let repos = Repositories::open(&config.database_path)?;
            match action {
                JobAction::Get { job_id } => JobCommand::get(&repos, &job_id)?,
                JobAction::ForRoutine { routine_id } => JobCommand::for_routine(&repos, &routine_id)?,
            }
        }
        Commands::Holiday { action } => {
            let repos = Repositories::open(&config.database_path)?;
            match action {
                HolidayAction::Add { date, name, custom } => HolidayCommand::add(&repos, &date, &name, custom)?,
                HolidayAction::List { from, to } => HolidayCommand::list(&repos, &from, &to)?,
                HolidayAction::Check { date } => HolidayCommand::check(&repos, &date)?,
                HolidayAction::Delete { date } => HolidayCommand::delete(&repos, &date)?,
            }
        }
    }

    Ok(())
}
