use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use sw_core::{SessionStatus, UserId};
use tracing_subscriber::EnvFilter;

use sw_cli::commands::{availability, prefs, sessions, stats, suggest, types};
use sw_cli::{
    AvailabilityAction, Cli, Commands, Config, PrefsAction, SessionsAction, TypesAction,
};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(sw_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = sw_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let user = UserId::new(cli.user.as_deref().unwrap_or(&config.user_id))
        .context("invalid user id")?;
    let mut out = std::io::stdout().lock();

    match command {
        Commands::Types(action) => match action {
            TypesAction::Add(args) => types::add(&mut out, &mut db, &user, args)?,
            TypesAction::List { json } => types::list(&mut out, &db, &user, *json)?,
            TypesAction::Update(args) => types::update(&mut out, &mut db, &user, args)?,
            TypesAction::Remove { session_type } => {
                types::remove(&mut out, &mut db, &user, session_type)?;
            }
        },
        Commands::Availability(action) => match action {
            AvailabilityAction::Set { windows } => {
                availability::set(&mut out, &mut db, &user, windows)?;
            }
            AvailabilityAction::List { json } => availability::list(&mut out, &db, &user, *json)?,
            AvailabilityAction::Remove { id } => availability::remove(&mut out, &mut db, &user, id)?,
            AvailabilityAction::Clear => availability::clear(&mut out, &mut db, &user)?,
        },
        Commands::Sessions(action) => {
            let now = Utc::now();
            match action {
                SessionsAction::Add(args) => sessions::add(&mut out, &mut db, &user, args, now)?,
                SessionsAction::List(args) => sessions::list(&mut out, &db, &user, args, now)?,
                SessionsAction::Show { id, json } => {
                    sessions::show(&mut out, &db, &user, id, *json)?;
                }
                SessionsAction::Upcoming { limit, json } => {
                    let limit = usize::try_from(*limit).context("limit out of range")?;
                    sessions::upcoming(&mut out, &db, &user, limit, *json)?;
                }
                SessionsAction::Complete { id } => {
                    sessions::set_status(&mut out, &mut db, &user, id, SessionStatus::Completed)?;
                }
                SessionsAction::Cancel { id } => {
                    sessions::set_status(&mut out, &mut db, &user, id, SessionStatus::Cancelled)?;
                }
                SessionsAction::Reschedule(args) => {
                    sessions::reschedule(&mut out, &mut db, &user, args, now)?;
                }
                SessionsAction::Remove { id } => sessions::remove(&mut out, &mut db, &user, id)?,
            }
        }
        Commands::Prefs(action) => match action {
            PrefsAction::Show { json } => {
                prefs::show(&mut out, &db, &user, &config.suggestions, *json)?;
            }
            PrefsAction::Set(args) => prefs::set(&mut out, &mut db, &user, args)?,
        },
        Commands::Suggest(args) => suggest::run(&mut out, &db, &user, &config, args)?,
        Commands::Stats(args) => stats::run(&mut out, &db, &user, &config, args)?,
    }

    out.flush()?;
    Ok(())
}
