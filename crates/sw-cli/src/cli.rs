//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{prefs, sessions, stats, suggest, types};

/// Session scheduling assistant.
///
/// Keeps your activity types, weekly availability and booked sessions, and
/// suggests when to fit in the next one.
#[derive(Debug, Parser)]
#[command(name = "sw", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// User to act as (defaults to `user_id` from the config).
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage session types (the activities you schedule).
    #[command(subcommand)]
    Types(TypesAction),

    /// Manage weekly availability windows.
    #[command(subcommand)]
    Availability(AvailabilityAction),

    /// Manage booked sessions.
    #[command(subcommand)]
    Sessions(SessionsAction),

    /// Show or change suggestion preferences.
    #[command(subcommand)]
    Prefs(PrefsAction),

    /// Suggest time slots for a new session.
    Suggest(suggest::SuggestArgs),

    /// Summarize completed, cancelled and upcoming sessions.
    Stats(stats::StatsArgs),
}

#[derive(Debug, Subcommand)]
pub enum TypesAction {
    /// Create a session type.
    Add(types::AddArgs),

    /// List session types, highest priority first.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Change fields of a session type.
    Update(types::UpdateArgs),

    /// Delete a session type and all of its sessions.
    Remove {
        /// Session type ID or name.
        session_type: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AvailabilityAction {
    /// Replace the whole week with the given windows.
    Set {
        /// Windows as `<day>@HH:MM-HH:MM`, e.g. `mon@09:00-12:00`.
        #[arg(required = true)]
        windows: Vec<String>,
    },

    /// List availability windows.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete one window.
    Remove {
        /// Window ID.
        id: String,
    },

    /// Delete every window.
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum SessionsAction {
    /// Book a session.
    Add(sessions::AddArgs),

    /// List sessions, oldest first.
    List(sessions::ListArgs),

    /// Show one session in full.
    Show {
        /// Session ID.
        id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the next scheduled sessions.
    Upcoming {
        /// Maximum number of sessions to show.
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=100))]
        limit: u32,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Mark a session as completed.
    Complete {
        /// Session ID.
        id: String,
    },

    /// Mark a session as cancelled.
    Cancel {
        /// Session ID.
        id: String,
    },

    /// Move a session to a new time.
    Reschedule(sessions::RescheduleArgs),

    /// Delete a session.
    Remove {
        /// Session ID.
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PrefsAction {
    /// Show the preferences suggestions use.
    Show {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Change stored preferences; unspecified fields keep their value.
    Set(prefs::SetArgs),
}
