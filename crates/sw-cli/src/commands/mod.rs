//! CLI subcommand implementations.

pub mod availability;
pub mod prefs;
pub mod sessions;
pub mod stats;
pub mod suggest;
pub mod types;
pub mod util;
