//! Slotwise CLI library.
//!
//! This crate provides the `sw` command-line interface over the suggestion
//! engine and its SQLite store.

mod cli;
pub mod commands;
mod config;

pub use cli::{AvailabilityAction, Cli, Commands, PrefsAction, SessionsAction, TypesAction};
pub use config::Config;
