//! Core domain logic for slotwise.
//!
//! This crate contains the fundamental types and logic for:
//! - Time: local-calendar arithmetic over UTC instants
//! - Candidates: expanding weekly availability into feasible slots
//! - Scoring: ranking slots by priority, fatigue, spacing and load
//! - Suggestion: orchestrating a full suggestion call against a [`ScheduleStore`]

pub mod candidates;
pub mod config;
pub mod day_load;
pub mod scoring;
mod store;
mod suggest;
pub mod time;
pub mod types;

pub use config::{PartialConfig, SuggestionConfig};
pub use scoring::ScoreReason;
pub use store::ScheduleStore;
pub use suggest::{
    MAX_SUGGESTIONS, Suggestion, SuggestionEngine, SuggestionOutcome, SuggestionRequest,
    SuggestionResult,
};
pub use time::{Calendar, TzCalendar};
pub use types::{
    AvailabilityWindow, ExistingSession, Priority, SessionStatus, SessionTypeId, SessionTypeInfo,
    UserId, ValidationError, WallTime,
};
