//! Read access the suggestion engine needs from persistent storage.

use chrono::{DateTime, Utc};

use crate::config::PartialConfig;
use crate::types::{AvailabilityWindow, ExistingSession, SessionTypeId, SessionTypeInfo, UserId};

/// Data source for [`crate::SuggestionEngine`].
///
/// Implemented by `sw-db` for SQLite and by test fixtures. Errors are passed
/// through to the engine's caller untouched.
pub trait ScheduleStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The user's weekly availability, ideally ordered by day then start time.
    fn list_availability(&self, user: &UserId) -> Result<Vec<AvailabilityWindow>, Self::Error>;

    /// Scheduled (not completed, not cancelled) sessions overlapping
    /// `[range_start, range_end)`, with their type's priority.
    fn list_scheduled_sessions(
        &self,
        user: &UserId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<ExistingSession>, Self::Error>;

    /// A session type owned by `user`, or `None`.
    fn get_session_type(
        &self,
        user: &UserId,
        id: &SessionTypeId,
    ) -> Result<Option<SessionTypeInfo>, Self::Error>;

    /// Stored suggestion preferences, or `None` if never saved.
    fn get_preferences(&self, user: &UserId) -> Result<Option<PartialConfig>, Self::Error>;
}
