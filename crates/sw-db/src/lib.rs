//! Storage layer for slotwise.
//!
//! Persists session types, sessions, weekly availability and suggestion
//! preferences using `rusqlite`, and implements [`ScheduleStore`] so the
//! suggestion engine can read straight from the database. [`SessionStats`]
//! summarizes a user's history.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared without external
//! synchronization (e.g. a `Mutex<Database>`).
//!
//! # Schema
//!
//! ## Ownership
//!
//! Every row carries a `user_id`. All reads and writes filter on it, so a row
//! owned by another user behaves exactly like a missing row ([`DbError::NotFound`]).
//!
//! ## Timestamp Format
//!
//! Session timestamps are stored as TEXT in RFC 3339 with millisecond precision
//! and a `Z` suffix (e.g., `2025-01-15T10:30:00.000Z`). The fixed width keeps
//! lexicographic ordering identical to chronological ordering, which the range
//! queries rely on.
//!
//! Availability times are stored as `HH:MM` wall-clock strings; they have no
//! date or timezone until the engine materializes them.

use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use sw_core::{
    AvailabilityWindow, ExistingSession, PartialConfig, Priority, ScheduleStore, SessionStatus,
    SessionTypeId, SessionTypeInfo, SuggestionConfig, UserId, ValidationError, WallTime,
};
use thiserror::Error;
use uuid::Uuid;

mod stats;

pub use stats::{SessionStats, TypeStats, WeekSummary};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// No row with this ID exists for the user.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// A session type with the same name already exists for the user.
    #[error("a session type named {name:?} already exists")]
    Conflict { name: String },
    /// The requested time overlaps a scheduled session.
    #[error("this time slot conflicts with an existing session ({existing_id})")]
    SessionConflict { existing_id: String },
    /// The session is already in the requested terminal state.
    #[error("session {id} is already {status}")]
    AlreadyInStatus { id: String, status: SessionStatus },
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {row_id}: {timestamp}")]
    TimestampParse {
        row_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored or supplied value failed domain validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A session type with usage statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionTypeRecord {
    pub id: SessionTypeId,
    pub name: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub completed_sessions: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionTypeRecord {
    /// The metadata the suggestion engine attaches to suggestions.
    pub fn info(&self) -> SessionTypeInfo {
        SessionTypeInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            priority: self.priority,
            color: self.color.clone(),
            icon: self.icon.clone(),
        }
    }
}

/// Input for creating a session type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionType {
    pub name: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Partial update of a session type; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTypeUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// A planned session joined with its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub session_type_id: SessionTypeId,
    pub session_type_name: String,
    pub priority: Priority,
    pub color: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// Input for scheduling a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub session_type_id: SessionTypeId,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: Option<String>,
}

/// Optional filters for [`Database::list_sessions`]. `from`/`to` bound the
/// start time, both inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub session_type_id: Option<SessionTypeId>,
    pub status: Option<SessionStatus>,
}

/// Suggestion preferences as stored; every field is present once a row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredPreferences {
    pub max_daily_minutes: u32,
    pub buffer_minutes: u32,
    pub prefer_mornings: bool,
    pub max_high_priority_per_day: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoredPreferences> for PartialConfig {
    fn from(prefs: &StoredPreferences) -> Self {
        Self {
            max_daily_minutes: Some(prefs.max_daily_minutes),
            buffer_minutes: Some(prefs.buffer_minutes),
            prefer_mornings: Some(prefs.prefer_mornings),
            max_high_priority_per_day: Some(prefs.max_high_priority_per_day),
            timezone: None,
        }
    }
}

const SESSION_TYPE_COLUMNS: &str = "
    t.id, t.name, t.category, t.priority, t.color, t.icon, t.created_at, t.updated_at,
    (SELECT COUNT(*) FROM sessions s WHERE s.session_type_id = t.id AND s.status = 'completed')
";

const SESSION_COLUMNS: &str = "
    s.id, s.session_type_id, t.name, t.priority, t.color, s.start_time, s.end_time,
    s.notes, s.status, s.created_at, s.updated_at
";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS session_types (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                category TEXT,
                priority INTEGER NOT NULL DEFAULT 3,
                color TEXT,
                icon TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, name)
            );

            -- start_time/end_time: RFC 3339 UTC with milliseconds
            -- status: 'scheduled', 'completed' or 'cancelled'
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                session_type_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                notes TEXT,
                status TEXT NOT NULL DEFAULT 'scheduled',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (session_type_id) REFERENCES session_types(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user_start ON sessions(user_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_sessions_type ON sessions(session_type_id);

            -- day_of_week: 0 = Sunday; start_time/end_time: 'HH:MM'
            CREATE TABLE IF NOT EXISTS availability (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                day_of_week INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_availability_user ON availability(user_id, day_of_week);

            CREATE TABLE IF NOT EXISTS user_preferences (
                user_id TEXT PRIMARY KEY,
                max_daily_minutes INTEGER NOT NULL,
                buffer_minutes INTEGER NOT NULL,
                prefer_mornings INTEGER NOT NULL,
                max_high_priority_per_day INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Session types
    // ---------------------------------------------------------------------

    /// Creates a session type. Names are unique per user.
    pub fn create_session_type(
        &mut self,
        user: &UserId,
        new: &NewSessionType,
    ) -> Result<SessionTypeRecord, DbError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "name" }.into());
        }
        if self.session_type_id_by_name(user, name)?.is_some() {
            return Err(DbError::Conflict {
                name: name.to_string(),
            });
        }

        let id = Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        self.conn.execute(
            "
            INSERT INTO session_types
            (id, user_id, name, category, priority, color, icon, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                id,
                user.as_str(),
                name,
                new.category,
                new.priority.value(),
                new.color,
                new.icon,
                now,
                now,
            ],
        )?;
        tracing::debug!(%user, %id, name, "created session type");
        self.require_session_type(user, &SessionTypeId::new(id)?)
    }

    /// Lists the user's session types, highest priority first, then by name.
    pub fn list_session_types(&self, user: &UserId) -> Result<Vec<SessionTypeRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {SESSION_TYPE_COLUMNS}
            FROM session_types t
            WHERE t.user_id = ?
            ORDER BY t.priority DESC, t.name ASC
            "
        ))?;
        let rows = stmt.query_map([user.as_str()], RawSessionType::from_row)?;
        let mut types = Vec::new();
        for row in rows {
            types.push(row?.into_record()?);
        }
        Ok(types)
    }

    /// Fetches one session type, or `None` if it does not exist for the user.
    pub fn session_type(
        &self,
        user: &UserId,
        id: &SessionTypeId,
    ) -> Result<Option<SessionTypeRecord>, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "
                    SELECT {SESSION_TYPE_COLUMNS}
                    FROM session_types t
                    WHERE t.user_id = ? AND t.id = ?
                    "
                ),
                params![user.as_str(), id.as_str()],
                RawSessionType::from_row,
            )
            .optional()?;
        raw.map(RawSessionType::into_record).transpose()
    }

    /// Resolves a session type by exact name.
    pub fn session_type_by_name(
        &self,
        user: &UserId,
        name: &str,
    ) -> Result<Option<SessionTypeRecord>, DbError> {
        match self.session_type_id_by_name(user, name)? {
            Some(id) => self.session_type(user, &SessionTypeId::new(id)?),
            None => Ok(None),
        }
    }

    /// Applies a partial update. Renaming onto an existing name is a conflict.
    pub fn update_session_type(
        &mut self,
        user: &UserId,
        id: &SessionTypeId,
        update: &SessionTypeUpdate,
    ) -> Result<SessionTypeRecord, DbError> {
        let existing = self.require_session_type(user, id)?;

        let name = match update.name.as_deref().map(str::trim) {
            Some("") => return Err(ValidationError::Empty { field: "name" }.into()),
            Some(name) if name != existing.name => {
                if self.session_type_id_by_name(user, name)?.is_some() {
                    return Err(DbError::Conflict {
                        name: name.to_string(),
                    });
                }
                name.to_string()
            }
            _ => existing.name,
        };

        self.conn.execute(
            "
            UPDATE session_types
            SET name = ?, category = ?, priority = ?, color = ?, icon = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            ",
            params![
                name,
                update.category.as_ref().or(existing.category.as_ref()),
                update.priority.unwrap_or(existing.priority).value(),
                update.color.as_ref().or(existing.color.as_ref()),
                update.icon.as_ref().or(existing.icon.as_ref()),
                format_timestamp(Utc::now()),
                id.as_str(),
                user.as_str(),
            ],
        )?;
        self.require_session_type(user, id)
    }

    /// Deletes a session type together with all of its sessions.
    pub fn delete_session_type(&mut self, user: &UserId, id: &SessionTypeId) -> Result<(), DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM session_types WHERE id = ? AND user_id = ?",
            params![id.as_str(), user.as_str()],
        )?;
        if deleted == 0 {
            return Err(not_found("session type", id.as_str()));
        }
        tracing::debug!(%user, %id, "deleted session type");
        Ok(())
    }

    fn require_session_type(
        &self,
        user: &UserId,
        id: &SessionTypeId,
    ) -> Result<SessionTypeRecord, DbError> {
        self.session_type(user, id)?
            .ok_or_else(|| not_found("session type", id.as_str()))
    }

    fn session_type_id_by_name(&self, user: &UserId, name: &str) -> Result<Option<String>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM session_types WHERE user_id = ? AND name = ?",
                params![user.as_str(), name],
                |row| row.get(0),
            )
            .optional()?)
    }

    // ---------------------------------------------------------------------
    // Availability
    // ---------------------------------------------------------------------

    /// Lists the user's availability windows ordered by day, then start time.
    pub fn availability_windows(&self, user: &UserId) -> Result<Vec<AvailabilityWindow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, day_of_week, start_time, end_time
            FROM availability
            WHERE user_id = ?
            ORDER BY day_of_week ASC, start_time ASC
            ",
        )?;
        let rows = stmt.query_map([user.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut windows = Vec::new();
        for row in rows {
            let (id, day, start, end) = row?;
            let window =
                AvailabilityWindow::new(day, start.parse::<WallTime>()?, end.parse::<WallTime>()?)?;
            windows.push(window.with_id(id));
        }
        Ok(windows)
    }

    /// Replaces the user's whole weekly availability atomically.
    ///
    /// Returns the stored windows with their new IDs.
    pub fn replace_availability(
        &mut self,
        user: &UserId,
        windows: &[AvailabilityWindow],
    ) -> Result<Vec<AvailabilityWindow>, DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM availability WHERE user_id = ?", [user.as_str()])?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO availability (id, user_id, day_of_week, start_time, end_time)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for window in windows {
                stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    user.as_str(),
                    window.day_of_week,
                    window.start_time.to_string(),
                    window.end_time.to_string(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(%user, windows = windows.len(), "replaced availability");
        self.availability_windows(user)
    }

    /// Deletes one availability window.
    pub fn delete_availability(&mut self, user: &UserId, id: &str) -> Result<(), DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM availability WHERE id = ? AND user_id = ?",
            params![id, user.as_str()],
        )?;
        if deleted == 0 {
            return Err(not_found("availability window", id));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    /// Schedules a session after checking its type and conflicts.
    pub fn create_session(&mut self, user: &UserId, new: &NewSession) -> Result<SessionRecord, DbError> {
        self.require_session_type(user, &new.session_type_id)?;
        let end_time = new.start_time + Duration::minutes(i64::from(new.duration_minutes));
        self.check_conflict(user, new.start_time, end_time, None)?;

        let id = Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        self.conn.execute(
            "
            INSERT INTO sessions
            (id, user_id, session_type_id, start_time, end_time, notes, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'scheduled', ?, ?)
            ",
            params![
                id,
                user.as_str(),
                new.session_type_id.as_str(),
                format_timestamp(new.start_time),
                format_timestamp(end_time),
                new.notes,
                now,
                now,
            ],
        )?;
        tracing::debug!(%user, %id, start = %new.start_time, "created session");
        self.require_session(user, &id)
    }

    /// Lists sessions ordered by start time.
    pub fn list_sessions(
        &self,
        user: &UserId,
        filter: &SessionFilter,
    ) -> Result<Vec<SessionRecord>, DbError> {
        let mut sql = format!(
            "
            SELECT {SESSION_COLUMNS}
            FROM sessions s
            JOIN session_types t ON t.id = s.session_type_id
            WHERE s.user_id = ?
            "
        );
        let mut values: Vec<String> = vec![user.to_string()];
        if let Some(from) = filter.from {
            sql.push_str(" AND s.start_time >= ?");
            values.push(format_timestamp(from));
        }
        if let Some(to) = filter.to {
            sql.push_str(" AND s.start_time <= ?");
            values.push(format_timestamp(to));
        }
        if let Some(type_id) = &filter.session_type_id {
            sql.push_str(" AND s.session_type_id = ?");
            values.push(type_id.to_string());
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND s.status = ?");
            values.push(status.as_str().to_string());
        }
        sql.push_str(" ORDER BY s.start_time ASC, s.id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values), RawSession::from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_record()?);
        }
        Ok(sessions)
    }

    /// The next `limit` scheduled sessions starting at or after now.
    pub fn upcoming_sessions(&self, user: &UserId, limit: usize) -> Result<Vec<SessionRecord>, DbError> {
        self.upcoming_sessions_at(user, limit, Utc::now())
    }

    fn upcoming_sessions_at(
        &self,
        user: &UserId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {SESSION_COLUMNS}
            FROM sessions s
            JOIN session_types t ON t.id = s.session_type_id
            WHERE s.user_id = ? AND s.status = 'scheduled' AND s.start_time >= ?
            ORDER BY s.start_time ASC, s.id ASC
            LIMIT ?
            "
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(
            params![user.as_str(), format_timestamp(now), limit],
            RawSession::from_row,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_record()?);
        }
        Ok(sessions)
    }

    /// Fetches one session, or `None` if it does not exist for the user.
    pub fn session(&self, user: &UserId, id: &str) -> Result<Option<SessionRecord>, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "
                    SELECT {SESSION_COLUMNS}
                    FROM sessions s
                    JOIN session_types t ON t.id = s.session_type_id
                    WHERE s.user_id = ? AND s.id = ?
                    "
                ),
                params![user.as_str(), id],
                RawSession::from_row,
            )
            .optional()?;
        raw.map(RawSession::into_record).transpose()
    }

    /// Marks a session completed or cancelled.
    ///
    /// Setting a session to the status it already has is rejected.
    pub fn set_session_status(
        &mut self,
        user: &UserId,
        id: &str,
        status: SessionStatus,
    ) -> Result<SessionRecord, DbError> {
        let existing = self.require_session(user, id)?;
        if existing.status == status {
            return Err(DbError::AlreadyInStatus {
                id: id.to_string(),
                status,
            });
        }
        self.conn.execute(
            "UPDATE sessions SET status = ?, updated_at = ? WHERE id = ? AND user_id = ?",
            params![
                status.as_str(),
                format_timestamp(Utc::now()),
                id,
                user.as_str()
            ],
        )?;
        tracing::debug!(%user, id, %status, "updated session status");
        self.require_session(user, id)
    }

    /// Moves a session, checking conflicts against every other scheduled session.
    pub fn reschedule_session(
        &mut self,
        user: &UserId,
        id: &str,
        start_time: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<SessionRecord, DbError> {
        self.require_session(user, id)?;
        let end_time = start_time + Duration::minutes(i64::from(duration_minutes));
        self.check_conflict(user, start_time, end_time, Some(id))?;
        self.conn.execute(
            "
            UPDATE sessions SET start_time = ?, end_time = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            ",
            params![
                format_timestamp(start_time),
                format_timestamp(end_time),
                format_timestamp(Utc::now()),
                id,
                user.as_str(),
            ],
        )?;
        self.require_session(user, id)
    }

    /// Deletes one session.
    pub fn delete_session(&mut self, user: &UserId, id: &str) -> Result<(), DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM sessions WHERE id = ? AND user_id = ?",
            params![id, user.as_str()],
        )?;
        if deleted == 0 {
            return Err(not_found("session", id));
        }
        Ok(())
    }

    /// Scheduled sessions overlapping `[range_start, range_end)`, with their
    /// type's priority.
    pub fn scheduled_sessions_in_range(
        &self,
        user: &UserId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<ExistingSession>, DbError> {
        if range_end <= range_start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT s.id, s.start_time, s.end_time, t.priority
            FROM sessions s
            JOIN session_types t ON t.id = s.session_type_id
            WHERE s.user_id = ? AND s.status = 'scheduled'
              AND s.start_time < ? AND s.end_time > ?
            ORDER BY s.start_time ASC, s.id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                user.as_str(),
                format_timestamp(range_end),
                format_timestamp(range_start)
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            let (id, start, end, priority) = row?;
            sessions.push(ExistingSession {
                start_time: parse_timestamp(&start, &id)?,
                end_time: parse_timestamp(&end, &id)?,
                priority: Priority::new(priority)?,
            });
        }
        Ok(sessions)
    }

    fn require_session(&self, user: &UserId, id: &str) -> Result<SessionRecord, DbError> {
        self.session(user, id)?
            .ok_or_else(|| not_found("session", id))
    }

    /// Fails with [`DbError::SessionConflict`] if a scheduled session other than
    /// `exclude_id` overlaps `[start, end)`.
    fn check_conflict(
        &self,
        user: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<(), DbError> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "
                SELECT id FROM sessions
                WHERE user_id = ? AND status = 'scheduled'
                  AND start_time < ? AND end_time > ?
                  AND (? IS NULL OR id != ?)
                LIMIT 1
                ",
                params![
                    user.as_str(),
                    format_timestamp(end),
                    format_timestamp(start),
                    exclude_id,
                    exclude_id,
                ],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(existing_id) => Err(DbError::SessionConflict { existing_id }),
            None => Ok(()),
        }
    }

    // ---------------------------------------------------------------------
    // Preferences
    // ---------------------------------------------------------------------

    /// Stored preferences, or `None` if the user never saved any.
    pub fn preferences(&self, user: &UserId) -> Result<Option<StoredPreferences>, DbError> {
        let raw = self
            .conn
            .query_row(
                "
                SELECT max_daily_minutes, buffer_minutes, prefer_mornings,
                       max_high_priority_per_day, updated_at
                FROM user_preferences
                WHERE user_id = ?
                ",
                [user.as_str()],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        raw.map(|(max_daily, buffer, mornings, max_high, updated_at)| {
            Ok(StoredPreferences {
                max_daily_minutes: max_daily,
                buffer_minutes: buffer,
                prefer_mornings: mornings,
                max_high_priority_per_day: max_high,
                updated_at: parse_timestamp(&updated_at, user.as_str())?,
            })
        })
        .transpose()
    }

    /// Updates only the supplied fields. The first save fills the rest with
    /// built-in defaults. A timezone in `update` is ignored.
    pub fn upsert_preferences(
        &mut self,
        user: &UserId,
        update: &PartialConfig,
    ) -> Result<StoredPreferences, DbError> {
        let base = match self.preferences(user)? {
            Some(existing) => PartialConfig::from(&existing),
            None => PartialConfig::from(SuggestionConfig::default()),
        };
        let merged = SuggestionConfig::resolve(Some(&base), None, Some(update));

        self.conn.execute(
            "
            INSERT INTO user_preferences
            (user_id, max_daily_minutes, buffer_minutes, prefer_mornings, max_high_priority_per_day, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                max_daily_minutes = excluded.max_daily_minutes,
                buffer_minutes = excluded.buffer_minutes,
                prefer_mornings = excluded.prefer_mornings,
                max_high_priority_per_day = excluded.max_high_priority_per_day,
                updated_at = excluded.updated_at
            ",
            params![
                user.as_str(),
                merged.max_daily_minutes,
                merged.buffer_minutes,
                merged.prefer_mornings,
                merged.max_high_priority_per_day,
                format_timestamp(Utc::now()),
            ],
        )?;
        tracing::debug!(%user, ?merged, "saved preferences");
        self.preferences(user)?
            .ok_or_else(|| not_found("preferences", user.as_str()))
    }
}

impl ScheduleStore for Database {
    type Error = DbError;

    fn list_availability(&self, user: &UserId) -> Result<Vec<AvailabilityWindow>, DbError> {
        self.availability_windows(user)
    }

    fn list_scheduled_sessions(
        &self,
        user: &UserId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<ExistingSession>, DbError> {
        self.scheduled_sessions_in_range(user, range_start, range_end)
    }

    fn get_session_type(
        &self,
        user: &UserId,
        id: &SessionTypeId,
    ) -> Result<Option<SessionTypeInfo>, DbError> {
        Ok(self.session_type(user, id)?.map(|t| t.info()))
    }

    fn get_preferences(&self, user: &UserId) -> Result<Option<PartialConfig>, DbError> {
        Ok(self.preferences(user)?.as_ref().map(PartialConfig::from))
    }
}

/// Session type columns as read, before validation.
struct RawSessionType {
    id: String,
    name: String,
    category: Option<String>,
    priority: i64,
    color: Option<String>,
    icon: Option<String>,
    created_at: String,
    updated_at: String,
    completed_sessions: i64,
}

impl RawSessionType {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            priority: row.get(3)?,
            color: row.get(4)?,
            icon: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            completed_sessions: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<SessionTypeRecord, DbError> {
        Ok(SessionTypeRecord {
            created_at: parse_timestamp(&self.created_at, &self.id)?,
            updated_at: parse_timestamp(&self.updated_at, &self.id)?,
            id: SessionTypeId::new(self.id)?,
            name: self.name,
            category: self.category,
            priority: Priority::new(self.priority)?,
            color: self.color,
            icon: self.icon,
            completed_sessions: self.completed_sessions,
        })
    }
}

/// Session columns joined with the type, before validation.
struct RawSession {
    id: String,
    session_type_id: String,
    session_type_name: String,
    priority: i64,
    color: Option<String>,
    start_time: String,
    end_time: String,
    notes: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_type_id: row.get(1)?,
            session_type_name: row.get(2)?,
            priority: row.get(3)?,
            color: row.get(4)?,
            start_time: row.get(5)?,
            end_time: row.get(6)?,
            notes: row.get(7)?,
            status: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_record(self) -> Result<SessionRecord, DbError> {
        Ok(SessionRecord {
            start_time: parse_timestamp(&self.start_time, &self.id)?,
            end_time: parse_timestamp(&self.end_time, &self.id)?,
            created_at: parse_timestamp(&self.created_at, &self.id)?,
            updated_at: parse_timestamp(&self.updated_at, &self.id)?,
            session_type_id: SessionTypeId::new(self.session_type_id)?,
            session_type_name: self.session_type_name,
            priority: Priority::new(self.priority)?,
            color: self.color,
            notes: self.notes,
            status: self.status.parse()?,
            id: self.id,
        })
    }
}

fn not_found(entity: &'static str, id: &str) -> DbError {
    DbError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn parse_timestamp(timestamp: &str, row_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            row_id: row_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
