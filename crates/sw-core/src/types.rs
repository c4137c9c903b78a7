//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Priority outside 1..=5.
    #[error("priority must be between 1 and 5, got {value}")]
    PriorityOutOfRange { value: i64 },

    /// Day of week outside 0..=6.
    #[error("day of week must be between 0 (Sunday) and 6 (Saturday), got {value}")]
    DayOfWeekOutOfRange { value: i64 },

    /// Wall-clock time not in `HH:MM` form.
    #[error("time must be in HH:MM format, got {value:?}")]
    InvalidWallTime { value: String },

    /// Window end is not after its start.
    #[error("end time {end} must be after start time {start}")]
    EmptyWindow { start: WallTime, end: WallTime },

    /// Invalid session status value.
    #[error("invalid session status: {value}")]
    InvalidSessionStatus { value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// The identity of the user whose schedule is being queried.
    ///
    /// Authentication happens upstream; the engine only needs a stable key.
    UserId, "user ID"
);

define_string_id!(
    /// A validated session type identifier.
    SessionTypeId, "session type ID"
);

/// Importance of a session type, 1 (lowest) to 5 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Priority used when an activity has no session type.
    pub const DEFAULT: Self = Self(3);

    /// Lowest priority that counts as high priority.
    const HIGH_THRESHOLD: u8 = 4;

    /// Creates a priority after range validation.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        match u8::try_from(value) {
            Ok(v @ 1..=5) => Ok(Self(v)),
            _ => Err(ValidationError::PriorityOutOfRange { value }),
        }
    }

    /// Returns the inner value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Priorities 4 and 5 are high priority.
    #[must_use]
    pub const fn is_high(self) -> bool {
        self.0 >= Self::HIGH_THRESHOLD
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Priority {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A local wall-clock time of day with minute precision (`HH:MM`, 24-hour).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallTime(NaiveTime);

impl WallTime {
    /// Creates a wall time from hour and minute.
    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidWallTime {
                value: format!("{hour:02}:{minute:02}"),
            })
    }

    /// Returns the time as a `NaiveTime`.
    #[must_use]
    pub const fn time(self) -> NaiveTime {
        self.0
    }
}

impl std::str::FromStr for WallTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidWallTime {
            value: s.to_string(),
        };
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Self::from_hm(hour, minute)
    }
}

impl TryFrom<String> for WallTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WallTime> for String {
    fn from(t: WallTime) -> Self {
        t.to_string()
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:02}:{:02}", self.0.hour(), self.0.minute()))
    }
}

/// A recurring weekly interval during which the user accepts sessions.
///
/// Times are local wall-clock times with no timezone of their own; they are
/// interpreted in the timezone of the resolved suggestion config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// Storage ID, absent for windows that have not been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 0 = Sunday through 6 = Saturday.
    pub day_of_week: u8,
    pub start_time: WallTime,
    pub end_time: WallTime,
}

impl AvailabilityWindow {
    /// Creates a window, rejecting bad days and empty intervals.
    pub fn new(day_of_week: i64, start: WallTime, end: WallTime) -> Result<Self, ValidationError> {
        let day = match u8::try_from(day_of_week) {
            Ok(d @ 0..=6) => d,
            _ => {
                return Err(ValidationError::DayOfWeekOutOfRange { value: day_of_week });
            }
        };
        if start >= end {
            return Err(ValidationError::EmptyWindow { start, end });
        }
        Ok(Self {
            id: None,
            day_of_week: day,
            start_time: start,
            end_time: end,
        })
    }

    /// Attaches a storage ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Lifecycle state of a stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ValidationError::InvalidSessionStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// A committed, non-cancelled session as seen by the suggestion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingSession {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Priority of the session's type.
    pub priority: Priority,
}

impl ExistingSession {
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// Session type metadata attached to every suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTypeInfo {
    pub id: SessionTypeId,
    pub name: String,
    pub priority: Priority,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(s: &str) -> WallTime {
        s.parse().unwrap()
    }

    #[test]
    fn user_id_rejects_empty() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
        assert!(UserId::new("local").is_ok());
    }

    #[test]
    fn session_type_id_serde_rejects_empty() {
        let result: Result<SessionTypeId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
        let parsed: SessionTypeId = serde_json::from_str("\"deep-work\"").unwrap();
        assert_eq!(parsed.as_str(), "deep-work");
    }

    #[test]
    fn priority_validates_range() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(6).is_err());
        assert!(Priority::new(-1).is_err());
        assert_eq!(Priority::new(1).unwrap().value(), 1);
        assert_eq!(Priority::new(5).unwrap().value(), 5);
    }

    #[test]
    fn priority_high_threshold() {
        assert!(!Priority::new(3).unwrap().is_high());
        assert!(Priority::new(4).unwrap().is_high());
        assert!(Priority::new(5).unwrap().is_high());
        assert_eq!(Priority::default(), Priority::DEFAULT);
        assert!(!Priority::DEFAULT.is_high());
    }

    #[test]
    fn priority_serde_rejects_out_of_range() {
        let result: Result<Priority, _> = serde_json::from_str("9");
        assert!(result.is_err());
        let parsed: Priority = serde_json::from_str("4").unwrap();
        assert_eq!(parsed.value(), 4);
    }

    #[test]
    fn wall_time_parses_hh_mm() {
        assert_eq!(wall("09:30").time(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(wall("00:00").time(), NaiveTime::MIN);
        assert_eq!(wall("23:59").to_string(), "23:59");
    }

    #[test]
    fn display_honours_width_and_alignment() {
        let priority = Priority::new(5).unwrap();
        assert_eq!(format!("{priority:>4}|{priority:<3}|"), "   5|5  |");
        assert_eq!(format!("{:>7}|", wall("09:05")), "  09:05|");
        assert_eq!(format!("{:<11}|", SessionStatus::Completed), "completed  |");
        assert_eq!(format!("{:>6}", UserId::new("bob").unwrap()), "   bob");
    }

    #[test]
    fn wall_time_rejects_malformed() {
        for bad in ["9:30", "24:00", "12:60", "12-30", "", "ab:cd", "12:300"] {
            assert!(bad.parse::<WallTime>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn wall_time_serializes_as_string() {
        let json = serde_json::to_string(&wall("07:05")).unwrap();
        assert_eq!(json, "\"07:05\"");
    }

    #[test]
    fn window_rejects_empty_interval() {
        let err = AvailabilityWindow::new(1, wall("10:00"), wall("10:00")).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyWindow { .. }));
        assert!(AvailabilityWindow::new(1, wall("11:00"), wall("10:00")).is_err());
    }

    #[test]
    fn window_rejects_bad_day() {
        assert!(AvailabilityWindow::new(7, wall("09:00"), wall("10:00")).is_err());
        assert!(AvailabilityWindow::new(-1, wall("09:00"), wall("10:00")).is_err());
    }

    #[test]
    fn window_with_id() {
        let window = AvailabilityWindow::new(1, wall("09:00"), wall("12:30")).unwrap();
        assert!(window.id.is_none());
        assert_eq!(window.with_id("w1").id.as_deref(), Some("w1"));
    }

    #[test]
    fn session_status_from_str() {
        assert_eq!(
            "scheduled".parse::<SessionStatus>().unwrap(),
            SessionStatus::Scheduled
        );
        assert_eq!(
            "CANCELLED".parse::<SessionStatus>().unwrap(),
            SessionStatus::Cancelled
        );
        assert!("pending".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn session_status_serde_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn existing_session_duration() {
        let session = ExistingSession {
            start_time: "2025-03-03T10:00:00Z".parse().unwrap(),
            end_time: "2025-03-03T11:30:00Z".parse().unwrap(),
            priority: Priority::DEFAULT,
        };
        assert_eq!(session.duration_minutes(), 90);
    }
}
