//! Candidate slot generation.
//!
//! Expands weekly availability windows over concrete local days and walks each
//! window in fixed steps, keeping slots that are neither in the past nor
//! within the buffer around an existing session.
//!
//! # Algorithm Summary
//!
//! For each local day in the range, in order:
//! 1. Select the windows whose weekday matches the day
//! 2. Materialize the window as absolute instants in the calendar's timezone
//! 3. Skip windows shorter than the requested duration
//! 4. Step a slot start through the window every [`SLOT_STEP_MINUTES`],
//!    emitting `[start, start + duration)` when it passes both filters

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::time::{Calendar, LocalDayRange, add_minutes, overlaps};
use crate::types::{AvailabilityWindow, ExistingSession};

/// Distance between consecutive slot starts inside a window.
///
/// Independent of the requested duration and of the buffer.
pub const SLOT_STEP_MINUTES: i64 = 30;

/// An unscored, conflict-free start/end pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Slot {
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// Searches availability for slots of one duration.
#[derive(Debug, Clone, Copy)]
pub struct CandidateGenerator<'a, C> {
    calendar: &'a C,
    sessions: &'a [ExistingSession],
    duration_minutes: i64,
    buffer_minutes: i64,
    now: DateTime<Utc>,
}

impl<'a, C: Calendar> CandidateGenerator<'a, C> {
    pub fn new(
        calendar: &'a C,
        sessions: &'a [ExistingSession],
        duration_minutes: u32,
        buffer_minutes: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            calendar,
            sessions,
            duration_minutes: i64::from(duration_minutes),
            buffer_minutes: i64::from(buffer_minutes),
            now,
        }
    }

    /// All feasible slots in `range`, ordered by day, then window order, then time.
    pub fn generate(&self, range: LocalDayRange, windows: &[AvailabilityWindow]) -> Vec<Slot> {
        let mut slots = Vec::new();
        for date in range.days() {
            let weekday = date.weekday().num_days_from_sunday();
            for window in windows
                .iter()
                .filter(|w| u32::from(w.day_of_week) == weekday)
            {
                self.walk_window(date, window, &mut slots);
            }
        }
        slots
    }

    fn walk_window(&self, date: NaiveDate, window: &AvailabilityWindow, out: &mut Vec<Slot>) {
        let window_start = self
            .calendar
            .local_to_instant(date, window.start_time.time());
        let window_end = self.calendar.local_to_instant(date, window.end_time.time());

        if window_end - window_start < Duration::minutes(self.duration_minutes) {
            return;
        }

        let mut slot_start = window_start;
        while add_minutes(slot_start, self.duration_minutes) <= window_end {
            let slot = Slot {
                start_time: slot_start,
                end_time: add_minutes(slot_start, self.duration_minutes),
            };
            if slot.start_time >= self.now && !self.conflicts(&slot) {
                out.push(slot);
            }
            slot_start = add_minutes(slot_start, SLOT_STEP_MINUTES);
        }
    }

    /// Whether the buffer-padded slot touches any existing session.
    fn conflicts(&self, slot: &Slot) -> bool {
        let padded_start = add_minutes(slot.start_time, -self.buffer_minutes);
        let padded_end = add_minutes(slot.end_time, self.buffer_minutes);
        self.sessions
            .iter()
            .any(|s| overlaps(padded_start, padded_end, s.start_time, s.end_time))
    }
}
