//! Per-local-day aggregates of existing commitments.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::time::Calendar;
use crate::types::ExistingSession;

/// What is already committed on one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    /// Sessions with priority 4 or 5.
    pub high_priority_count: u32,
    pub total_minutes: i64,
}

impl DaySchedule {
    /// A day with nothing scheduled.
    #[must_use]
    pub const fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            high_priority_count: 0,
            total_minutes: 0,
        }
    }
}

/// Day schedules keyed by local date. Days without sessions have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayLoad {
    days: BTreeMap<NaiveDate, DaySchedule>,
}

impl DayLoad {
    /// Buckets sessions by the local day they start on.
    pub fn build<C: Calendar>(sessions: &[ExistingSession], calendar: &C) -> Self {
        let mut days: BTreeMap<NaiveDate, DaySchedule> = BTreeMap::new();
        for session in sessions {
            let date = calendar.local_date(session.start_time);
            let day = days.entry(date).or_insert_with(|| DaySchedule::empty(date));
            day.total_minutes += session.duration_minutes();
            if session.priority.is_high() {
                day.high_priority_count += 1;
            }
        }
        Self { days }
    }

    /// The schedule for the local day containing `instant`.
    pub fn for_instant<C: Calendar>(&self, instant: DateTime<Utc>, calendar: &C) -> DaySchedule {
        self.get(calendar.local_date(instant))
    }

    /// The schedule for a local date, empty when nothing is booked.
    pub fn get(&self, date: NaiveDate) -> DaySchedule {
        self.days
            .get(&date)
            .copied()
            .unwrap_or_else(|| DaySchedule::empty(date))
    }

    /// Number of days with at least one session.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
