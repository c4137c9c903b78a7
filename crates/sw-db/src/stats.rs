//! Aggregate statistics over a user's session history.
//!
//! Day-based figures (streak, this week) use local calendar days of the
//! supplied [`Calendar`]; everything else works on absolute instants.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;
use sw_core::{Calendar, SessionStatus, SessionTypeId, UserId};

use crate::{Database, DbError, SessionFilter, SessionRecord};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Summary of a user's sessions as of some instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_scheduled: usize,
    pub total_completed: usize,
    pub total_cancelled: usize,
    /// Completed share of finished (completed or cancelled) sessions, 0..=100.
    pub completion_rate: usize,
    /// All sessions divided by the weeks since the first one, at least one week.
    pub avg_sessions_per_week: f64,
    /// Mean whole-day gap between consecutive completed sessions.
    pub avg_gap_days: f64,
    pub total_minutes_completed: i64,
    pub total_hours_completed: f64,
    /// Consecutive local days with a completion, ending today or yesterday.
    pub current_streak: usize,
    /// Per type, in order of each type's first session.
    pub by_type: Vec<TypeStats>,
    pub this_week: WeekSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    pub type_id: SessionTypeId,
    pub name: String,
    pub color: Option<String>,
    pub count: usize,
    pub completed: usize,
    /// Minutes of completed sessions only.
    pub total_minutes: i64,
}

/// Sessions starting between local Sunday midnight and now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeekSummary {
    pub completed: usize,
    pub scheduled: usize,
    pub total: usize,
}

impl SessionStats {
    /// Computes statistics for `sessions` as seen at `now`.
    pub fn from_sessions<C: Calendar>(
        sessions: &[SessionRecord],
        calendar: &C,
        now: DateTime<Utc>,
    ) -> Self {
        let count = |status| sessions.iter().filter(|s| s.status == status).count();
        let total_scheduled = count(SessionStatus::Scheduled);
        let total_completed = count(SessionStatus::Completed);
        let total_cancelled = count(SessionStatus::Cancelled);

        let mut completed: Vec<&SessionRecord> = sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Completed)
            .collect();
        completed.sort_by_key(|s| s.start_time);

        let total_minutes_completed: i64 = completed.iter().map(|s| s.duration_minutes()).sum();

        Self {
            total_scheduled,
            total_completed,
            total_cancelled,
            completion_rate: completion_rate(total_completed, total_cancelled),
            avg_sessions_per_week: sessions_per_week(sessions, now),
            avg_gap_days: average_gap_days(&completed),
            total_minutes_completed,
            total_hours_completed: round_tenths(minutes_as_hours(total_minutes_completed)),
            current_streak: current_streak(&completed, calendar, now),
            by_type: by_type(sessions),
            this_week: this_week(sessions, calendar, now),
        }
    }
}

impl Database {
    /// Statistics over every session of `user`.
    pub fn session_stats<C: Calendar>(
        &self,
        user: &UserId,
        calendar: &C,
        now: DateTime<Utc>,
    ) -> Result<SessionStats, DbError> {
        let sessions = self.list_sessions(user, &SessionFilter::default())?;
        tracing::debug!(%user, sessions = sessions.len(), "computing session stats");
        Ok(SessionStats::from_sessions(&sessions, calendar, now))
    }
}

/// Whole days between two instants, rounded half up.
fn days_between(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    ((b - a).num_milliseconds().abs() + MILLIS_PER_DAY / 2) / MILLIS_PER_DAY
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[allow(clippy::cast_precision_loss)]
fn minutes_as_hours(minutes: i64) -> f64 {
    minutes as f64 / 60.0
}

fn completion_rate(completed: usize, cancelled: usize) -> usize {
    let finished = completed + cancelled;
    if finished == 0 {
        return 0;
    }
    (completed * 200 + finished) / (finished * 2)
}

#[allow(clippy::cast_precision_loss)]
fn sessions_per_week(sessions: &[SessionRecord], now: DateTime<Utc>) -> f64 {
    let Some(first) = sessions.iter().map(|s| s.start_time).min() else {
        return 0.0;
    };
    let span_days = days_between(first, now).max(1);
    let weeks = (span_days as f64 / 7.0).max(1.0);
    round_tenths(sessions.len() as f64 / weeks)
}

/// `completed` must be sorted by start time.
#[allow(clippy::cast_precision_loss)]
fn average_gap_days(completed: &[&SessionRecord]) -> f64 {
    let gaps: Vec<i64> = completed
        .windows(2)
        .map(|pair| days_between(pair[0].start_time, pair[1].start_time))
        .collect();
    if gaps.is_empty() {
        return 0.0;
    }
    round_tenths(gaps.iter().sum::<i64>() as f64 / gaps.len() as f64)
}

fn current_streak<C: Calendar>(
    completed: &[&SessionRecord],
    calendar: &C,
    now: DateTime<Utc>,
) -> usize {
    let days: BTreeSet<_> = completed
        .iter()
        .map(|s| calendar.local_date(s.start_time))
        .collect();
    let mut newest_first = days.into_iter().rev();
    let Some(mut previous) = newest_first.next() else {
        return 0;
    };

    let today = calendar.local_date(now);
    if (today - previous).num_days().abs() > 1 {
        return 0;
    }

    let mut streak = 1;
    for day in newest_first {
        if (previous - day).num_days() != 1 {
            break;
        }
        streak += 1;
        previous = day;
    }
    streak
}

fn by_type(sessions: &[SessionRecord]) -> Vec<TypeStats> {
    let mut index: HashMap<&SessionTypeId, usize> = HashMap::new();
    let mut types: Vec<TypeStats> = Vec::new();
    for session in sessions {
        let i = *index.entry(&session.session_type_id).or_insert_with(|| {
            types.push(TypeStats {
                type_id: session.session_type_id.clone(),
                name: session.session_type_name.clone(),
                color: session.color.clone(),
                count: 0,
                completed: 0,
                total_minutes: 0,
            });
            types.len() - 1
        });
        let entry = &mut types[i];
        entry.count += 1;
        if session.status == SessionStatus::Completed {
            entry.completed += 1;
            entry.total_minutes += session.duration_minutes();
        }
    }
    types
}

fn this_week<C: Calendar>(
    sessions: &[SessionRecord],
    calendar: &C,
    now: DateTime<Utc>,
) -> WeekSummary {
    let today = calendar.local_date(now);
    let sunday = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    let week_start = calendar.local_to_instant(sunday, NaiveTime::MIN);

    sessions
        .iter()
        .filter(|s| s.start_time >= week_start && s.start_time <= now)
        .fold(WeekSummary::default(), |mut week, s| {
            week.total += 1;
            match s.status {
                SessionStatus::Completed => week.completed += 1,
                SessionStatus::Scheduled => week.scheduled += 1,
                SessionStatus::Cancelled => {}
            }
            week
        })
}
