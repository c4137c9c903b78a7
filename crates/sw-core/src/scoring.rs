//! Heuristic desirability score for a single candidate slot.
//!
//! Rules are independent and accumulate on a base score:
//! - morning bonus for high-priority work when mornings are preferred
//! - fatigue penalty when the day already holds enough high-priority sessions
//! - spacing penalties for each session ending shortly before or starting
//!   shortly after the slot
//! - busy-day penalty once the day is past half of the daily cap
//!
//! Scores are not clamped and may go negative.

use std::fmt;

use chrono::Duration;
use serde::{Serialize, Serializer};

use crate::candidates::Slot;
use crate::config::SuggestionConfig;
use crate::day_load::DaySchedule;
use crate::time::Calendar;
use crate::types::{ExistingSession, Priority};

pub const BASE_SCORE: i32 = 100;
pub const MORNING_BONUS: i32 = 20;
pub const FATIGUE_PENALTY: i32 = 40;
pub const SPACING_PENALTY: i32 = 10;
pub const BUSY_DAY_PENALTY: i32 = 15;

/// Local hours counted as morning, start inclusive, end exclusive.
const MORNING_HOURS: std::ops::Range<u32> = 6..12;

/// Why a slot's score moved. Serializes as its human-readable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreReason {
    MorningSlot,
    HighPriorityDay,
    CloseToPrevious,
    CloseToNext,
    BusyDay,
    /// Substituted when no rule fired.
    Available,
}

impl ScoreReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MorningSlot => "Morning slot (optimal for high priority)",
            Self::HighPriorityDay => "Day already has high-priority sessions",
            Self::CloseToPrevious => "Close to previous session",
            Self::CloseToNext => "Close to next session",
            Self::BusyDay => "Day is already busy",
            Self::Available => "Available slot",
        }
    }
}

impl fmt::Display for ScoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for ScoreReason {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A slot with its score and the reasons behind it, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSlot {
    #[serde(flatten)]
    pub slot: Slot,
    pub score: i32,
    pub reasons: Vec<ScoreReason>,
}

/// Everything the scorer needs besides the slot itself.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a, C> {
    pub calendar: &'a C,
    pub priority: Priority,
    pub sessions: &'a [ExistingSession],
    pub config: &'a SuggestionConfig,
}

impl<C: Calendar> Scorer<'_, C> {
    /// Scores one slot against the schedule of its local day.
    ///
    /// Leaves `reasons` empty when nothing fired; substituting a default is
    /// the caller's job.
    pub fn score(&self, slot: Slot, day: &DaySchedule) -> CandidateSlot {
        let mut score = BASE_SCORE;
        let mut reasons = Vec::new();
        let high = self.priority.is_high();

        if self.config.prefer_mornings
            && high
            && MORNING_HOURS.contains(&self.calendar.local_hour(slot.start_time))
        {
            score += MORNING_BONUS;
            reasons.push(ScoreReason::MorningSlot);
        }

        if high && day.high_priority_count >= self.config.max_high_priority_per_day {
            score -= FATIGUE_PENALTY;
            reasons.push(ScoreReason::HighPriorityDay);
        }

        let ideal_gap = Duration::minutes(2 * i64::from(self.config.buffer_minutes));
        let zero = Duration::zero();
        for session in self.sessions {
            let gap_before = slot.start_time - session.end_time;
            if gap_before > zero && gap_before < ideal_gap {
                score -= SPACING_PENALTY;
                push_once(&mut reasons, ScoreReason::CloseToPrevious);
            }
            let gap_after = session.start_time - slot.end_time;
            if gap_after > zero && gap_after < ideal_gap {
                score -= SPACING_PENALTY;
                push_once(&mut reasons, ScoreReason::CloseToNext);
            }
        }

        // More than half of the daily cap.
        if day.total_minutes * 2 > i64::from(self.config.max_daily_minutes) {
            score -= BUSY_DAY_PENALTY;
            reasons.push(ScoreReason::BusyDay);
        }

        CandidateSlot {
            slot,
            score,
            reasons,
        }
    }
}

fn push_once(reasons: &mut Vec<ScoreReason>, reason: ScoreReason) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}
