//! Slot suggestion orchestration.
//!
//! Loads a user's availability and commitments, resolves the tuning config,
//! and turns candidate slots into a ranked, truncated list of suggestions.
//! Every call recomputes from scratch; nothing is cached between calls.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::candidates::CandidateGenerator;
use crate::config::{PartialConfig, SuggestionConfig};
use crate::day_load::DayLoad;
use crate::scoring::{CandidateSlot, ScoreReason, Scorer};
use crate::store::ScheduleStore;
use crate::time::{LocalDayRange, TzCalendar};
use crate::types::{Priority, SessionTypeId, SessionTypeInfo, UserId};

/// Upper bound on returned suggestions.
pub const MAX_SUGGESTIONS: usize = 10;

/// Input of one suggestion call.
///
/// Assumed validated by the caller (duration bounds, `end_date >= start_date`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub start_date: DateTime<Utc>,
    /// Treated as a date: the whole local day it names is searched.
    pub end_date: DateTime<Utc>,
    pub session_type_id: Option<SessionTypeId>,
    pub duration_minutes: u32,
    /// Per-request override tier, including the caller's timezone.
    pub config: Option<PartialConfig>,
}

/// A proposed slot, ready for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub score: i32,
    /// Never empty.
    pub reasons: Vec<ScoreReason>,
    pub session_type: Option<SessionTypeInfo>,
}

/// Why a result does or does not contain suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionOutcome {
    Found,
    /// The user has no availability windows at all.
    NoAvailability,
    /// Availability exists but every slot is past or conflicting.
    NoFeasibleSlots,
}

/// Result of a suggestion call. Empty results are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionResult {
    pub suggestions: Vec<Suggestion>,
    pub message: String,
    pub outcome: SuggestionOutcome,
}

impl SuggestionResult {
    fn no_availability() -> Self {
        Self {
            suggestions: Vec::new(),
            message: "No availability windows set. Please configure your availability."
                .to_string(),
            outcome: SuggestionOutcome::NoAvailability,
        }
    }

    fn no_feasible_slots() -> Self {
        Self {
            suggestions: Vec::new(),
            message: "No available time slots found in the specified range.".to_string(),
            outcome: SuggestionOutcome::NoFeasibleSlots,
        }
    }

    fn found(suggestions: Vec<Suggestion>) -> Self {
        Self {
            message: format!("Found {} suggested time slots", suggestions.len()),
            suggestions,
            outcome: SuggestionOutcome::Found,
        }
    }
}

/// Entry point of the suggestion engine.
///
/// Holds only the system-defaults config tier; it is safe to share and reuse.
#[derive(Debug, Clone, Default)]
pub struct SuggestionEngine {
    defaults: PartialConfig,
}

impl SuggestionEngine {
    /// Creates an engine whose lowest config tier is `defaults`
    /// (built-in values fill whatever it leaves unset).
    pub const fn new(defaults: PartialConfig) -> Self {
        Self { defaults }
    }

    /// Suggests slots for `user` as of the current time.
    pub fn suggest<S: ScheduleStore>(
        &self,
        store: &S,
        user: &UserId,
        request: &SuggestionRequest,
    ) -> Result<SuggestionResult, S::Error> {
        self.suggest_at(store, user, request, Utc::now())
    }

    /// Suggests slots for `user`, treating `now` as the current time.
    pub fn suggest_at<S: ScheduleStore>(
        &self,
        store: &S,
        user: &UserId,
        request: &SuggestionRequest,
        now: DateTime<Utc>,
    ) -> Result<SuggestionResult, S::Error> {
        let stored = store.get_preferences(user)?;
        let config = SuggestionConfig::resolve(
            Some(&self.defaults),
            stored.as_ref(),
            request.config.as_ref(),
        );
        let calendar = TzCalendar::new(&config.timezone);
        let range = LocalDayRange::from_instants(request.start_date, request.end_date, &calendar);
        tracing::debug!(
            ?config,
            first_day = %range.first,
            last_day = %range.last,
            days = range.len(),
            "resolved suggestion config"
        );

        let windows = store.list_availability(user)?;
        if windows.is_empty() {
            return Ok(SuggestionResult::no_availability());
        }
        if range.is_empty() {
            return Ok(SuggestionResult::no_feasible_slots());
        }

        // Sessions just outside the range still affect buffers and spacing.
        let padding = Duration::minutes(2 * i64::from(config.buffer_minutes));
        let (range_start, range_end) = range.bounds(&calendar);
        let sessions = store.list_scheduled_sessions(
            user,
            range_start.checked_sub_signed(padding).unwrap_or(range_start),
            range_end.checked_add_signed(padding).unwrap_or(range_end),
        )?;

        let session_type = match &request.session_type_id {
            Some(id) => store.get_session_type(user, id)?,
            None => None,
        };
        let priority = session_type
            .as_ref()
            .map_or(Priority::DEFAULT, |t| t.priority);

        let day_load = DayLoad::build(&sessions, &calendar);
        let slots = CandidateGenerator::new(
            &calendar,
            &sessions,
            request.duration_minutes,
            config.buffer_minutes,
            now,
        )
        .generate(range, &windows);
        tracing::debug!(
            windows = windows.len(),
            sessions = sessions.len(),
            busy_days = day_load.len(),
            candidates = slots.len(),
            "generated candidate slots"
        );

        if slots.is_empty() {
            return Ok(SuggestionResult::no_feasible_slots());
        }

        let scorer = Scorer {
            calendar: &calendar,
            priority,
            sessions: &sessions,
            config: &config,
        };
        let scored: Vec<CandidateSlot> = slots
            .par_iter()
            .map(|slot| scorer.score(*slot, &day_load.for_instant(slot.start_time, &calendar)))
            .collect();

        Ok(SuggestionResult::found(rank(scored, session_type.as_ref())))
    }
}

/// Orders by score, highest first, keeping generation order among ties, and
/// keeps the top [`MAX_SUGGESTIONS`].
fn rank(mut scored: Vec<CandidateSlot>, session_type: Option<&SessionTypeInfo>) -> Vec<Suggestion> {
    scored.sort_by_key(|c| std::cmp::Reverse(c.score));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|c| Suggestion {
            start_time: c.slot.start_time,
            end_time: c.slot.end_time,
            score: c.score,
            reasons: if c.reasons.is_empty() {
                vec![ScoreReason::Available]
            } else {
                c.reasons
            },
            session_type: session_type.cloned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::overlaps;
    use crate::types::{AvailabilityWindow, ExistingSession, WallTime};

    /// In-memory store that filters like the SQLite store does.
    #[derive(Default)]
    struct MemoryStore {
        windows: Vec<AvailabilityWindow>,
        sessions: Vec<ExistingSession>,
        types: Vec<SessionTypeInfo>,
        preferences: Option<PartialConfig>,
        fail_sessions: bool,
    }

    impl ScheduleStore for MemoryStore {
        type Error = std::io::Error;

        fn list_availability(&self, _user: &UserId) -> Result<Vec<AvailabilityWindow>, Self::Error> {
            Ok(self.windows.clone())
        }

        fn list_scheduled_sessions(
            &self,
            _user: &UserId,
            range_start: DateTime<Utc>,
            range_end: DateTime<Utc>,
        ) -> Result<Vec<ExistingSession>, Self::Error> {
            if self.fail_sessions {
                return Err(std::io::Error::other("store unreachable"));
            }
            Ok(self
                .sessions
                .iter()
                .filter(|s| overlaps(s.start_time, s.end_time, range_start, range_end))
                .copied()
                .collect())
        }

        fn get_session_type(
            &self,
            _user: &UserId,
            id: &SessionTypeId,
        ) -> Result<Option<SessionTypeInfo>, Self::Error> {
            Ok(self.types.iter().find(|t| &t.id == id).cloned())
        }

        fn get_preferences(&self, _user: &UserId) -> Result<Option<PartialConfig>, Self::Error> {
            Ok(self.preferences.clone())
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn window(day: i64, start: &str, end: &str) -> AvailabilityWindow {
        AvailabilityWindow::new(
            day,
            start.parse::<WallTime>().unwrap(),
            end.parse::<WallTime>().unwrap(),
        )
        .unwrap()
    }

    fn session(start: &str, end: &str, priority: i64) -> ExistingSession {
        ExistingSession {
            start_time: at(start),
            end_time: at(end),
            priority: Priority::new(priority).unwrap(),
        }
    }

    fn session_type(id: &str, priority: i64) -> SessionTypeInfo {
        SessionTypeInfo {
            id: SessionTypeId::new(id).unwrap(),
            name: "Deep work".to_string(),
            priority: Priority::new(priority).unwrap(),
            color: Some("#3366FF".to_string()),
            icon: None,
        }
    }

    /// Monday 2025-03-03, searched from the previous Saturday.
    fn monday_request(duration: u32) -> SuggestionRequest {
        SuggestionRequest {
            start_date: at("2025-03-03T00:00:00Z"),
            end_date: at("2025-03-03T00:00:00Z"),
            session_type_id: None,
            duration_minutes: duration,
            config: None,
        }
    }

    fn saturday_before() -> DateTime<Utc> {
        at("2025-03-01T12:00:00Z")
    }

    fn run(store: &MemoryStore, request: &SuggestionRequest) -> SuggestionResult {
        SuggestionEngine::default()
            .suggest_at(store, &user(), request, saturday_before())
            .unwrap()
    }

    #[test]
    fn no_availability_short_circuits() {
        let store = MemoryStore {
            fail_sessions: true,
            ..MemoryStore::default()
        };
        let result = run(&store, &monday_request(60));

        assert!(result.suggestions.is_empty());
        assert_eq!(result.outcome, SuggestionOutcome::NoAvailability);
        assert!(result.message.starts_with("No availability"));
    }

    #[test]
    fn single_window_yields_single_suggestion() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            ..MemoryStore::default()
        };
        let result = run(&store, &monday_request(60));

        assert_eq!(result.outcome, SuggestionOutcome::Found);
        assert_eq!(result.message, "Found 1 suggested time slots");
        assert_eq!(
            result.suggestions,
            vec![Suggestion {
                start_time: at("2025-03-03T09:00:00Z"),
                end_time: at("2025-03-03T10:00:00Z"),
                score: 100,
                reasons: vec![ScoreReason::Available],
                session_type: None,
            }]
        );
    }

    #[test]
    fn high_priority_type_gets_morning_bonus_and_metadata() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            types: vec![session_type("deep", 5)],
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            session_type_id: Some(SessionTypeId::new("deep").unwrap()),
            ..monday_request(60)
        };
        let result = run(&store, &request);

        let suggestion = &result.suggestions[0];
        assert_eq!(suggestion.score, 120);
        assert_eq!(suggestion.reasons, vec![ScoreReason::MorningSlot]);
        assert_eq!(suggestion.session_type, Some(session_type("deep", 5)));
    }

    #[test]
    fn result_serializes_for_api_callers() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            types: vec![session_type("deep", 5)],
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            session_type_id: Some(SessionTypeId::new("deep").unwrap()),
            ..monday_request(60)
        };
        let json = serde_json::to_string_pretty(&run(&store, &request)).unwrap();

        insta::assert_snapshot!(json, @r##"
        {
          "suggestions": [
            {
              "start_time": "2025-03-03T09:00:00Z",
              "end_time": "2025-03-03T10:00:00Z",
              "score": 120,
              "reasons": [
                "Morning slot (optimal for high priority)"
              ],
              "session_type": {
                "id": "deep",
                "name": "Deep work",
                "priority": 5,
                "color": "#3366FF",
                "icon": null
              }
            }
          ],
          "message": "Found 1 suggested time slots",
          "outcome": "found"
        }
        "##);
    }

    #[test]
    fn unknown_session_type_uses_default_priority() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            session_type_id: Some(SessionTypeId::new("missing").unwrap()),
            ..monday_request(60)
        };
        let result = run(&store, &request);

        assert_eq!(result.suggestions[0].score, 100);
        assert!(result.suggestions[0].session_type.is_none());
    }

    #[test]
    fn buffer_rejects_and_spacing_penalizes() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "12:00")],
            sessions: vec![session("2025-03-03T10:00:00Z", "2025-03-03T10:30:00Z", 3)],
            ..MemoryStore::default()
        };
        let result = run(&store, &monday_request(30));

        let summary: Vec<(String, i32)> = result
            .suggestions
            .iter()
            .map(|s| (s.start_time.format("%H:%M").to_string(), s.score))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("11:30".to_string(), 100),
                ("09:00".to_string(), 90),
                ("11:00".to_string(), 90),
            ]
        );
        assert_eq!(result.suggestions[1].reasons, vec![ScoreReason::CloseToNext]);
        assert_eq!(result.suggestions[2].reasons, vec![ScoreReason::CloseToPrevious]);
    }

    #[test]
    fn fatigue_penalty_on_saturated_day() {
        let store = MemoryStore {
            windows: vec![window(1, "14:00", "15:00"), window(2, "14:00", "15:00")],
            sessions: vec![
                session("2025-03-03T08:00:00Z", "2025-03-03T09:00:00Z", 5),
                session("2025-03-03T10:00:00Z", "2025-03-03T11:00:00Z", 5),
            ],
            types: vec![session_type("deep", 5)],
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            session_type_id: Some(SessionTypeId::new("deep").unwrap()),
            end_date: at("2025-03-04T00:00:00Z"),
            ..monday_request(60)
        };
        let result = run(&store, &request);

        assert_eq!(result.suggestions.len(), 2);
        // Tuesday is free, Monday already holds two priority-5 sessions.
        assert_eq!(result.suggestions[0].start_time, at("2025-03-04T14:00:00Z"));
        assert_eq!(result.suggestions[0].score, 100);
        assert_eq!(result.suggestions[1].start_time, at("2025-03-03T14:00:00Z"));
        assert_eq!(result.suggestions[1].score, 60);
        assert_eq!(
            result.suggestions[1].reasons,
            vec![ScoreReason::HighPriorityDay]
        );
    }

    #[test]
    fn all_slots_infeasible_reports_distinct_message() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            sessions: vec![session("2025-03-03T09:00:00Z", "2025-03-03T10:00:00Z", 3)],
            ..MemoryStore::default()
        };
        let result = run(&store, &monday_request(60));

        assert!(result.suggestions.is_empty());
        assert_eq!(result.outcome, SuggestionOutcome::NoFeasibleSlots);
        assert_eq!(
            result.message,
            "No available time slots found in the specified range."
        );
    }

    #[test]
    fn inverted_range_skips_session_lookup() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "17:00")],
            fail_sessions: true,
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            end_date: at("2025-03-01T00:00:00Z"),
            ..monday_request(60)
        };
        let result = run(&store, &request);

        assert!(result.suggestions.is_empty());
        assert_eq!(result.outcome, SuggestionOutcome::NoFeasibleSlots);
    }

    #[test]
    fn past_range_has_no_feasible_slots() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            ..MemoryStore::default()
        };
        let result = SuggestionEngine::default()
            .suggest_at(&store, &user(), &monday_request(60), at("2025-03-10T00:00:00Z"))
            .unwrap();
        assert_eq!(result.outcome, SuggestionOutcome::NoFeasibleSlots);
    }

    #[test]
    fn output_is_sorted_and_truncated() {
        let store = MemoryStore {
            windows: vec![window(1, "06:00", "20:00")],
            sessions: vec![session("2025-03-03T12:00:00Z", "2025-03-03T12:30:00Z", 3)],
            ..MemoryStore::default()
        };
        let result = run(&store, &monday_request(30));

        assert_eq!(result.suggestions.len(), MAX_SUGGESTIONS);
        assert_eq!(result.message, "Found 10 suggested time slots");
        assert!(
            result
                .suggestions
                .windows(2)
                .all(|pair| pair[0].score >= pair[1].score)
        );
        // Ties keep chronological generation order.
        assert_eq!(result.suggestions[0].start_time, at("2025-03-03T06:00:00Z"));
        assert!(result.suggestions.iter().all(|s| !s.reasons.is_empty()));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let store = MemoryStore {
            windows: vec![window(1, "08:00", "18:00"), window(3, "09:00", "12:00")],
            sessions: vec![
                session("2025-03-03T10:00:00Z", "2025-03-03T11:00:00Z", 4),
                session("2025-03-05T09:30:00Z", "2025-03-05T10:00:00Z", 2),
            ],
            types: vec![session_type("deep", 4)],
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            session_type_id: Some(SessionTypeId::new("deep").unwrap()),
            end_date: at("2025-03-07T00:00:00Z"),
            ..monday_request(45)
        };
        assert_eq!(run(&store, &request), run(&store, &request));
    }

    #[test]
    fn every_suggestion_honours_duration_buffer_and_now() {
        let store = MemoryStore {
            windows: vec![window(1, "07:00", "19:00"), window(2, "07:00", "19:00")],
            sessions: vec![
                session("2025-03-03T09:15:00Z", "2025-03-03T10:00:00Z", 3),
                session("2025-03-03T13:00:00Z", "2025-03-03T15:00:00Z", 5),
                session("2025-03-04T08:00:00Z", "2025-03-04T18:00:00Z", 1),
            ],
            preferences: Some(PartialConfig {
                buffer_minutes: Some(20),
                ..PartialConfig::default()
            }),
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            end_date: at("2025-03-04T00:00:00Z"),
            ..monday_request(50)
        };
        let now = at("2025-03-03T08:05:00Z");
        let result = SuggestionEngine::default()
            .suggest_at(&store, &user(), &request, now)
            .unwrap();

        assert!(!result.suggestions.is_empty());
        for s in &result.suggestions {
            assert_eq!((s.end_time - s.start_time).num_minutes(), 50);
            assert!(s.start_time >= now);
            for existing in &store.sessions {
                assert!(!overlaps(
                    s.start_time - Duration::minutes(20),
                    s.end_time + Duration::minutes(20),
                    existing.start_time,
                    existing.end_time,
                ));
            }
        }
    }

    #[test]
    fn sessions_just_before_range_still_block_buffer() {
        let store = MemoryStore {
            windows: vec![window(1, "00:00", "01:00")],
            sessions: vec![session("2025-03-02T23:30:00Z", "2025-03-02T23:50:00Z", 3)],
            ..MemoryStore::default()
        };
        let result = run(&store, &monday_request(30));

        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].start_time, at("2025-03-03T00:30:00Z"));
    }

    #[test]
    fn request_timezone_shifts_windows() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            start_date: at("2025-03-03T12:00:00Z"),
            config: Some(PartialConfig {
                timezone: Some("America/Chicago".to_string()),
                ..PartialConfig::default()
            }),
            ..monday_request(60)
        };
        let result = run(&store, &request);

        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].start_time, at("2025-03-03T15:00:00Z"));
    }

    #[test]
    fn invalid_timezone_degrades_to_utc() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            ..MemoryStore::default()
        };
        let request = SuggestionRequest {
            config: Some(PartialConfig {
                timezone: Some("Mars/Olympus_Mons".to_string()),
                ..PartialConfig::default()
            }),
            ..monday_request(60)
        };
        let result = run(&store, &request);

        assert_eq!(result.suggestions[0].start_time, at("2025-03-03T09:00:00Z"));
    }

    #[test]
    fn engine_defaults_sit_below_stored_preferences() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "11:00")],
            sessions: vec![session("2025-03-03T10:40:00Z", "2025-03-03T11:00:00Z", 3)],
            preferences: Some(PartialConfig {
                buffer_minutes: Some(10),
                ..PartialConfig::default()
            }),
            ..MemoryStore::default()
        };
        let engine = SuggestionEngine::new(PartialConfig {
            buffer_minutes: Some(90),
            ..PartialConfig::default()
        });
        let result = engine
            .suggest_at(&store, &user(), &monday_request(30), saturday_before())
            .unwrap();

        // With a 10-minute buffer 09:00 and 09:30 fit; 10:00 ends 10:30, +10 = 10:40.
        let starts: Vec<String> = result
            .suggestions
            .iter()
            .map(|s| s.start_time.format("%H:%M").to_string())
            .collect();
        assert_eq!(starts, vec!["09:00", "09:30", "10:00"]);
    }

    #[test]
    fn store_failure_propagates() {
        let store = MemoryStore {
            windows: vec![window(1, "09:00", "10:00")],
            fail_sessions: true,
            ..MemoryStore::default()
        };
        let err = SuggestionEngine::default()
            .suggest_at(&store, &user(), &monday_request(60), saturday_before())
            .unwrap_err();
        assert_eq!(err.to_string(), "store unreachable");
    }
}
