//! `sw suggest`: ranked time slots for a new session.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use sw_core::{
    PartialConfig, Suggestion, SuggestionEngine, SuggestionOutcome, SuggestionRequest,
    SuggestionResult, TzCalendar, UserId,
};
use sw_db::Database;

use super::util::{local_calendar, parse_datetime_in, resolve_session_type, resolve_timezone};
use crate::config::Config;

/// Longest search range accepted, in days.
const MAX_RANGE_DAYS: i64 = 90;

#[derive(Debug, Args)]
pub struct SuggestArgs {
    /// First day to search (RFC 3339, YYYY-MM-DD, 'today', 'tomorrow', ...).
    #[arg(long)]
    pub start: String,

    /// Last day to search; the whole day is included.
    #[arg(long)]
    pub end: String,

    /// Session type ID or name; its priority drives scoring.
    #[arg(long = "type")]
    pub session_type: Option<String>,

    /// Session length in minutes.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(15..=480))]
    pub duration: u32,

    /// IANA timezone (defaults to the configured or device timezone).
    #[arg(long)]
    pub timezone: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=240))]
    pub buffer_minutes: Option<u32>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(30..=1440))]
    pub max_daily_minutes: Option<u32>,

    #[arg(long)]
    pub prefer_mornings: Option<bool>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_high_priority_per_day: Option<u32>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &UserId,
    config: &Config,
    args: &SuggestArgs,
) -> Result<()> {
    run_at(writer, db, user, config, args, Utc::now())
}

pub fn run_at<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &UserId,
    config: &Config,
    args: &SuggestArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    // Dates on the command line are local days, so the zone comes first.
    let timezone = resolve_timezone(args.timezone.as_deref(), config.timezone.as_deref());
    let (calendar, label) = local_calendar(
        timezone
            .as_deref()
            .or(config.suggestions.timezone.as_deref()),
    );

    let start_date = parse_datetime_in(&args.start, now, &calendar).context("invalid --start")?;
    let end_date = parse_datetime_in(&args.end, now, &calendar).context("invalid --end")?;
    if end_date < start_date {
        bail!("--end ({end_date}) must not be before --start ({start_date})");
    }
    if end_date - start_date > Duration::days(MAX_RANGE_DAYS) {
        bail!("search range is too long; at most {MAX_RANGE_DAYS} days are searched at once");
    }

    let session_type_id = args
        .session_type
        .as_deref()
        .map(|t| resolve_session_type(db, user, t).map(|t| t.id))
        .transpose()?;

    let request = SuggestionRequest {
        start_date,
        end_date,
        session_type_id,
        duration_minutes: args.duration,
        config: Some(PartialConfig {
            max_daily_minutes: args.max_daily_minutes,
            buffer_minutes: args.buffer_minutes,
            prefer_mornings: args.prefer_mornings,
            max_high_priority_per_day: args.max_high_priority_per_day,
            timezone,
        }),
    };

    let engine = SuggestionEngine::new(config.suggestions.clone());
    let result = engine
        .suggest_at(db, user, &request, now)
        .context("failed to compute suggestions")?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?;
        return Ok(());
    }
    write_result(writer, &result, &calendar, &label)
}

fn write_result<W: Write>(
    writer: &mut W,
    result: &SuggestionResult,
    calendar: &TzCalendar,
    label: &str,
) -> Result<()> {
    writeln!(writer, "{}", result.message)?;

    match result.outcome {
        SuggestionOutcome::NoAvailability => {
            writeln!(writer)?;
            writeln!(
                writer,
                "Hint: Run 'sw availability set mon@09:00-12:00 wed@13:00-17:00' to define your week."
            )?;
            return Ok(());
        }
        SuggestionOutcome::NoFeasibleSlots => {
            writeln!(writer)?;
            writeln!(
                writer,
                "Hint: Widen the date range, shorten --duration, or lower --buffer-minutes."
            )?;
            return Ok(());
        }
        SuggestionOutcome::Found => {}
    }

    if let Some(info) = result
        .suggestions
        .first()
        .and_then(|s| s.session_type.as_ref())
    {
        writeln!(writer, "For {} (priority {})", info.name, info.priority)?;
    }
    writeln!(writer, "Times in {label}")?;
    writeln!(writer)?;

    writeln!(
        writer,
        "{:>2}  {:<3}  {:<10}  {:<11}  {:>5}  Reasons",
        "#", "Day", "Date", "Time", "Score"
    )?;
    writeln!(writer, "──  ───  ──────────  ───────────  ─────  ───────")?;
    for (i, suggestion) in result.suggestions.iter().enumerate() {
        write_row(writer, i + 1, suggestion, calendar)?;
    }
    Ok(())
}

fn write_row<W: Write>(
    writer: &mut W,
    rank: usize,
    suggestion: &Suggestion,
    calendar: &TzCalendar,
) -> Result<()> {
    let start = calendar.to_local(suggestion.start_time);
    let end = calendar.to_local(suggestion.end_time);
    let span = format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"));
    let reasons = suggestion
        .reasons
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    writeln!(
        writer,
        "{:>2}  {:<3}  {:<10}  {:<11}  {:>5}  {}",
        rank,
        start.format("%a").to_string(),
        start.format("%Y-%m-%d").to_string(),
        span,
        suggestion.score,
        reasons
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use sw_core::Priority;
    use sw_db::{NewSession, NewSessionType};

    use crate::commands::util::parse_window;

    fn user() -> UserId {
        UserId::new("local").unwrap()
    }

    /// Sunday before the searched Monday.
    fn now() -> DateTime<Utc> {
        "2025-03-02T00:00:00Z".parse().unwrap()
    }

    fn config() -> Config {
        Config {
            timezone: Some("UTC".to_string()),
            ..Config::default()
        }
    }

    fn args(start: &str, end: &str) -> SuggestArgs {
        SuggestArgs {
            start: start.to_string(),
            end: end.to_string(),
            session_type: None,
            duration: 60,
            timezone: None,
            buffer_minutes: None,
            max_daily_minutes: None,
            prefer_mornings: None,
            max_high_priority_per_day: None,
            json: false,
        }
    }

    fn db_with_week(windows: &[&str]) -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let windows = windows
            .iter()
            .map(|w| parse_window(w).unwrap())
            .collect::<Vec<_>>();
        db.replace_availability(&user(), &windows).unwrap();
        db.create_session_type(
            &user(),
            &NewSessionType {
                name: "Deep work".to_string(),
                category: None,
                priority: Priority::new(5).unwrap(),
                color: Some("#3366ff".to_string()),
                icon: None,
            },
        )
        .unwrap();
        db
    }

    fn output_of(db: &Database, config: &Config, args: &SuggestArgs) -> String {
        let mut output = Vec::new();
        run_at(&mut output, db, &user(), config, args, now()).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn prints_ranked_table_for_session_type() {
        let db = db_with_week(&["mon@09:00-11:00"]);
        let args = SuggestArgs {
            session_type: Some("Deep work".to_string()),
            ..args("2025-03-03", "2025-03-03")
        };

        assert_snapshot!(output_of(&db, &config(), &args), @r"
        Found 3 suggested time slots
        For Deep work (priority 5)
        Times in UTC

         #  Day  Date        Time         Score  Reasons
        ──  ───  ──────────  ───────────  ─────  ───────
         1  Mon  2025-03-03  09:00-10:00    120  Morning slot (optimal for high priority)
         2  Mon  2025-03-03  09:30-10:30    120  Morning slot (optimal for high priority)
         3  Mon  2025-03-03  10:00-11:00    120  Morning slot (optimal for high priority)
        ");
    }

    #[test]
    fn existing_sessions_shape_scores() {
        let mut db = db_with_week(&["mon@09:00-13:00"]);
        let deep = db.session_type_by_name(&user(), "Deep work").unwrap().unwrap();
        db.create_session(
            &user(),
            &NewSession {
                session_type_id: deep.id,
                start_time: "2025-03-03T10:00:00Z".parse().unwrap(),
                duration_minutes: 60,
                notes: None,
            },
        )
        .unwrap();
        let args = SuggestArgs {
            session_type: Some("Deep work".to_string()),
            ..args("2025-03-03", "2025-03-03")
        };

        // Only slots clear of the 30-minute buffer around 10:00-11:00 remain.
        assert_snapshot!(output_of(&db, &config(), &args), @r"
        Found 2 suggested time slots
        For Deep work (priority 5)
        Times in UTC

         #  Day  Date        Time         Score  Reasons
        ──  ───  ──────────  ───────────  ─────  ───────
         1  Mon  2025-03-03  11:30-12:30    110  Morning slot (optimal for high priority); Close to previous session
         2  Mon  2025-03-03  12:00-13:00    100  Available slot
        ");
    }

    #[test]
    fn shows_local_times_and_utc_json() {
        let db = db_with_week(&["mon@09:00-10:00"]);
        let chicago = SuggestArgs {
            timezone: Some("America/Chicago".to_string()),
            ..args("2025-03-03", "2025-03-03")
        };
        assert_snapshot!(output_of(&db, &config(), &chicago), @r"
        Found 1 suggested time slots
        Times in America/Chicago

         #  Day  Date        Time         Score  Reasons
        ──  ───  ──────────  ───────────  ─────  ───────
         1  Mon  2025-03-03  09:00-10:00    100  Available slot
        ");

        let json = SuggestArgs {
            json: true,
            ..chicago
        };
        let value: serde_json::Value =
            serde_json::from_str(&output_of(&db, &config(), &json)).unwrap();
        assert_eq!(value["outcome"], "found");
        assert_eq!(value["suggestions"][0]["start_time"], "2025-03-03T15:00:00Z");
        assert_eq!(value["suggestions"][0]["reasons"][0], "Available slot");
        assert!(value["suggestions"][0]["session_type"].is_null());
    }

    #[test]
    fn empty_outcomes_print_hints() {
        let db = Database::open_in_memory().unwrap();
        assert_snapshot!(output_of(&db, &config(), &args("2025-03-03", "2025-03-03")), @r"
        No availability windows set. Please configure your availability.

        Hint: Run 'sw availability set mon@09:00-12:00 wed@13:00-17:00' to define your week.
        ");

        let db = db_with_week(&["mon@09:00-10:00"]);
        assert_snapshot!(output_of(&db, &config(), &args("2025-02-24", "2025-02-24")), @r"
        No available time slots found in the specified range.

        Hint: Widen the date range, shorten --duration, or lower --buffer-minutes.
        ");
    }

    #[test]
    fn rejects_inverted_and_oversized_ranges() {
        let db = db_with_week(&["mon@09:00-10:00"]);

        let err = run_at(
            &mut Vec::new(),
            &db,
            &user(),
            &config(),
            &args("2025-03-10", "2025-03-03"),
            now(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must not be before"));

        let err = run_at(
            &mut Vec::new(),
            &db,
            &user(),
            &config(),
            &args("2025-03-03", "2025-07-01"),
            now(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn unknown_session_type_fails() {
        let db = db_with_week(&["mon@09:00-10:00"]);
        let args = SuggestArgs {
            session_type: Some("Knitting".to_string()),
            ..args("2025-03-03", "2025-03-03")
        };
        let err = run_at(&mut Vec::new(), &db, &user(), &config(), &args, now()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn dates_are_local_days_in_the_resolved_zone() {
        let db = db_with_week(&["sun@12:00-13:00", "mon@12:00-13:00"]);
        let new_york = SuggestArgs {
            timezone: Some("America/New_York".to_string()),
            ..args("2025-03-03", "2025-03-03")
        };
        // Monday only; UTC midnight would still be Sunday evening here.
        assert_snapshot!(output_of(&db, &config(), &new_york), @r"
        Found 1 suggested time slots
        Times in America/New_York

         #  Day  Date        Time         Score  Reasons
        ──  ───  ──────────  ───────────  ─────  ───────
         1  Mon  2025-03-03  12:00-13:00    100  Available slot
        ");
    }
}
