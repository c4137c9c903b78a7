//! `sw stats`: completion, streak and per-type summary of past sessions.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use sw_core::UserId;
use sw_db::{Database, SessionStats};

use super::util::{local_calendar, resolve_timezone, truncate};
use crate::config::Config;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// IANA timezone that decides day boundaries (defaults to the configured
    /// or device timezone).
    #[arg(long)]
    pub timezone: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// JSON output: the stats plus when and where they were computed.
#[derive(Debug, Serialize)]
struct JsonStats<'a> {
    generated_at: String,
    timezone: &'a str,
    #[serde(flatten)]
    stats: &'a SessionStats,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &UserId,
    config: &Config,
    args: &StatsArgs,
) -> Result<()> {
    run_at(writer, db, user, config, args, Utc::now())
}

pub fn run_at<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &UserId,
    config: &Config,
    args: &StatsArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let timezone = resolve_timezone(args.timezone.as_deref(), config.timezone.as_deref());
    let (calendar, label) = local_calendar(
        timezone
            .as_deref()
            .or(config.suggestions.timezone.as_deref()),
    );
    let stats = db.session_stats(user, &calendar, now)?;

    if args.json {
        let report = JsonStats {
            generated_at: now.to_rfc3339(),
            timezone: &label,
            stats: &stats,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    writer.write_all(format_stats(&stats, &label).as_bytes())?;
    Ok(())
}

/// Formats minutes as "2h 30m" or "45m".
pub fn format_minutes(minutes: i64) -> String {
    if minutes <= 0 {
        return "0m".to_string();
    }
    let hours = minutes / 60;
    let minutes = minutes % 60;
    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Human-readable stats report.
pub fn format_stats(stats: &SessionStats, timezone: &str) -> String {
    use std::fmt::Write as _;

    let mut output = String::new();
    let _ = writeln!(output, "STATS");
    let _ = writeln!(output, "─────");

    if stats.by_type.is_empty() {
        let _ = writeln!(output, "No sessions yet.");
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Hint: Run 'sw sessions add --type <type> --start <time> --duration <minutes>' to book one."
        );
        return output;
    }

    let _ = writeln!(
        output,
        "Sessions:         {} scheduled, {} completed, {} cancelled",
        stats.total_scheduled, stats.total_completed, stats.total_cancelled
    );
    let _ = writeln!(output, "Completion rate:  {}%", stats.completion_rate);
    let _ = writeln!(
        output,
        "Current streak:   {}",
        plural(stats.current_streak, "day", "days")
    );
    let _ = writeln!(output, "Per week:         {:.1} sessions", stats.avg_sessions_per_week);
    let _ = writeln!(output, "Average gap:      {:.1} days", stats.avg_gap_days);
    let _ = writeln!(
        output,
        "Completed time:   {}",
        format_minutes(stats.total_minutes_completed)
    );

    let week = stats.this_week;
    let _ = writeln!(output);
    let _ = writeln!(output, "THIS WEEK ({timezone})");
    let _ = writeln!(output, "─────────");
    let _ = writeln!(
        output,
        "{} completed, {} still scheduled, {} in total",
        week.completed,
        week.scheduled,
        week.total
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "BY TYPE");
    let _ = writeln!(output, "───────");
    let _ = writeln!(
        output,
        "{:<20}  {:>8}  {:>4}  Time",
        "Type", "Sessions", "Done"
    );
    for entry in &stats.by_type {
        let _ = writeln!(
            output,
            "{:<20}  {:>8}  {:>4}  {}",
            truncate(&entry.name, 20),
            entry.count,
            entry.completed,
            format_minutes(entry.total_minutes)
        );
    }
    output
}
