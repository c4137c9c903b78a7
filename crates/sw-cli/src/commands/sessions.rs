//! Session commands: `sw sessions add|list|show|upcoming|complete|cancel|reschedule|remove`.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use sw_core::{SessionStatus, UserId};
use sw_db::{Database, NewSession, SessionFilter, SessionRecord};

use super::util::{parse_datetime_at, resolve_session_type, truncate};

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Session type ID or name.
    #[arg(long = "type")]
    pub session_type: String,

    /// Start time (RFC 3339, YYYY-MM-DD, 'tomorrow', 'in 2 days', ...).
    #[arg(long)]
    pub start: String,

    /// Length in minutes.
    #[arg(long, value_parser = clap::value_parser!(u32).range(5..=480))]
    pub duration: u32,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only sessions starting at or after this time.
    #[arg(long)]
    pub from: Option<String>,

    /// Only sessions starting at or before this time.
    #[arg(long)]
    pub to: Option<String>,

    /// Only sessions of this type (ID or name).
    #[arg(long = "type")]
    pub session_type: Option<String>,

    /// Only sessions with this status (scheduled, completed, cancelled).
    #[arg(long)]
    pub status: Option<SessionStatus>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RescheduleArgs {
    /// Session ID.
    pub id: String,

    /// New start time.
    #[arg(long)]
    pub start: String,

    /// New length in minutes.
    #[arg(long, value_parser = clap::value_parser!(u32).range(5..=480))]
    pub duration: u32,
}

pub fn add<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &UserId,
    args: &AddArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let session_type = resolve_session_type(db, user, &args.session_type)?;
    let new = NewSession {
        session_type_id: session_type.id,
        start_time: parse_datetime_at(&args.start, now)?,
        duration_minutes: args.duration,
        notes: args.notes.clone(),
    };
    let created = db
        .create_session(user, &new)
        .context("failed to schedule session")?;
    writeln!(
        writer,
        "Scheduled {} on {} (id: {})",
        created.session_type_name,
        format_span(&created),
        created.id
    )?;
    Ok(())
}

pub fn list<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &UserId,
    args: &ListArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let filter = SessionFilter {
        from: args
            .from
            .as_deref()
            .map(|s| parse_datetime_at(s, now))
            .transpose()?,
        to: args
            .to
            .as_deref()
            .map(|s| parse_datetime_at(s, now))
            .transpose()?,
        session_type_id: args
            .session_type
            .as_deref()
            .map(|t| resolve_session_type(db, user, t).map(|t| t.id))
            .transpose()?,
        status: args.status,
    };
    let sessions = db.list_sessions(user, &filter)?;
    write_sessions(writer, &sessions, args.json)
}

/// Prints one session in full.
pub fn show<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &UserId,
    id: &str,
    json: bool,
) -> Result<()> {
    let session = db.session(user, id)?.with_context(|| {
        format!("Session '{id}' not found.\n\nHint: Use 'sw sessions list' to see session IDs.")
    })?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&session)?)?;
        return Ok(());
    }

    writeln!(writer, "{}", session.session_type_name)?;
    writeln!(
        writer,
        "{}",
        "─".repeat(session.session_type_name.chars().count())
    )?;
    writeln!(
        writer,
        "When:      {} ({} min)",
        format_span(&session),
        session.duration_minutes()
    )?;
    writeln!(writer, "Status:    {}", session.status)?;
    writeln!(writer, "Priority:  {}", session.priority)?;
    if let Some(color) = &session.color {
        writeln!(writer, "Color:     {color}")?;
    }
    if let Some(notes) = &session.notes {
        writeln!(writer, "Notes:     {notes}")?;
    }
    writeln!(writer, "ID:        {}", session.id)?;
    Ok(())
}

pub fn upcoming<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &UserId,
    limit: usize,
    json: bool,
) -> Result<()> {
    let sessions = db.upcoming_sessions(user, limit)?;
    write_sessions(writer, &sessions, json)
}

/// Marks a session completed or cancelled.
pub fn set_status<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &UserId,
    id: &str,
    status: SessionStatus,
) -> Result<()> {
    let updated = db.set_session_status(user, id, status)?;
    writeln!(
        writer,
        "Marked {} on {} as {}",
        updated.session_type_name,
        format_span(&updated),
        updated.status
    )?;
    Ok(())
}

pub fn reschedule<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &UserId,
    args: &RescheduleArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let start = parse_datetime_at(&args.start, now)?;
    let moved = db
        .reschedule_session(user, &args.id, start, args.duration)
        .context("failed to reschedule session")?;
    writeln!(
        writer,
        "Moved {} to {}",
        moved.session_type_name,
        format_span(&moved)
    )?;
    Ok(())
}

pub fn remove<W: Write>(writer: &mut W, db: &mut Database, user: &UserId, id: &str) -> Result<()> {
    db.delete_session(user, id)?;
    writeln!(writer, "Removed session {id}")?;
    Ok(())
}

fn write_sessions<W: Write>(writer: &mut W, sessions: &[SessionRecord], json: bool) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(sessions)?)?;
        return Ok(());
    }

    writeln!(writer, "SESSIONS")?;
    writeln!(writer)?;

    if sessions.is_empty() {
        writeln!(writer, "No sessions found.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<16}  {:<5}  {:<20}  {:<9}  ID",
        "Start (UTC)", "End", "Type", "Status"
    )?;
    writeln!(
        writer,
        "────────────────  ─────  ────────────────────  ─────────  ──"
    )?;
    for s in sessions {
        writeln!(
            writer,
            "{:<16}  {:<5}  {:<20}  {:<9}  {}",
            s.start_time.format("%Y-%m-%d %H:%M").to_string(),
            s.end_time.format("%H:%M").to_string(),
            truncate(&s.session_type_name, 20),
            s.status.as_str(),
            s.id
        )?;
    }
    Ok(())
}

/// "2025-03-03 09:00-10:00 UTC"
fn format_span(session: &SessionRecord) -> String {
    format!(
        "{}-{} UTC",
        session.start_time.format("%Y-%m-%d %H:%M"),
        session.end_time.format("%H:%M")
    )
}
