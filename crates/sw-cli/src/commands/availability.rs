//! Weekly availability commands: `sw availability set|list|clear|remove`.

use std::io::Write;

use anyhow::{Context, Result};
use sw_core::{AvailabilityWindow, UserId};
use sw_db::Database;

use super::util::{day_name, parse_window};

/// Replaces the whole week with the given `<day>@HH:MM-HH:MM` windows.
pub fn set<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &UserId,
    entries: &[String],
) -> Result<()> {
    let windows = entries
        .iter()
        .map(|entry| parse_window(entry))
        .collect::<Result<Vec<_>>>()?;
    let stored = db
        .replace_availability(user, &windows)
        .context("failed to save availability")?;
    writeln!(writer, "Saved {} availability windows", stored.len())?;
    writeln!(writer)?;
    write_table(writer, &stored)
}

/// Removes every window.
pub fn clear<W: Write>(writer: &mut W, db: &mut Database, user: &UserId) -> Result<()> {
    db.replace_availability(user, &[])
        .context("failed to clear availability")?;
    writeln!(writer, "Cleared all availability windows")?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, db: &Database, user: &UserId, json: bool) -> Result<()> {
    let windows = db.availability_windows(user)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&windows)?)?;
        return Ok(());
    }
    writeln!(writer, "AVAILABILITY")?;
    writeln!(writer)?;
    write_table(writer, &windows)
}

pub fn remove<W: Write>(writer: &mut W, db: &mut Database, user: &UserId, id: &str) -> Result<()> {
    db.delete_availability(user, id)?;
    writeln!(writer, "Removed availability window {id}")?;
    Ok(())
}

fn write_table<W: Write>(writer: &mut W, windows: &[AvailabilityWindow]) -> Result<()> {
    if windows.is_empty() {
        writeln!(writer, "No availability windows set.")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "Hint: Run 'sw availability set mon@09:00-12:00 wed@13:00-17:00' to define your week."
        )?;
        return Ok(());
    }

    writeln!(writer, "{:<3}  {:<11}  ID", "Day", "Window")?;
    writeln!(writer, "───  ───────────  ──")?;
    for window in windows {
        let span = format!("{}-{}", window.start_time, window.end_time);
        writeln!(
            writer,
            "{:<3}  {:<11}  {}",
            day_name(window.day_of_week),
            span,
            window.id.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}
