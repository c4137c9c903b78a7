//! Suggestion preference commands: `sw prefs show|set`.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;
use sw_core::{PartialConfig, SuggestionConfig, UserId};
use sw_db::Database;

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Daily commitment cap in minutes.
    #[arg(long, value_parser = clap::value_parser!(u32).range(30..=1440))]
    pub max_daily_minutes: Option<u32>,

    /// Gap to keep around existing sessions, in minutes.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=240))]
    pub buffer_minutes: Option<u32>,

    /// Favor mornings for high-priority activities.
    #[arg(long)]
    pub prefer_mornings: Option<bool>,

    /// High-priority sessions per day before new ones are penalized.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_high_priority_per_day: Option<u32>,
}

impl SetArgs {
    fn to_partial(&self) -> PartialConfig {
        PartialConfig {
            max_daily_minutes: self.max_daily_minutes,
            buffer_minutes: self.buffer_minutes,
            prefer_mornings: self.prefer_mornings,
            max_high_priority_per_day: self.max_high_priority_per_day,
            timezone: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct PreferencesView {
    max_daily_minutes: u32,
    buffer_minutes: u32,
    prefer_mornings: bool,
    max_high_priority_per_day: u32,
    /// False when nothing was saved and the values shown are defaults.
    saved: bool,
}

/// Shows the stored preferences, or what suggestions would use without them.
pub fn show<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &UserId,
    defaults: &PartialConfig,
    json: bool,
) -> Result<()> {
    let stored = db.preferences(user)?;
    let stored_tier = stored.as_ref().map(PartialConfig::from);
    let effective = SuggestionConfig::resolve(Some(defaults), stored_tier.as_ref(), None);
    let view = PreferencesView {
        max_daily_minutes: effective.max_daily_minutes,
        buffer_minutes: effective.buffer_minutes,
        prefer_mornings: effective.prefer_mornings,
        max_high_priority_per_day: effective.max_high_priority_per_day,
        saved: stored.is_some(),
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&view)?)?;
        return Ok(());
    }
    write_view(writer, &view)?;
    if !view.saved {
        writeln!(writer)?;
        writeln!(writer, "(defaults; nothing saved yet)")?;
    }
    Ok(())
}

pub fn set<W: Write>(writer: &mut W, db: &mut Database, user: &UserId, args: &SetArgs) -> Result<()> {
    let update = args.to_partial();
    if update.is_empty() {
        bail!(
            "nothing to update; pass at least one of --max-daily-minutes, --buffer-minutes, \
             --prefer-mornings, --max-high-priority-per-day"
        );
    }
    let saved = db
        .upsert_preferences(user, &update)
        .context("failed to save preferences")?;
    writeln!(writer, "Saved preferences")?;
    writeln!(writer)?;
    write_view(
        writer,
        &PreferencesView {
            max_daily_minutes: saved.max_daily_minutes,
            buffer_minutes: saved.buffer_minutes,
            prefer_mornings: saved.prefer_mornings,
            max_high_priority_per_day: saved.max_high_priority_per_day,
            saved: true,
        },
    )
}

fn write_view<W: Write>(writer: &mut W, view: &PreferencesView) -> Result<()> {
    writeln!(writer, "PREFERENCES")?;
    writeln!(writer)?;
    writeln!(writer, "  Max daily minutes:          {}", view.max_daily_minutes)?;
    writeln!(writer, "  Buffer minutes:             {}", view.buffer_minutes)?;
    writeln!(writer, "  Prefer mornings:            {}", view.prefer_mornings)?;
    writeln!(
        writer,
        "  Max high-priority per day:  {}",
        view.max_high_priority_per_day
    )?;
    Ok(())
}
