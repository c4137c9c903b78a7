//! Session type commands: `sw types add|list|update|remove`.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Args;
use sw_core::{Priority, UserId};
use sw_db::{Database, NewSessionType, SessionTypeUpdate};

use super::util::{parse_color, resolve_session_type, truncate};

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Name of the activity (unique per user).
    pub name: String,

    /// Priority from 1 (lowest) to 5 (highest).
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(i64).range(1..=5))]
    pub priority: i64,

    /// Free-form category (e.g., "health", "focus").
    #[arg(long)]
    pub category: Option<String>,

    /// Display color as #RRGGBB.
    #[arg(long, value_parser = parse_color)]
    pub color: Option<String>,

    /// Display icon name.
    #[arg(long)]
    pub icon: Option<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Session type ID or name.
    pub session_type: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(i64).range(1..=5))]
    pub priority: Option<i64>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, value_parser = parse_color)]
    pub color: Option<String>,

    #[arg(long)]
    pub icon: Option<String>,
}

pub fn add<W: Write>(writer: &mut W, db: &mut Database, user: &UserId, args: &AddArgs) -> Result<()> {
    let new = NewSessionType {
        name: args.name.clone(),
        category: args.category.clone(),
        priority: Priority::new(args.priority)?,
        color: args.color.clone(),
        icon: args.icon.clone(),
    };
    let created = db
        .create_session_type(user, &new)
        .context("failed to create session type")?;
    writeln!(
        writer,
        "Created session type {} (priority {}): {}",
        created.name, created.priority, created.id
    )?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, db: &Database, user: &UserId, json: bool) -> Result<()> {
    let types = db.list_session_types(user)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&types)?)?;
        return Ok(());
    }

    writeln!(writer, "SESSION TYPES")?;
    writeln!(writer)?;

    if types.is_empty() {
        writeln!(writer, "No session types yet.")?;
        writeln!(writer)?;
        writeln!(writer, "Hint: Run 'sw types add <name> --priority <1-5>' to create one.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<22}  {:>8}  {:>4}  {:<12}  ID",
        "Name", "Priority", "Done", "Category"
    )?;
    writeln!(
        writer,
        "──────────────────────  ────────  ────  ────────────  ──"
    )?;
    for t in &types {
        writeln!(
            writer,
            "{:<22}  {:>8}  {:>4}  {:<12}  {}",
            truncate(&t.name, 22),
            t.priority,
            t.completed_sessions,
            truncate(t.category.as_deref().unwrap_or("-"), 12),
            t.id
        )?;
    }
    Ok(())
}

pub fn update<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &UserId,
    args: &UpdateArgs,
) -> Result<()> {
    let update = SessionTypeUpdate {
        name: args.name.clone(),
        category: args.category.clone(),
        priority: args.priority.map(Priority::new).transpose()?,
        color: args.color.clone(),
        icon: args.icon.clone(),
    };
    if update == SessionTypeUpdate::default() {
        bail!("nothing to update; pass at least one of --name, --priority, --category, --color, --icon");
    }

    let existing = resolve_session_type(db, user, &args.session_type)?;
    let updated = db
        .update_session_type(user, &existing.id, &update)
        .context("failed to update session type")?;
    writeln!(
        writer,
        "Updated session type {} (priority {})",
        updated.name, updated.priority
    )?;
    Ok(())
}

pub fn remove<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &UserId,
    id_or_name: &str,
) -> Result<()> {
    let existing = resolve_session_type(db, user, id_or_name)?;
    db.delete_session_type(user, &existing.id)?;
    writeln!(
        writer,
        "Removed session type {} and its sessions",
        existing.name
    )?;
    Ok(())
}
