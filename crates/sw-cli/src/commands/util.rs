//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::{Context, bail};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use sw_core::{AvailabilityWindow, Calendar, SessionTypeId, TzCalendar, UserId, WallTime};
use sw_db::{Database, SessionTypeRecord};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:in\s+(\d+)\s+(minute|hour|day|week)s?|(\d+)\s+(minute|hour|day|week)s?\s+ago)$")
        .unwrap()
});

/// Availability window: `<day>@HH:MM-HH:MM`.
static WINDOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(sun|mon|tue|wed|thu|fri|sat|[0-6])@(\d{2}:\d{2})-(\d{2}:\d{2})$").unwrap()
});

static COLOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Parse a datetime relative to `now`, reading dates on the UTC calendar.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Bare date: "2026-01-15"
/// - Keywords: "now", "today", "tomorrow"
/// - Relative: "in 3 days", "in 2 hours", "2 hours ago", "1 week ago"
pub fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    parse_datetime_in(s, now, &TzCalendar::Naive)
}

/// Like [`parse_datetime_at`], but bare dates, "today" and "tomorrow" mean
/// local midnight on `calendar`.
pub fn parse_datetime_in<C: Calendar>(
    s: &str,
    now: DateTime<Utc>,
    calendar: &C,
) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(calendar.local_to_instant(date, NaiveTime::MIN));
    }

    let today = calendar.local_date(now);
    let lowered = s.to_ascii_lowercase();
    match lowered.as_str() {
        "now" => return Ok(now),
        "today" => return Ok(calendar.local_to_instant(today, NaiveTime::MIN)),
        "tomorrow" => {
            let tomorrow = today.succ_opt().context("date out of range")?;
            return Ok(calendar.local_to_instant(tomorrow, NaiveTime::MIN));
        }
        _ => {}
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(&lowered) else {
        bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z), a date (2026-01-15), \
             'today', 'tomorrow', or relative (e.g., 'in 3 days', '2 hours ago')"
        );
    };

    // Exactly one of the two alternatives matched.
    let (number, unit, sign) = match (caps.get(1), caps.get(2)) {
        (Some(n), Some(u)) => (n.as_str(), u.as_str(), 1),
        _ => (&caps[3], &caps[4], -1),
    };
    let n: i64 = number
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match unit {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        bail!("Relative time value too large: {n} {unit}");
    }

    Ok(now + Duration::minutes(sign * n * minutes_per_unit))
}

/// The `--timezone` flag, then the configured timezone, then the device's.
///
/// `None` leaves the choice to the engine defaults.
pub fn resolve_timezone(flag: Option<&str>, configured: Option<&str>) -> Option<String> {
    if let Some(tz) = flag.or(configured) {
        return Some(tz.to_string());
    }
    match iana_time_zone::get_timezone() {
        Ok(tz) => Some(tz),
        Err(err) => {
            tracing::debug!(%err, "could not detect device timezone");
            None
        }
    }
}

/// Calendar for a zone name plus the label to print for it.
///
/// Missing and unknown zones render as UTC.
pub fn local_calendar(timezone: Option<&str>) -> (TzCalendar, String) {
    let name = timezone.unwrap_or("UTC");
    let calendar = TzCalendar::new(name);
    let label = if calendar.is_zoned() { name } else { "UTC" };
    (calendar, label.to_string())
}

/// Parses `<day>@HH:MM-HH:MM`, where day is `sun`..`sat` or `0`..`6`.
pub fn parse_window(s: &str) -> anyhow::Result<AvailabilityWindow> {
    let Some(caps) = WINDOW_RE.captures(s.trim()) else {
        bail!("Invalid availability window: {s}. Expected <day>@HH:MM-HH:MM (e.g., mon@09:00-12:00)");
    };
    let day = parse_day(&caps[1])?;
    let start: WallTime = caps[2].parse()?;
    let end: WallTime = caps[3].parse()?;
    AvailabilityWindow::new(day, start, end)
        .with_context(|| format!("invalid availability window: {s}"))
}

fn parse_day(s: &str) -> anyhow::Result<i64> {
    if let Ok(n) = s.parse::<i64>() {
        return Ok(n);
    }
    DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(s))
        .and_then(|i| i64::try_from(i).ok())
        .with_context(|| format!("unknown day: {s}"))
}

/// Clap value parser for `#RRGGBB` colors.
pub fn parse_color(s: &str) -> Result<String, String> {
    if COLOR_RE.is_match(s) {
        Ok(s.to_string())
    } else {
        Err(format!("invalid hex color {s:?}, expected #RRGGBB"))
    }
}

/// Short weekday name for 0 = Sunday .. 6 = Saturday.
pub fn day_name(day_of_week: u8) -> &'static str {
    DAY_NAMES
        .get(usize::from(day_of_week))
        .copied()
        .unwrap_or("???")
}

/// Resolves a session type given either its ID or its exact name.
pub fn resolve_session_type(
    db: &Database,
    user: &UserId,
    id_or_name: &str,
) -> anyhow::Result<SessionTypeRecord> {
    if let Ok(id) = SessionTypeId::new(id_or_name) {
        if let Some(found) = db.session_type(user, &id)? {
            return Ok(found);
        }
    }
    db.session_type_by_name(user, id_or_name)?
        .with_context(|| {
            format!(
                "Session type '{id_or_name}' not found.\n\nHint: Use 'sw types list' to see available session types."
            )
        })
}

/// Truncates by characters, not bytes, appending "..." when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max.saturating_sub(3)).collect::<String>())
    } else {
        s.to_string()
    }
}
