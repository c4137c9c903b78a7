//! Timezone-aware calendar arithmetic.
//!
//! All instants are UTC. Local-calendar questions (which day, which hour,
//! which weekday) go through a [`Calendar`], so the engine never mutates an
//! instant's representation to reason about local time.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;

/// Local-calendar view of absolute instants.
pub trait Calendar {
    /// The calendar date `instant` falls on locally.
    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate;

    /// The local hour of `instant`, 0..=23.
    fn local_hour(&self, instant: DateTime<Utc>) -> u32;

    /// The absolute instant of a local wall-clock time on a local date.
    fn local_to_instant(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc>;

    /// The local weekday of `instant`, 0 = Sunday.
    fn local_day_of_week(&self, instant: DateTime<Utc>) -> u32 {
        self.local_date(instant).weekday().num_days_from_sunday()
    }

    /// UTC midnight of the local calendar date `instant` falls on.
    ///
    /// The result is a day key, not the instant local midnight occurs at.
    fn start_of_local_day(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.local_date(instant).and_time(NaiveTime::MIN).and_utc()
    }
}

/// A [`Calendar`] backed by an IANA timezone.
///
/// Unknown timezone names fall back to the UTC calendar instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TzCalendar {
    Zoned(Tz),
    Naive,
}

impl TzCalendar {
    /// Builds a calendar for an IANA timezone name.
    pub fn new(timezone: &str) -> Self {
        match timezone.parse::<Tz>() {
            Ok(tz) => Self::Zoned(tz),
            Err(_) => {
                tracing::warn!(timezone, "unrecognized timezone, using UTC calendar");
                Self::Naive
            }
        }
    }

    /// Whether the timezone name was recognized.
    #[must_use]
    pub const fn is_zoned(&self) -> bool {
        matches!(self, Self::Zoned(_))
    }

    /// Local wall-clock reading of `instant`, for display.
    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Zoned(tz) => instant.with_timezone(tz).naive_local(),
            Self::Naive => instant.naive_utc(),
        }
    }
}

impl Calendar for TzCalendar {
    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Zoned(tz) => instant.with_timezone(tz).date_naive(),
            Self::Naive => instant.date_naive(),
        }
    }

    fn local_hour(&self, instant: DateTime<Utc>) -> u32 {
        match self {
            Self::Zoned(tz) => instant.with_timezone(tz).hour(),
            Self::Naive => instant.hour(),
        }
    }

    fn local_to_instant(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let naive = date.and_time(time);
        match self {
            Self::Zoned(tz) => resolve_local(tz, naive),
            Self::Naive => naive.and_utc(),
        }
    }
}

/// Maps a local datetime to UTC.
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// spring-forward gap are shifted forward by an hour.
fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => shifted.and_utc(),
            }
        }
    }
}

/// An inclusive span of local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDayRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl LocalDayRange {
    /// Expands a pair of instants to whole local days.
    ///
    /// The end instant is treated as a date: everything up to one minute
    /// before the following midnight still belongs to it.
    pub fn from_instants<C: Calendar>(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        calendar: &C,
    ) -> Self {
        Self {
            first: calendar.local_date(start),
            last: calendar.local_date(add_minutes(end, 24 * 60 - 1)),
        }
    }

    /// Iterates the days in order. Empty when `last < first`.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let last = self.last;
        self.first.iter_days().take_while(move |d| *d <= last)
    }

    /// Number of days covered.
    pub fn len(&self) -> i64 {
        ((self.last - self.first).num_days() + 1).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute instants of the first local midnight and the local midnight
    /// that ends the range.
    pub fn bounds<C: Calendar>(&self, calendar: &C) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = calendar.local_to_instant(self.first, NaiveTime::MIN);
        let end = self
            .last
            .succ_opt()
            .map_or(DateTime::<Utc>::MAX_UTC, |next| {
                calendar.local_to_instant(next, NaiveTime::MIN)
            });
        (start, end)
    }
}

/// Adds (or with a negative value, subtracts) whole minutes.
pub fn add_minutes(instant: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    instant + Duration::minutes(minutes)
}

/// Half-open interval overlap: touching endpoints do not overlap.
pub fn overlaps(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
) -> bool {
    start_a < end_b && end_a > start_b
}
