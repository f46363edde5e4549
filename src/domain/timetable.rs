//! Weekly recurring opening hours.
//!
//! Intervals are accepted as `(weekday, HH:MM)` pairs restricted to a single
//! day and stored as absolute week offsets (minutes since Monday 00:00), which
//! turns overlap tests into integer interval arithmetic. Query windows built
//! from two moments may wrap the week seam; stored intervals never do.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINUTES_PER_DAY: i32 = 1440;
pub const MINUTES_PER_WEEK: i32 = 7 * MINUTES_PER_DAY;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Errors raised while validating a submitted timetable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimetableError {
    #[error("unknown weekday `{0}`")]
    InvalidWeekday(String),
    #[error("`{0}` is not a valid HH:MM time")]
    InvalidTime(String),
    #[error("interval {from} - {to} spans more than one day")]
    CrossDayInterval { from: Moment, to: Moment },
    #[error("interval {from} - {to} does not end after it starts")]
    NonPositiveDuration { from: Moment, to: Moment },
    #[error("intervals {first} and {second} overlap")]
    OverlapDetected {
        first: TimeInterval,
        second: TimeInterval,
    },
}

/// Lookup table from weekday tokens to [`Weekday`].
///
/// Tokens are matched case-insensitively. The default table holds the full
/// English names.
#[derive(Debug, Clone)]
pub struct WeekdayTable {
    names: HashMap<String, Weekday>,
}

impl WeekdayTable {
    /// Builds a table from `(token, weekday)` pairs.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = (S, Weekday)>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|(name, day)| (name.as_ref().trim().to_lowercase(), day))
                .collect(),
        }
    }

    pub fn english() -> Self {
        Self::new(WEEK.iter().map(|day| (english_name(*day), *day)))
    }

    pub fn parse(&self, token: &str) -> Result<Weekday, TimetableError> {
        self.names
            .get(&token.trim().to_lowercase())
            .copied()
            .ok_or_else(|| TimetableError::InvalidWeekday(token.to_string()))
    }
}

impl Default for WeekdayTable {
    fn default() -> Self {
        Self::english()
    }
}

/// Full English weekday name, used for display.
pub fn english_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// A point in the week: weekday plus minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Moment {
    pub weekday: Weekday,
    pub minutes: u16,
}

impl Moment {
    /// Builds a moment, rejecting minute values past 23:59.
    pub fn new(weekday: Weekday, minutes: u16) -> Result<Self, TimetableError> {
        if i32::from(minutes) >= MINUTES_PER_DAY {
            return Err(TimetableError::InvalidTime(format_minutes(minutes)));
        }
        Ok(Self { weekday, minutes })
    }

    /// Parses a weekday token and an `HH:MM` time.
    pub fn parse(day: &str, time: &str, table: &WeekdayTable) -> Result<Self, TimetableError> {
        let weekday = table.parse(day)?;
        let minutes = parse_hh_mm(time)?;
        Ok(Self { weekday, minutes })
    }

    /// Minutes since Monday 00:00.
    pub fn week_offset(&self) -> i32 {
        self.weekday.num_days_from_monday() as i32 * MINUTES_PER_DAY + i32::from(self.minutes)
    }

    /// Inverse of [`Self::week_offset`]; the offset is reduced modulo one week.
    pub fn from_week_offset(offset: i32) -> Self {
        let offset = offset.rem_euclid(MINUTES_PER_WEEK);
        Self {
            weekday: WEEK[(offset / MINUTES_PER_DAY) as usize],
            minutes: (offset % MINUTES_PER_DAY) as u16,
        }
    }

    /// `HH:MM` rendering of the time of day.
    pub fn time(&self) -> String {
        format_minutes(self.minutes)
    }
}

impl Display for Moment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", english_name(self.weekday), self.time())
    }
}

fn format_minutes(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Strict 24-hour, zero-padded `HH:MM`.
fn parse_hh_mm(value: &str) -> Result<u16, TimetableError> {
    let invalid = || TimetableError::InvalidTime(value.to_string());
    let trimmed = value.trim();
    let (hours, minutes) = trimmed.split_once(':').ok_or_else(invalid)?;
    let two_digits = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(invalid());
    }
    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// A validated single-day opening interval `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    from: Moment,
    to: Moment,
}

impl TimeInterval {
    /// Enforces `from.weekday == to.weekday` and `from < to`.
    pub fn new(from: Moment, to: Moment) -> Result<Self, TimetableError> {
        if from.weekday != to.weekday {
            return Err(TimetableError::CrossDayInterval { from, to });
        }
        if from.minutes >= to.minutes {
            return Err(TimetableError::NonPositiveDuration { from, to });
        }
        Ok(Self { from, to })
    }

    /// Rebuilds an interval from stored week offsets.
    pub fn from_offsets(start: i32, end: i32) -> Result<Self, TimetableError> {
        Self::new(Moment::from_week_offset(start), Moment::from_week_offset(end))
    }

    pub fn from(&self) -> Moment {
        self.from
    }

    pub fn to(&self) -> Moment {
        self.to
    }

    pub fn weekday(&self) -> Weekday {
        self.from.weekday
    }

    pub fn start(&self) -> i32 {
        self.from.week_offset()
    }

    pub fn end(&self) -> i32 {
        self.to.week_offset()
    }
}

impl Display for TimeInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.from, self.to.time())
    }
}

/// Interval as submitted by a client, before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInterval {
    pub from_day: String,
    pub from_time: String,
    pub to_day: String,
    pub to_time: String,
}

impl RawInterval {
    pub fn new(
        from_day: impl Into<String>,
        from_time: impl Into<String>,
        to_day: impl Into<String>,
        to_time: impl Into<String>,
    ) -> Self {
        Self {
            from_day: from_day.into(),
            from_time: from_time.into(),
            to_day: to_day.into(),
            to_time: to_time.into(),
        }
    }
}

/// Parses and validates each raw interval, returning them ordered by week
/// offset. Overlaps are checked separately by [`check_no_overlap`].
pub fn validate_and_normalize(
    raw: &[RawInterval],
    table: &WeekdayTable,
) -> Result<Vec<TimeInterval>, TimetableError> {
    let mut intervals = raw
        .iter()
        .map(|interval| {
            let from = Moment::parse(&interval.from_day, &interval.from_time, table)?;
            let to = Moment::parse(&interval.to_day, &interval.to_time, table)?;
            TimeInterval::new(from, to)
        })
        .collect::<Result<Vec<_>, _>>()?;
    intervals.sort_by_key(|interval| (interval.start(), interval.end()));
    Ok(intervals)
}

/// Rejects any two intervals on the same weekday that overlap. Touching
/// intervals (`next.start == prev.end`) are allowed.
pub fn check_no_overlap(intervals: &[TimeInterval]) -> Result<(), TimetableError> {
    let mut by_day: BTreeMap<u32, Vec<TimeInterval>> = BTreeMap::new();
    for interval in intervals {
        by_day
            .entry(interval.weekday().num_days_from_monday())
            .or_default()
            .push(*interval);
    }

    for day in by_day.values_mut() {
        day.sort_by_key(|interval| (interval.start(), interval.end()));
        for pair in day.windows(2) {
            if pair[1].start() < pair[0].end() {
                return Err(TimetableError::OverlapDetected {
                    first: pair[0],
                    second: pair[1],
                });
            }
        }
    }
    Ok(())
}

/// Validates, overlap-checks and orders a submitted timetable.
pub fn normalize_timetable(
    raw: &[RawInterval],
    table: &WeekdayTable,
) -> Result<Vec<TimeInterval>, TimetableError> {
    let intervals = validate_and_normalize(raw, table)?;
    check_no_overlap(&intervals)?;
    Ok(intervals)
}

/// Whether the query range `[q_start, q_end)` overlaps `[i_start, i_end)`.
///
/// All values are week offsets and are reduced modulo one week first. A query
/// with `q_start > q_end` wraps the week seam; `q_start == q_end` matches
/// nothing.
pub fn weekly_range_overlaps(q_start: i32, q_end: i32, i_start: i32, i_end: i32) -> bool {
    let q_start = q_start.rem_euclid(MINUTES_PER_WEEK);
    let q_end = q_end.rem_euclid(MINUTES_PER_WEEK);
    let i_start = i_start.rem_euclid(MINUTES_PER_WEEK);
    let i_end = i_end.rem_euclid(MINUTES_PER_WEEK);

    if q_start == q_end {
        false
    } else if q_start < q_end {
        i_start < q_end && i_end > q_start
    } else {
        i_end > q_start || i_start < q_end
    }
}

/// "Open during" query window; may wrap the week seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekWindow {
    start: i32,
    end: i32,
}

impl WeekWindow {
    pub fn new(from: Moment, to: Moment) -> Self {
        Self {
            start: from.week_offset(),
            end: to.week_offset(),
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    pub fn overlaps(&self, interval: &TimeInterval) -> bool {
        weekly_range_overlaps(self.start, self.end, interval.start(), interval.end())
    }
}
