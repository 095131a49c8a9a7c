use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, CalendarResult};
use crate::models::config::TimeDisplay;

/// Absolute point in time. Timezones only matter when rendering.
pub type Instant = DateTime<Utc>;

/// Local wall-clock hour at which every Motzi period ends.
///
/// Fixed policy, not derived from Alos.
pub const MOTZI_CUTOFF_HOUR: u32 = 2;

/// Half-open interval `[start, end)` in absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: Instant,
    pub end: Instant,
}

impl Interval {
    /// Create an interval, rejecting empty or reversed bounds.
    pub fn new(start: Instant, end: Instant) -> CalendarResult<Self> {
        Self::spanning(start, end).ok_or_else(|| {
            CalendarError::invalid_interval(format!("start {} is not before end {}", start, end))
        })
    }

    /// Like [`Interval::new`] but returns `None` for empty bounds.
    pub fn spanning(start: Instant, end: Instant) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// `start <= t < end`.
    pub fn contains(&self, t: Instant) -> bool {
        self.start <= t && t < self.end
    }

    /// True when the two intervals share at least one instant.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        Self::spanning(self.start.max(other.start), self.end.min(other.end))
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Sort and join intervals that overlap or touch.
pub fn merge_touching(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort();
    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for next in intervals {
        match merged.last_mut() {
            Some(current) if next.start <= current.end => {
                current.end = current.end.max(next.end);
            }
            _ => merged.push(next),
        }
    }
    merged
}

/// The parts of `base` not covered by any of `holes`.
pub fn subtract(base: Interval, holes: &[Interval]) -> Vec<Interval> {
    let holes = merge_touching(holes.iter().filter(|h| h.overlaps(&base)).copied().collect());
    let mut pieces = Vec::new();
    let mut cursor = base.start;
    for hole in holes {
        if hole.start > cursor {
            pieces.push(Interval {
                start: cursor,
                end: hole.start,
            });
        }
        cursor = cursor.max(hole.end);
        if cursor >= base.end {
            return pieces;
        }
    }
    if cursor < base.end {
        pieces.push(Interval {
            start: cursor,
            end: base.end,
        });
    }
    pieces
}

/// Shorthand for a signed minute offset.
pub fn minutes(m: i64) -> Duration {
    Duration::minutes(m)
}

/// Drop seconds, rounding up from :30.
pub fn round_half_up_minute(t: Instant) -> Instant {
    let floored = floor_minute(t);
    if t - floored >= Duration::seconds(30) {
        floored + Duration::minutes(1)
    } else {
        floored
    }
}

/// Smallest whole minute not before `t`.
pub fn ceil_minute(t: Instant) -> Instant {
    let floored = floor_minute(t);
    if floored == t {
        t
    } else {
        floored + Duration::minutes(1)
    }
}

fn floor_minute(t: Instant) -> Instant {
    let secs = t.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(t)
}

/// Resolve a local wall-clock time to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// spring-forward gap move forward by the gap.
pub fn local_wall_clock(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> Instant {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let naive = NaiveDateTime::new(date, time);
    if let Some(t) = tz.from_local_datetime(&naive).earliest() {
        return t.with_timezone(&Utc);
    }
    let shifted = naive + Duration::hours(1);
    match tz.from_local_datetime(&shifted).earliest() {
        Some(t) => t.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}

pub fn local_midnight(date: NaiveDate, tz: Tz) -> Instant {
    local_wall_clock(date, 0, 0, tz)
}

pub fn local_date(t: Instant, tz: Tz) -> NaiveDate {
    t.with_timezone(&tz).date_naive()
}

/// Motzi cutoff closing the night that `t` falls in, never earlier than `t`.
///
/// An end in the small hours belongs to the night already under way; once
/// that night's cutoff has passed the result is `t` itself, so the Motzi
/// window is empty.
pub fn motzi_cutoff_after(t: Instant, tz: Tz) -> Instant {
    let local = t.with_timezone(&tz);
    let date = local.date_naive();
    if local.hour() < 12 {
        local_wall_clock(date, MOTZI_CUTOFF_HOUR, 0, tz).max(t)
    } else {
        local_wall_clock(date + Duration::days(1), MOTZI_CUTOFF_HOUR, 0, tz)
    }
}

/// Render `t` as the short clock string shown next to timestamp indicators.
pub fn format_simple(t: Instant, tz: Tz, display: TimeDisplay) -> String {
    let local = round_half_up_minute(t).with_timezone(&tz);
    match display {
        TimeDisplay::TwentyFourHour => format!("{:02}:{:02}", local.hour(), local.minute()),
        TimeDisplay::TwelveHour => {
            let (pm, hour) = local.hour12();
            format!("{}:{:02} {}", hour, local.minute(), if pm { "PM" } else { "AM" })
        }
    }
}

/// ISO-8601 in the location's timezone.
pub fn format_local(t: Instant, tz: Tz) -> String {
    t.with_timezone(&tz).to_rfc3339()
}
