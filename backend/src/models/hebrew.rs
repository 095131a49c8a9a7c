//! Hebrew lunisolar calendar.
//!
//! Conversions go through fixed day numbers (day 1 = 0001-01-01 proleptic
//! Gregorian, which is what `chrono` calls "days from CE"). Year lengths come
//! from the molad arithmetic with the four postponement rules.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, CalendarResult};

/// Fixed day number of 1 Tishrei AM 1.
const HEBREW_EPOCH: i64 = -1_373_427;

/// Hebrew years the default resolver accepts.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 5600..=6000;

/// Hebrew months, numbered from Nissan. The civil year starts at Tishrei.
///
/// `Adar` is the only Adar of a common year and Adar I of a leap year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HebrewMonth {
    Nissan = 1,
    Iyar = 2,
    Sivan = 3,
    Tammuz = 4,
    Av = 5,
    Elul = 6,
    Tishrei = 7,
    Cheshvan = 8,
    Kislev = 9,
    Teves = 10,
    Shvat = 11,
    Adar = 12,
    AdarII = 13,
}

impl HebrewMonth {
    pub const ALL: [HebrewMonth; 13] = [
        HebrewMonth::Nissan,
        HebrewMonth::Iyar,
        HebrewMonth::Sivan,
        HebrewMonth::Tammuz,
        HebrewMonth::Av,
        HebrewMonth::Elul,
        HebrewMonth::Tishrei,
        HebrewMonth::Cheshvan,
        HebrewMonth::Kislev,
        HebrewMonth::Teves,
        HebrewMonth::Shvat,
        HebrewMonth::Adar,
        HebrewMonth::AdarII,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            HebrewMonth::Nissan => "Nissan",
            HebrewMonth::Iyar => "Iyar",
            HebrewMonth::Sivan => "Sivan",
            HebrewMonth::Tammuz => "Tammuz",
            HebrewMonth::Av => "Av",
            HebrewMonth::Elul => "Elul",
            HebrewMonth::Tishrei => "Tishrei",
            HebrewMonth::Cheshvan => "Cheshvan",
            HebrewMonth::Kislev => "Kislev",
            HebrewMonth::Teves => "Teves",
            HebrewMonth::Shvat => "Shvat",
            HebrewMonth::Adar => "Adar",
            HebrewMonth::AdarII => "Adar II",
        }
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (7 * i64::from(year) + 1).rem_euclid(19) < 7
}

fn last_month_number(year: i32) -> u8 {
    if is_leap_year(year) {
        13
    } else {
        12
    }
}

fn elapsed_days(year: i32) -> i64 {
    let months_elapsed = (235 * i64::from(year) - 234).div_euclid(19);
    let parts_elapsed = 12084 + 13753 * months_elapsed;
    let days = 29 * months_elapsed + parts_elapsed.div_euclid(25920);
    if (3 * (days + 1)).rem_euclid(7) < 3 {
        days + 1
    } else {
        days
    }
}

fn year_length_correction(year: i32) -> i64 {
    let ny0 = elapsed_days(year - 1);
    let ny1 = elapsed_days(year);
    let ny2 = elapsed_days(year + 1);
    if ny2 - ny1 == 356 {
        2
    } else if ny1 - ny0 == 382 {
        1
    } else {
        0
    }
}

/// Fixed day number of 1 Tishrei of `year`.
fn new_year(year: i32) -> i64 {
    HEBREW_EPOCH + elapsed_days(year) + year_length_correction(year)
}

pub fn days_in_year(year: i32) -> i64 {
    new_year(year + 1) - new_year(year)
}

fn long_cheshvan(year: i32) -> bool {
    days_in_year(year) % 10 == 5
}

fn short_kislev(year: i32) -> bool {
    days_in_year(year) % 10 == 3
}

/// Number of days in `month` of `year`; 0 for Adar II in a common year.
pub fn days_in_month(year: i32, month: HebrewMonth) -> u8 {
    use HebrewMonth::*;
    match month {
        Iyar | Tammuz | Elul | Teves | AdarII => {
            if month == AdarII && !is_leap_year(year) {
                0
            } else {
                29
            }
        }
        Adar if !is_leap_year(year) => 29,
        Cheshvan if !long_cheshvan(year) => 29,
        Kislev if short_kislev(year) => 29,
        _ => 30,
    }
}

fn month_len(year: i32, n: u8) -> i64 {
    HebrewMonth::from_number(n).map_or(0, |m| i64::from(days_in_month(year, m)))
}

fn fixed_from_hebrew(year: i32, month: HebrewMonth, day: u8) -> i64 {
    let m = month.number();
    let mut fixed = new_year(year) + i64::from(day) - 1;
    if m < 7 {
        fixed += (7..=last_month_number(year))
            .map(|n| month_len(year, n))
            .sum::<i64>();
        fixed += (1..m).map(|n| month_len(year, n)).sum::<i64>();
    } else {
        fixed += (7..m).map(|n| month_len(year, n)).sum::<i64>();
    }
    fixed
}

fn hebrew_from_fixed(fixed: i64) -> (i32, HebrewMonth, u8) {
    let approx = ((fixed - HEBREW_EPOCH) as f64 / (35_975_351.0 / 98_496.0)).floor() as i32 + 1;
    let mut year = approx - 1;
    while new_year(year + 1) <= fixed {
        year += 1;
    }

    let order: Vec<u8> = if fixed < fixed_from_hebrew(year, HebrewMonth::Nissan, 1) {
        (7..=last_month_number(year)).collect()
    } else {
        (1..=6).collect()
    };
    let month = order
        .into_iter()
        .filter_map(HebrewMonth::from_number)
        .find(|&m| fixed <= fixed_from_hebrew(year, m, days_in_month(year, m)))
        .unwrap_or(HebrewMonth::Elul);
    let day = fixed - fixed_from_hebrew(year, month, 1) + 1;
    (year, month, day as u8)
}

fn fixed_from_civil(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

fn civil_from_fixed(fixed: i64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(i32::try_from(fixed).ok()?)
}

/// A day in the Hebrew calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HebrewDate {
    pub year: i32,
    pub month: HebrewMonth,
    pub day: u8,
}

impl HebrewDate {
    /// Build a date, checking the day against the month length.
    pub fn new(year: i32, month: HebrewMonth, day: u8) -> Option<Self> {
        (day >= 1 && day <= days_in_month(year, month)).then_some(Self { year, month, day })
    }

    pub fn is_leap(&self) -> bool {
        is_leap_year(self.year)
    }

    pub fn days_in_month(&self) -> u8 {
        days_in_month(self.year, self.month)
    }

    /// The Adar that carries Purim: Adar II in a leap year.
    pub fn purim_month(year: i32) -> HebrewMonth {
        if is_leap_year(year) {
            HebrewMonth::AdarII
        } else {
            HebrewMonth::Adar
        }
    }

    pub fn is(&self, month: HebrewMonth, day: u8) -> bool {
        self.month == month && self.day == day
    }

    /// Date `days` later (or earlier for negative values).
    pub fn add_days(&self, days: i64) -> Self {
        let (year, month, day) = hebrew_from_fixed(self.fixed() + days);
        Self { year, month, day }
    }

    fn fixed(&self) -> i64 {
        fixed_from_hebrew(self.year, self.month, self.day)
    }
}

impl fmt::Display for HebrewDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.day, self.month.name(), self.year)
    }
}

/// Civil ↔ Hebrew date resolver.
pub trait HebrewCalendar: Send + Sync {
    fn hebrew_date(&self, date: NaiveDate) -> CalendarResult<HebrewDate>;

    fn civil_date(&self, date: &HebrewDate) -> CalendarResult<NaiveDate>;
}

/// Arithmetic resolver limited to a supported range of Hebrew years.
#[derive(Debug, Clone)]
pub struct ArithmeticCalendar {
    supported: RangeInclusive<i32>,
}

impl ArithmeticCalendar {
    pub fn new(supported: RangeInclusive<i32>) -> Self {
        Self { supported }
    }
}

impl Default for ArithmeticCalendar {
    fn default() -> Self {
        Self::new(SUPPORTED_YEARS)
    }
}

impl HebrewCalendar for ArithmeticCalendar {
    fn hebrew_date(&self, date: NaiveDate) -> CalendarResult<HebrewDate> {
        let (year, month, day) = hebrew_from_fixed(fixed_from_civil(date));
        if !self.supported.contains(&year) {
            return Err(CalendarError::date_range(
                date,
                format!(
                    "Hebrew year {} outside supported era {}..={}",
                    year,
                    self.supported.start(),
                    self.supported.end()
                ),
            ));
        }
        Ok(HebrewDate { year, month, day })
    }

    fn civil_date(&self, date: &HebrewDate) -> CalendarResult<NaiveDate> {
        if !self.supported.contains(&date.year) {
            return Err(CalendarError::hebrew_range(
                date,
                format!("Hebrew year {} outside supported era", date.year),
            ));
        }
        civil_from_fixed(date.fixed())
            .ok_or_else(|| CalendarError::hebrew_range(date, "no civil equivalent"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_leap_years() {
        assert!(is_leap_year(5784));
        assert!(!is_leap_year(5785));
        assert!(is_leap_year(5765));
    }

    #[test]
    fn test_rosh_hashana_dates() {
        let cal = ArithmeticCalendar::default();
        let rh = cal.hebrew_date(ymd(2024, 10, 3)).unwrap();
        assert_eq!(rh, HebrewDate::new(5785, HebrewMonth::Tishrei, 1).unwrap());
        let rh = cal.hebrew_date(ymd(2025, 9, 23)).unwrap();
        assert_eq!(rh, HebrewDate::new(5786, HebrewMonth::Tishrei, 1).unwrap());
    }

    #[test]
    fn test_pesach_and_purim() {
        let cal = ArithmeticCalendar::default();
        assert_eq!(
            cal.hebrew_date(ymd(2025, 4, 13)).unwrap(),
            HebrewDate::new(5785, HebrewMonth::Nissan, 15).unwrap()
        );
        assert_eq!(
            cal.hebrew_date(ymd(2024, 3, 24)).unwrap(),
            HebrewDate::new(5784, HebrewMonth::AdarII, 14).unwrap()
        );
        assert_eq!(
            cal.hebrew_date(ymd(2005, 3, 25)).unwrap(),
            HebrewDate::new(5765, HebrewMonth::AdarII, 14).unwrap()
        );
    }

    #[test]
    fn test_year_lengths_are_valid() {
        for year in 5700..5900 {
            let len = days_in_year(year);
            let valid: &[i64] = if is_leap_year(year) {
                &[383, 384, 385]
            } else {
                &[353, 354, 355]
            };
            assert!(valid.contains(&len), "year {} has length {}", year, len);
        }
    }

    #[test]
    fn test_rosh_hashana_never_on_sun_wed_fri() {
        let cal = ArithmeticCalendar::default();
        for year in 5700..5900 {
            let d = cal
                .civil_date(&HebrewDate::new(year, HebrewMonth::Tishrei, 1).unwrap())
                .unwrap();
            assert!(
                !matches!(d.weekday(), Weekday::Sun | Weekday::Wed | Weekday::Fri),
                "RH {} falls on {:?}",
                year,
                d.weekday()
            );
        }
    }

    #[test]
    fn test_round_trip_over_a_decade() {
        let cal = ArithmeticCalendar::default();
        let mut date = ymd(2020, 1, 1);
        let mut prev = cal.hebrew_date(date).unwrap();
        for _ in 0..3653 {
            date = date.succ_opt().unwrap();
            let heb = cal.hebrew_date(date).unwrap();
            assert_eq!(cal.civil_date(&heb).unwrap(), date);
            assert_eq!(prev.add_days(1), heb);
            prev = heb;
        }
    }

    #[test]
    fn test_out_of_era_is_date_range_error() {
        let cal = ArithmeticCalendar::default();
        let err = cal.hebrew_date(ymd(1700, 1, 1)).unwrap_err();
        assert!(matches!(err, CalendarError::DateRangeError { .. }));
        assert_eq!(err.date(), Some(ymd(1700, 1, 1)));
    }

    #[test]
    fn test_out_of_era_civil_date_names_the_hebrew_date() {
        let cal = ArithmeticCalendar::default();
        let date = HebrewDate {
            year: 6500,
            month: HebrewMonth::Tishrei,
            day: 1,
        };
        let err = cal.civil_date(&date).unwrap_err();
        assert!(matches!(err, CalendarError::DateRangeError { .. }));
        assert!(err.date().is_none());
        assert_eq!(err.context().details, Some(date.to_string()));
    }

    #[test]
    fn test_new_rejects_adar_ii_in_common_year() {
        assert!(HebrewDate::new(5785, HebrewMonth::AdarII, 1).is_none());
        assert!(HebrewDate::new(5785, HebrewMonth::Adar, 30).is_none());
        assert!(HebrewDate::new(5784, HebrewMonth::Adar, 30).is_some());
    }
}
