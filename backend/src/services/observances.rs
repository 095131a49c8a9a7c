//! Liturgical insertions and seasonal periods.
//!
//! Span-driven observances (Yaaleh Veyavo, Al HaNissim, Aneinu) follow the
//! holiday windows directly. Seasonal ones (Morid HaGeshem, Tal U'Matar, the
//! Three Weeks, Sefira) are anchored on Hebrew dates that usually lie outside
//! the sliding range, so the caller resolves those days up front; see
//! [`anchor_dates`].

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::config::CalendarConfig;
use crate::models::hebrew::{HebrewDate, HebrewMonth};
use crate::models::time::{merge_touching, subtract, Instant, Interval};
use crate::services::composer::{DayInfo, DayTable, Window, WindowKind};
use crate::services::holidays::{HolidayId, HolidaySpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observance {
    MoridHageshem,
    TalUmatar,
    YaalehVeyavo,
    AlHanissim,
    Aneinu,
    NineDays,
    ThreeWeeks,
    NoMusic,
    EruvTavshilin,
    BishulAllowed,
}

impl Observance {
    pub const ALL: [Observance; 10] = [
        Observance::MoridHageshem,
        Observance::TalUmatar,
        Observance::YaalehVeyavo,
        Observance::AlHanissim,
        Observance::Aneinu,
        Observance::NineDays,
        Observance::ThreeWeeks,
        Observance::NoMusic,
        Observance::EruvTavshilin,
        Observance::BishulAllowed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Observance::MoridHageshem => "morid_hageshem",
            Observance::TalUmatar => "tal_umatar",
            Observance::YaalehVeyavo => "yaaleh_veyavo",
            Observance::AlHanissim => "al_hanissim",
            Observance::Aneinu => "aneinu",
            Observance::NineDays => "nine_days",
            Observance::ThreeWeeks => "three_weeks",
            Observance::NoMusic => "no_music",
            Observance::EruvTavshilin => "eruv_tavshilin",
            Observance::BishulAllowed => "bishul_allowed",
        }
    }
}

const ANCHORS: [(HebrewMonth, u8); 12] = [
    (HebrewMonth::Tishrei, 22),
    (HebrewMonth::Cheshvan, 6),
    (HebrewMonth::Kislev, 5),
    (HebrewMonth::Nissan, 15),
    (HebrewMonth::Iyar, 17),
    (HebrewMonth::Iyar, 18),
    (HebrewMonth::Sivan, 2),
    (HebrewMonth::Tammuz, 17),
    (HebrewMonth::Tammuz, 18),
    (HebrewMonth::Tammuz, 29),
    (HebrewMonth::Av, 9),
    (HebrewMonth::Av, 10),
];

/// Hebrew dates whose sun events the seasonal windows of `year` need.
pub fn anchor_dates(year: i32) -> Vec<HebrewDate> {
    ANCHORS
        .iter()
        .filter_map(|&(month, day)| HebrewDate::new(year, month, day))
        .collect()
}

pub struct ObservanceInput<'a> {
    pub spans: &'a [HolidaySpan],
    /// The contiguous sliding range.
    pub table: &'a DayTable,
    /// The range plus resolved anchor days.
    pub anchors: &'a DayTable,
    pub coverage: Option<Interval>,
}

impl ObservanceInput<'_> {
    fn anchor(&self, year: i32, month: HebrewMonth, day: u8) -> Option<&DayInfo> {
        self.anchors.by_hebrew(HebrewDate::new(year, month, day)?)
    }
}

pub fn derive(input: &ObservanceInput<'_>, config: &CalendarConfig) -> Vec<Window> {
    let mut windows = Vec::new();

    windows.extend(span_union(input.spans, Observance::YaalehVeyavo, |id| {
        id == HolidayId::RoshChodesh || id.is_chol_hamoed() || id.is_yomtov()
    }));
    windows.extend(span_union(input.spans, Observance::AlHanissim, |id| {
        matches!(
            id,
            HolidayId::ChanukahAll
                | HolidayId::Purim
                | HolidayId::ShushanPurim
                | HolidayId::PurimMeshulashShabbos
        )
    }));
    windows.extend(span_union(input.spans, Observance::Aneinu, HolidayId::is_fast));

    let years: BTreeSet<i32> = input.anchors.iter().map(|d| d.hebrew.year).collect();
    for year in years {
        windows.extend(seasons(input, year, config));
    }

    windows.extend(eruv_tavshilin(input));
    windows.extend(bishul_allowed(input, config));
    windows
}

fn span_union(
    spans: &[HolidaySpan],
    kind: Observance,
    pick: impl Fn(HolidayId) -> bool,
) -> Vec<Window> {
    let intervals = spans
        .iter()
        .filter(|s| pick(s.holiday_id))
        .map(HolidaySpan::interval)
        .collect();
    merge_touching(intervals)
        .into_iter()
        .map(|i| Window::from_interval(WindowKind::Observance(kind), i))
        .collect()
}

fn window(kind: Observance, start: Instant, end: Instant) -> Option<Window> {
    Window::new(WindowKind::Observance(kind), start, end)
}

fn seasons(input: &ObservanceInput<'_>, year: i32, config: &CalendarConfig) -> Vec<Window> {
    use HebrewMonth::*;

    let havdalah = |d: &DayInfo| d.sun.sunset + config.havdalah_offset();
    let mut out = Vec::new();

    let pesach = input.anchor(year, Nissan, 15);

    if let (Some(start), Some(end)) = (input.anchor(year, Tishrei, 22), pesach) {
        out.extend(window(Observance::MoridHageshem, start.sun.dawn, end.sun.dawn));
    }

    let tal_start = if config.israel {
        input.anchor(year, Cheshvan, 6)
    } else {
        input.anchor(year, Kislev, 5)
    };
    if let (Some(start), Some(end)) = (tal_start, pesach) {
        out.extend(window(Observance::TalUmatar, havdalah(start), havdalah(end)));
    }

    // Nine Days and the Three Weeks.
    let nine_days = match (
        input.anchor(year, Tammuz, 29),
        input.anchor(year, Av, 9),
        input.anchor(year, Av, 10),
    ) {
        (Some(eve), Some(ninth), Some(tenth)) => {
            let end = if ninth.weekday() == Weekday::Sat {
                havdalah(tenth)
            } else {
                tenth.sun.midday
            };
            Interval::spanning(havdalah(eve), end)
        }
        _ => None,
    };
    let mut no_music: Vec<Interval> = Vec::new();
    if let Some(nine) = nine_days {
        out.push(Window::from_interval(
            WindowKind::Observance(Observance::NineDays),
            nine,
        ));
        let fast_day = match input.anchor(year, Tammuz, 17) {
            Some(d) if d.weekday() == Weekday::Sat => input.anchor(year, Tammuz, 18),
            other => other,
        };
        if let Some(fast) = fast_day {
            if let Some(three) = Interval::spanning(fast.sun.dawn, nine.end) {
                out.push(Window::from_interval(
                    WindowKind::Observance(Observance::ThreeWeeks),
                    three,
                ));
                no_music.push(three);
            }
        }
    }

    // Sefira, without Lag B'Omer.
    if let (Some(first_eve), Some(before_lag), Some(lag), Some(last)) = (
        pesach,
        input.anchor(year, Iyar, 17),
        input.anchor(year, Iyar, 18),
        input.anchor(year, Sivan, 2),
    ) {
        no_music.extend(Interval::spanning(havdalah(first_eve), havdalah(before_lag)));
        no_music.extend(Interval::spanning(havdalah(lag), havdalah(last)));
    }
    out.extend(
        merge_touching(no_music)
            .into_iter()
            .map(|i| Window::from_interval(WindowKind::Observance(Observance::NoMusic), i)),
    );
    out
}

/// `[dawn, nightfall)` of the eve of a Yom-Tov run that reaches Friday.
fn eruv_tavshilin(input: &ObservanceInput<'_>) -> Vec<Window> {
    let yomtov: BTreeSet<NaiveDate> = input
        .spans
        .iter()
        .filter(|s| s.is_yomtov && !s.holiday_id.is_aggregate())
        .map(|s| s.date)
        .collect();

    let mut runs: Vec<Vec<NaiveDate>> = Vec::new();
    for date in yomtov {
        match runs.last_mut() {
            Some(run) if run.last().map(|d| *d + Duration::days(1)) == Some(date) => {
                run.push(date)
            }
            _ => runs.push(vec![date]),
        }
    }

    runs.into_iter()
        .filter(|run| run.iter().any(|d| d.weekday() == Weekday::Fri))
        .filter_map(|run| {
            let eve = input.table.get(run[0].pred_opt()?)?;
            window(Observance::EruvTavshilin, eve.sun.dawn, eve.sun.nightfall)
        })
        .collect()
}

/// Everything in range that is neither Shabbos nor Yom Kippur.
fn bishul_allowed(input: &ObservanceInput<'_>, config: &CalendarConfig) -> Vec<Window> {
    let Some(coverage) = input.coverage else {
        return Vec::new();
    };
    let mut holes: Vec<Interval> = input
        .table
        .shabbos_intervals(config)
        .into_iter()
        .map(|(_, i)| i)
        .collect();
    holes.extend(
        input
            .spans
            .iter()
            .filter(|s| s.holiday_id == HolidayId::YomKippur)
            .map(HolidaySpan::interval),
    );
    subtract(coverage, &holes)
        .into_iter()
        .map(|i| Window::from_interval(WindowKind::Observance(Observance::BishulAllowed), i))
        .collect()
}
