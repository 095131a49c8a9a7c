//! Window composition.
//!
//! Turns the per-day holiday spans and the weekly Shabbos into no-melacha
//! [`Block`]s by interval merge, then derives every named [`Window`] from the
//! blocks, the spans and the day table. Everything here is a pure function of
//! its inputs; composing the same spans twice yields identical output.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::config::{CalendarConfig, SelichosAdvanceMode};
use crate::models::hebrew::{HebrewDate, HebrewMonth};
use crate::models::sun::SunEvents;
use crate::models::time::{
    local_midnight, local_wall_clock, merge_touching, motzi_cutoff_after, subtract, Instant,
    Interval, MOTZI_CUTOFF_HOUR,
};
use crate::services::day_type::{self, DayType};
use crate::services::holidays::{DayFacts, HolidayId, HolidaySpan};
use crate::services::observances::{self, Observance};

/// One civil date's resolved inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayInfo {
    pub date: NaiveDate,
    pub hebrew: HebrewDate,
    pub sun: SunEvents,
}

impl DayInfo {
    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }
}

/// Resolved days keyed by civil date.
#[derive(Debug, Clone, Default)]
pub struct DayTable {
    days: BTreeMap<NaiveDate, DayInfo>,
}

impl DayTable {
    pub fn new(days: &[DayInfo]) -> Self {
        Self {
            days: days.iter().map(|d| (d.date, *d)).collect(),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayInfo> {
        self.days.get(&date)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DayInfo> {
        self.days.values()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    pub fn by_hebrew(&self, hebrew: HebrewDate) -> Option<&DayInfo> {
        self.days.values().find(|d| d.hebrew == hebrew)
    }

    /// `[Friday.sunset - candle, Saturday.sunset + havdalah)` for `saturday`.
    pub fn shabbos_interval(&self, saturday: NaiveDate, config: &CalendarConfig) -> Option<Interval> {
        if saturday.weekday() != Weekday::Sat {
            return None;
        }
        let friday = self.get(saturday.pred_opt()?)?;
        let day = self.get(saturday)?;
        Interval::spanning(
            friday.sun.sunset - config.candle_offset(),
            day.sun.sunset + config.havdalah_offset(),
        )
    }

    /// Every weekly Shabbos interval the table can resolve.
    pub fn shabbos_intervals(&self, config: &CalendarConfig) -> Vec<(NaiveDate, Interval)> {
        self.days
            .keys()
            .filter_map(|&d| self.shabbos_interval(d, config).map(|i| (d, i)))
            .collect()
    }

    /// Local-midnight bounds of the whole table.
    pub fn coverage(&self, tz: Tz) -> Option<Interval> {
        let first = self.first_date()?;
        let last = self.last_date()?.succ_opt()?;
        Interval::spanning(local_midnight(first, tz), local_midnight(last, tz))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockClass {
    PureShabbos,
    PureYomTov,
    MixedShabbosYomTov,
    ThreeDayPlus,
}

impl BlockClass {
    pub fn label(self) -> &'static str {
        match self {
            BlockClass::PureShabbos => "pure_shabbos",
            BlockClass::PureYomTov => "pure_yom_tov",
            BlockClass::MixedShabbosYomTov => "mixed_shabbos_yom_tov",
            BlockClass::ThreeDayPlus => "three_day_plus",
        }
    }

    pub fn is_multi_day_mixed(self) -> bool {
        matches!(self, BlockClass::MixedShabbosYomTov | BlockClass::ThreeDayPlus)
    }
}

/// One calendar day's slice of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDay {
    pub date: NaiveDate,
    pub start: Instant,
    pub end: Instant,
    pub shabbos: bool,
    pub yomtov: bool,
    pub chol_hamoed: bool,
}

impl BlockDay {
    /// Shabbos that is not also Yom Tov.
    pub fn is_pure_shabbos(&self) -> bool {
        self.shabbos && !self.yomtov
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

/// Maximal run of contiguous no-melacha days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub start: Instant,
    pub end: Instant,
    pub class: BlockClass,
    pub days: Vec<BlockDay>,
}

impl Block {
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.days.iter().any(|d| d.date == date)
    }

    fn from_run(mut run: Vec<BlockDay>, end: Instant) -> Self {
        // A day's slice runs until the next day's segment takes over, except
        // that Shabbos keeps its own end and the following day starts there.
        let segments: Vec<(Instant, Instant)> = run.iter().map(|d| (d.start, d.end)).collect();
        let last = run.len() - 1;
        let handovers: Vec<Instant> = (0..last)
            .map(|i| {
                let next = segments[i + 1];
                if run[i].shabbos {
                    segments[i].1.max(next.0).min(next.1)
                } else {
                    next.0
                }
            })
            .collect();
        for (i, day) in run.iter_mut().enumerate() {
            if i > 0 {
                day.start = handovers[i - 1];
            }
            day.end = if i == last { end } else { handovers[i] };
        }
        let start = segments[0].0;

        let pure_shabbos = run.iter().any(BlockDay::is_pure_shabbos);
        let yomtov = run.iter().any(|d| d.yomtov);
        let class = match (pure_shabbos, yomtov) {
            (true, true) if run.len() >= 3 => BlockClass::ThreeDayPlus,
            (true, true) => BlockClass::MixedShabbosYomTov,
            (true, false) => BlockClass::PureShabbos,
            _ => BlockClass::PureYomTov,
        };

        Self {
            start,
            end,
            class,
            days: run,
        }
    }
}

/// Holidays with a dedicated Motzi sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MotziHoliday {
    RoshHashana,
    YomKippur,
    Sukkos,
    Pesach,
    Shavuos,
    ShivaAsarBTammuz,
    TishaBav,
    ShushanPurim,
}

impl MotziHoliday {
    pub const ALL: [MotziHoliday; 8] = [
        MotziHoliday::RoshHashana,
        MotziHoliday::YomKippur,
        MotziHoliday::Sukkos,
        MotziHoliday::Pesach,
        MotziHoliday::Shavuos,
        MotziHoliday::ShivaAsarBTammuz,
        MotziHoliday::TishaBav,
        MotziHoliday::ShushanPurim,
    ];

    /// The five Yom-Tov endings whose Motzi defers past a following Shabbos.
    pub fn is_major(self) -> bool {
        matches!(
            self,
            MotziHoliday::RoshHashana
                | MotziHoliday::YomKippur
                | MotziHoliday::Sukkos
                | MotziHoliday::Pesach
                | MotziHoliday::Shavuos
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            MotziHoliday::RoshHashana => "motzei_rosh_hashana",
            MotziHoliday::YomKippur => "motzei_yom_kippur",
            MotziHoliday::Sukkos => "motzei_sukkos",
            MotziHoliday::Pesach => "motzei_pesach",
            MotziHoliday::Shavuos => "motzei_shavuos",
            MotziHoliday::ShivaAsarBTammuz => "motzei_shiva_usor_btammuz",
            MotziHoliday::TishaBav => "motzei_tisha_bav",
            MotziHoliday::ShushanPurim => "motzei_shushan_purim",
        }
    }

    /// The holiday whose final span is `id`, if any.
    pub fn ending_with(id: HolidayId, israel: bool) -> Option<Self> {
        use HolidayId::*;
        match id {
            RoshHashana(2) => Some(MotziHoliday::RoshHashana),
            YomKippur => Some(MotziHoliday::YomKippur),
            SimchasTorah => Some(MotziHoliday::Sukkos),
            AchronShelPesach => Some(MotziHoliday::Pesach),
            ShviiShelPesach if israel => Some(MotziHoliday::Pesach),
            Shavuos(2) => Some(MotziHoliday::Shavuos),
            Shavuos(1) if israel => Some(MotziHoliday::Shavuos),
            ShivaAsarBTammuz => Some(MotziHoliday::ShivaAsarBTammuz),
            TishaBav | TishaBavNidche => Some(MotziHoliday::TishaBav),
            ShushanPurim => Some(MotziHoliday::ShushanPurim),
            _ => None,
        }
    }
}

/// Daily Slichos caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlichosDay {
    /// Non-Shabbos ordinal since Alef Slichos.
    Day(u8),
    ErevRoshHashana,
    TzomGedalia,
    /// Ordinal within the Ten Days of Repentance; the fast is day 1.
    AseresYemeiTeshuva(u8),
    ErevYomKippur,
}

impl SlichosDay {
    pub fn label(self) -> String {
        match self {
            SlichosDay::Day(n) => format!("slichos_day_{}", n),
            SlichosDay::ErevRoshHashana => "slichos_erev_rosh_hashana".into(),
            SlichosDay::TzomGedalia => "slichos_tzom_gedalia".into(),
            SlichosDay::AseresYemeiTeshuva(n) => format!("slichos_aseres_yemei_teshuva_{}", n),
            SlichosDay::ErevYomKippur => "slichos_erev_yom_kippur".into(),
        }
    }
}

/// Shabbos/Yom-Tov transition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transition {
    ErevShabbos,
    ErevYomTov,
    ErevShabbosOnYomTov,
    ErevYomTovOnShabbos,
    MotzeiShabbos,
    MotzeiYomTov,
    MotzeiShabbosIntoYomTov,
    MotzeiYomTovIntoShabbos,
}

impl Transition {
    pub const ALL: [Transition; 8] = [
        Transition::ErevShabbos,
        Transition::ErevYomTov,
        Transition::ErevShabbosOnYomTov,
        Transition::ErevYomTovOnShabbos,
        Transition::MotzeiShabbos,
        Transition::MotzeiYomTov,
        Transition::MotzeiShabbosIntoYomTov,
        Transition::MotzeiYomTovIntoShabbos,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Transition::ErevShabbos => "erev_shabbos",
            Transition::ErevYomTov => "erev_yom_tov",
            Transition::ErevShabbosOnYomTov => "erev_shabbos_on_yom_tov",
            Transition::ErevYomTovOnShabbos => "erev_yom_tov_on_shabbos",
            Transition::MotzeiShabbos => "motzei_shabbos",
            Transition::MotzeiYomTov => "motzei_yom_tov",
            Transition::MotzeiShabbosIntoYomTov => "motzei_shabbos_into_yom_tov",
            Transition::MotzeiYomTovIntoShabbos => "motzei_yom_tov_into_shabbos",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WindowKind {
    /// The whole block.
    NoMelucha,
    /// Pure-Shabbos slice of a block.
    NoMeluchaShabbos,
    /// Yom-Tov run of a block.
    NoMeluchaYomTov,
    Erev,
    Motzi,
    Holiday(HolidayId),
    MotziHoliday(MotziHoliday),
    Upcoming(HolidayId),
    ThreeDayYomTov,
    Slichos,
    SlichosDay(SlichosDay),
    Transition(Transition),
    Observance(Observance),
    DayType(DayType),
}

impl WindowKind {
    /// Indicator name this window feeds.
    pub fn name(&self) -> String {
        match self {
            WindowKind::NoMelucha => "no_melucha".into(),
            WindowKind::NoMeluchaShabbos => "no_melucha_regular_shabbos".into(),
            WindowKind::NoMeluchaYomTov => "no_melucha_yom_tov".into(),
            WindowKind::Erev => "erev".into(),
            WindowKind::Motzi => "motzi".into(),
            WindowKind::Holiday(id) => id.label(),
            WindowKind::MotziHoliday(m) => m.label().into(),
            WindowKind::Upcoming(id) => format!("upcoming_{}", id.label()),
            WindowKind::ThreeDayYomTov => "three_day_yom_tov".into(),
            WindowKind::Slichos => "slichos".into(),
            WindowKind::SlichosDay(s) => s.label(),
            WindowKind::Transition(t) => t.label().into(),
            WindowKind::Observance(o) => o.label().into(),
            WindowKind::DayType(d) => d.label().into(),
        }
    }
}

/// A named half-open interval `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub kind: WindowKind,
    pub start: Instant,
    pub end: Instant,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

impl Window {
    /// `None` when the bounds are empty or reversed.
    pub fn new(kind: WindowKind, start: Instant, end: Instant) -> Option<Self> {
        (start < end).then(|| Self {
            kind,
            start,
            end,
            attributes: BTreeMap::new(),
        })
    }

    pub fn from_interval(kind: WindowKind, interval: Interval) -> Self {
        Self {
            kind,
            start: interval.start,
            end: interval.end,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn name(&self) -> String {
        self.kind.name()
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }

    pub fn contains(&self, t: Instant) -> bool {
        self.start <= t && t < self.end
    }
}

/// Output of one composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    pub blocks: Vec<Block>,
    /// Sorted by start, end, then kind.
    pub windows: Vec<Window>,
    /// Days the windows were built from, in date order.
    pub days: Vec<DayInfo>,
    /// Instants the Day-Type timeline covers.
    pub coverage: Option<Interval>,
}

impl Composition {
    pub fn windows_of(&self, kind: WindowKind) -> impl Iterator<Item = &Window> {
        self.windows.iter().filter(move |w| w.kind == kind)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayInfo> {
        self.days.iter().find(|d| d.date == date)
    }
}

/// Merges spans into blocks and derives windows.
#[derive(Debug, Clone)]
pub struct WindowComposer {
    config: CalendarConfig,
    tz: Tz,
}

impl WindowComposer {
    pub fn new(config: CalendarConfig, tz: Tz) -> Self {
        Self { config, tz }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// Compose `spans` (from the contiguous `days` range) into blocks and
    /// windows. `anchors` are extra resolved days outside the range that
    /// seasonal observances need.
    pub fn compose(
        &self,
        spans: &[HolidaySpan],
        days: &[DayInfo],
        anchors: &[DayInfo],
    ) -> Composition {
        let table = DayTable::new(days);
        let yomtov_dates: BTreeSet<NaiveDate> = spans
            .iter()
            .filter(|s| s.is_yomtov && !s.holiday_id.is_aggregate())
            .map(|s| s.date)
            .collect();

        let blocks = self.blocks(spans, &table);

        let mut windows = Vec::new();
        windows.extend(self.block_windows(&blocks, &table));
        windows.extend(self.holiday_windows(spans));
        windows.extend(self.motzi_holiday_windows(spans, &table));
        windows.extend(self.upcoming_windows(spans, &table));
        windows.extend(self.slichos_windows(spans, &blocks, &table));
        windows.extend(self.transition_windows(&table, &yomtov_dates));

        let coverage = table.coverage(self.tz);
        let mut extended: Vec<DayInfo> = anchors.to_vec();
        extended.extend_from_slice(days);
        windows.extend(observances::derive(
            &observances::ObservanceInput {
                spans,
                table: &table,
                anchors: &DayTable::new(&extended),
                coverage,
            },
            &self.config,
        ));

        if let Some(coverage) = coverage {
            let timeline = day_type::timeline(&blocks, &windows, coverage);
            windows.extend(timeline);
        }

        windows.sort_by(|a, b| (a.start, a.end, a.kind).cmp(&(b.start, b.end, b.kind)));

        log::debug!(
            "composed {} spans into {} blocks and {} windows",
            spans.len(),
            blocks.len(),
            windows.len()
        );

        Composition {
            blocks,
            windows,
            days: table.iter().copied().collect(),
            coverage,
        }
    }

    /// Interval merge of the weekly Shabbos and every Yom-Tov day.
    pub fn blocks(&self, spans: &[HolidaySpan], table: &DayTable) -> Vec<Block> {
        let mut segments: Vec<BlockDay> = Vec::new();
        for day in table.iter() {
            let shabbos = table.shabbos_interval(day.date, &self.config);
            let on_day: Vec<&HolidaySpan> = spans
                .iter()
                .filter(|s| s.date == day.date && !s.holiday_id.is_aggregate())
                .collect();
            let yomtov: Vec<Interval> = on_day
                .iter()
                .filter(|s| s.is_yomtov)
                .map(|s| s.interval())
                .collect();

            let mut bounds = shabbos.into_iter().chain(yomtov.iter().copied());
            let Some(first) = bounds.next() else {
                continue;
            };
            let merged = bounds.fold(first, |acc, i| Interval {
                start: acc.start.min(i.start),
                end: acc.end.max(i.end),
            });

            segments.push(BlockDay {
                date: day.date,
                start: merged.start,
                end: merged.end,
                shabbos: day.weekday() == Weekday::Sat,
                yomtov: !yomtov.is_empty(),
                chol_hamoed: on_day.iter().any(|s| s.holiday_id.is_chol_hamoed()),
            });
        }
        segments.sort_by_key(|s| (s.start, s.date));

        let mut blocks = Vec::new();
        let mut run: Vec<BlockDay> = Vec::new();
        let mut run_end = None;
        for segment in segments {
            match run_end {
                Some(end) if segment.start <= end => {
                    run_end = Some(segment.end.max(end));
                    run.push(segment);
                }
                Some(end) => {
                    blocks.push(Block::from_run(std::mem::take(&mut run), end));
                    run_end = Some(segment.end);
                    run.push(segment);
                }
                None => {
                    run_end = Some(segment.end);
                    run.push(segment);
                }
            }
        }
        if let Some(end) = run_end {
            blocks.push(Block::from_run(run, end));
        }
        blocks
    }

    fn block_windows(&self, blocks: &[Block], table: &DayTable) -> Vec<Window> {
        let mut windows = Vec::new();
        for block in blocks {
            let class = block.class.label();
            windows.push(
                Window::from_interval(WindowKind::NoMelucha, block.interval())
                    .with_attr("class", class),
            );

            for day in block.days.iter().filter(|d| d.is_pure_shabbos()) {
                if let Some(w) = Window::new(WindowKind::NoMeluchaShabbos, day.start, day.end) {
                    windows.push(w.with_attr("chol_hamoed", day.chol_hamoed));
                }
            }

            let yomtov: Vec<Interval> = block
                .days
                .iter()
                .filter(|d| d.yomtov && d.start < d.end)
                .map(BlockDay::interval)
                .collect();
            for run in merge_touching(yomtov) {
                windows.push(Window::from_interval(WindowKind::NoMeluchaYomTov, run));
            }

            let first = block.days[0].date;
            if let Some(erev) = first.pred_opt().and_then(|d| table.get(d)) {
                if !blocks.iter().any(|b| b.contains_date(erev.date)) {
                    if let Some(w) = Window::new(WindowKind::Erev, erev.sun.dawn, block.start) {
                        windows.push(w.with_attr("class", class));
                    }
                }
            }

            let cutoff = motzi_cutoff_after(block.end, self.tz);
            if let Some(w) = Window::new(WindowKind::Motzi, block.end, cutoff) {
                windows.push(w.with_attr("class", class));
            }

            if block.class.is_multi_day_mixed() {
                let last = block.days[block.days.len() - 1].date;
                if let Some(after) = last.succ_opt().and_then(|d| table.get(d)) {
                    if let Some(w) =
                        Window::new(WindowKind::ThreeDayYomTov, block.start, after.sun.dawn)
                    {
                        windows.push(
                            w.with_attr("shabbos_first", block.days[0].is_pure_shabbos())
                                .with_attr("yomtov_first", block.days[0].yomtov),
                        );
                    }
                }
            }
        }
        windows
    }

    /// One window per holiday identity run; per-day pieces of aggregates
    /// chain into a single window.
    fn holiday_windows(&self, spans: &[HolidaySpan]) -> Vec<Window> {
        let mut by_id: BTreeMap<HolidayId, Vec<Interval>> = BTreeMap::new();
        for span in spans {
            by_id.entry(span.holiday_id).or_default().push(span.interval());
        }

        let mut windows = Vec::new();
        for (id, intervals) in by_id {
            for interval in merge_touching(intervals) {
                windows.push(
                    Window::from_interval(WindowKind::Holiday(id), interval)
                        .with_attr("is_yomtov", id.is_yomtov())
                        .with_attr("is_fast", id.is_fast()),
                );
            }
        }
        windows
    }

    fn motzi_holiday_windows(&self, spans: &[HolidaySpan], table: &DayTable) -> Vec<Window> {
        let shabbosos = table.shabbos_intervals(&self.config);
        let mut windows = Vec::new();

        for span in spans {
            let Some(target) = MotziHoliday::ending_with(span.holiday_id, self.config.israel) else {
                continue;
            };
            let kind = WindowKind::MotziHoliday(target);

            // Purim Meshulash: Shushan Purim on Shabbos, feast on Sunday.
            if target == MotziHoliday::ShushanPurim && span.date.weekday() == Weekday::Sat {
                let sunday = span.date + Duration::days(1);
                let monday = span.date + Duration::days(2);
                if let (Some(sun), Some(mon)) = (table.get(sunday), table.get(monday)) {
                    if let Some(w) = Window::new(kind, sun.sun.nightfall, mon.sun.dawn) {
                        windows.push(w.with_attr("purim_meshulash", true));
                    }
                }
                continue;
            }

            let overlapping = shabbosos.iter().find(|(_, i)| i.contains(span.end));
            match overlapping {
                Some((saturday, shabbos)) if target.is_major() => {
                    let sunday = *saturday + Duration::days(1);
                    if let Some(sun) = table.get(sunday) {
                        if let Some(w) = Window::new(kind, shabbos.end, sun.sun.dawn) {
                            windows.push(w.with_attr("deferred", true));
                        }
                    }
                }
                Some(_) => {
                    log::debug!(
                        "{} ends inside Shabbos on {}, no Motzi window",
                        span.label,
                        span.date
                    );
                }
                None => {
                    let cutoff = motzi_cutoff_after(span.end, self.tz);
                    if let Some(w) = Window::new(kind, span.end, cutoff) {
                        windows.push(w);
                    }
                }
            }
        }
        windows
    }

    /// `[(D - 2 - N).sunset + havdalah, span.start)` for each eligible span.
    fn upcoming_windows(&self, spans: &[HolidaySpan], table: &DayTable) -> Vec<Window> {
        let lead = Duration::days(2 + i64::from(self.config.lookahead_days));
        spans
            .iter()
            .filter(|s| announces_upcoming(s.holiday_id))
            .filter_map(|span| {
                let anchor = table.get(span.date - lead)?;
                Window::new(
                    WindowKind::Upcoming(span.holiday_id),
                    anchor.sun.sunset + self.config.havdalah_offset(),
                    span.start,
                )
            })
            .collect()
    }

    fn slichos_windows(
        &self,
        spans: &[HolidaySpan],
        blocks: &[Block],
        table: &DayTable,
    ) -> Vec<Window> {
        let holes: Vec<Interval> = blocks.iter().map(Block::interval).collect();
        let mut windows = Vec::new();

        for alef in spans.iter().filter(|s| s.holiday_id == HolidayId::AlefSlichos) {
            let Some(erev_yk) = spans.iter().find(|s| {
                s.holiday_id == HolidayId::ErevYomKippur
                    && s.date > alef.date
                    && s.date - alef.date <= Duration::days(21)
            }) else {
                continue;
            };
            let Some(period) = Interval::spanning(alef.start, erev_yk.end) else {
                continue;
            };
            for piece in subtract(period, &holes) {
                windows.push(Window::from_interval(WindowKind::Slichos, piece));
            }

            let tzom = spans
                .iter()
                .find(|s| s.holiday_id == HolidayId::TzomGedalia && s.date > alef.date)
                .map(|s| s.date);

            let mut ordinal: u8 = 0;
            let mut teshuva: u8 = 0;
            let mut date = alef.date;
            while date <= erev_yk.date {
                let Some(day) = table.get(date) else {
                    date += Duration::days(1);
                    continue;
                };
                let shabbos = day.weekday() == Weekday::Sat;
                if !shabbos {
                    ordinal = ordinal.saturating_add(1);
                }
                let caption = slichos_caption(day, tzom, shabbos, ordinal, &mut teshuva);

                if let Some(caption) = caption {
                    let first = date == alef.date;
                    if let Some(bounds) = self.slichos_day_bounds(day, first, table, period) {
                        for piece in subtract(bounds, &holes) {
                            windows.push(Window::from_interval(
                                WindowKind::SlichosDay(caption),
                                piece,
                            ));
                        }
                    }
                }
                date += Duration::days(1);
            }
        }
        windows
    }

    fn slichos_day_bounds(
        &self,
        day: &DayInfo,
        first: bool,
        table: &DayTable,
        period: Interval,
    ) -> Option<Interval> {
        let (start, end) = match self.config.selichos_advance_mode {
            SelichosAdvanceMode::Havdalah => {
                let eve = table.get(day.date.pred_opt()?)?;
                (
                    eve.sun.sunset + self.config.havdalah_offset(),
                    day.sun.sunset + self.config.havdalah_offset(),
                )
            }
            SelichosAdvanceMode::Midnight => (
                local_midnight(day.date, self.tz),
                local_midnight(day.date.succ_opt()?, self.tz),
            ),
        };
        // The first day opens at Motzei Shabbos in either mode.
        let start = if first { period.start } else { start };
        Interval::spanning(start.max(period.start), end.min(period.end))
    }

    fn transition_windows(
        &self,
        table: &DayTable,
        yomtov: &BTreeSet<NaiveDate>,
    ) -> Vec<Window> {
        let mut windows = Vec::new();
        for day in table.iter() {
            let Some(next) = day.date.succ_opt() else {
                continue;
            };
            if table.get(next).is_none() {
                continue;
            }
            let yt_today = yomtov.contains(&day.date);
            let yt_tomorrow = yomtov.contains(&next);
            let friday = day.weekday() == Weekday::Fri;
            let saturday = day.weekday() == Weekday::Sat;

            let candle = day.sun.sunset - self.config.candle_offset();
            let havdalah = day.sun.sunset + self.config.havdalah_offset();
            let two_am = local_wall_clock(next, MOTZI_CUTOFF_HOUR, 0, self.tz);

            let mut push = |t: Transition, start: Instant, end: Instant| {
                if let Some(w) = Window::new(WindowKind::Transition(t), start, end) {
                    windows.push(w);
                }
            };

            if friday && !yt_today {
                push(Transition::ErevShabbos, day.sun.dawn, candle);
            }
            if friday && yt_today {
                push(Transition::ErevShabbosOnYomTov, day.sun.midday, candle);
            }
            if yt_tomorrow && !yt_today && !saturday {
                push(Transition::ErevYomTov, day.sun.dawn, candle);
            }
            if yt_tomorrow && saturday {
                push(Transition::ErevYomTovOnShabbos, day.sun.midday, candle);
            }
            if saturday && !yt_tomorrow {
                push(Transition::MotzeiShabbos, havdalah, two_am);
            }
            if saturday && yt_tomorrow {
                push(Transition::MotzeiShabbosIntoYomTov, havdalah, two_am);
            }
            if yt_today && !yt_tomorrow && !friday {
                push(Transition::MotzeiYomTov, havdalah, two_am);
            }
            if yt_today && !yt_tomorrow && friday {
                push(Transition::MotzeiYomTovIntoShabbos, havdalah, two_am);
            }
        }
        windows
    }
}

/// Holidays announced by the Upcoming lookahead: the first day of each
/// observance, never eves, aggregates or annotations.
fn announces_upcoming(id: HolidayId) -> bool {
    use HolidayId::*;
    if id.is_erev() || id.is_aggregate() || id.is_overlay() {
        return false;
    }
    match id {
        IsruChagSukkos | IsruChagPesach | IsruChagShavuos => false,
        RoshHashana(n) | Sukkos(n) | CholHamoedSukkos(n) | Chanukah(n) | Pesach(n)
        | CholHamoedPesach(n) | Shavuos(n) => n == 1,
        _ => true,
    }
}

fn slichos_caption(
    day: &DayInfo,
    tzom: Option<NaiveDate>,
    shabbos: bool,
    ordinal: u8,
    teshuva: &mut u8,
) -> Option<SlichosDay> {
    let h = day.hebrew;
    let tishrei = h.month == HebrewMonth::Tishrei;

    let facts = DayFacts {
        date: day.date,
        hebrew: h,
        weekday: day.weekday(),
        israel: false,
    };
    if HolidayId::ShloshEsreiMidos.occurs_on(&facts) {
        *teshuva = teshuva.saturating_add(1);
        return Some(SlichosDay::AseresYemeiTeshuva(5));
    }
    if h.is(HebrewMonth::Elul, 29) {
        return Some(SlichosDay::ErevRoshHashana);
    }
    if Some(day.date) == tzom {
        *teshuva = 1;
        return Some(SlichosDay::TzomGedalia);
    }
    if h.is(HebrewMonth::Tishrei, 9) {
        return Some(SlichosDay::ErevYomKippur);
    }
    if tishrei {
        if shabbos || tzom.map_or(true, |t| day.date < t) {
            return None;
        }
        *teshuva = teshuva.saturating_add(1);
        return Some(SlichosDay::AseresYemeiTeshuva(*teshuva));
    }
    if shabbos || ordinal == 0 {
        return None;
    }
    Some(SlichosDay::Day(ordinal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::hebrew::{ArithmeticCalendar, HebrewCalendar};
    use crate::services::holidays::{DaySun, HolidayRuleEngine};
    use chrono::{TimeZone, Utc};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> Instant {
        Utc.with_ymd_and_hms(date.year(), date.month(), date.day(), h, m, 0)
            .unwrap()
    }

    /// Sunrise 06:00 and sunset 18:00 UTC every day.
    fn day_info(date: NaiveDate) -> DayInfo {
        let sunrise = at(date, 6, 0);
        DayInfo {
            date,
            hebrew: ArithmeticCalendar::default().hebrew_date(date).unwrap(),
            sun: SunEvents::from_solar(
                date,
                sunrise,
                at(date, 18, 0),
                sunrise + Duration::days(1),
            ),
        }
    }

    fn compose_range(first: NaiveDate, last: NaiveDate, config: CalendarConfig) -> Composition {
        let days: Vec<DayInfo> = first
            .iter_days()
            .take_while(|d| *d <= last)
            .map(day_info)
            .collect();
        let rules = HolidayRuleEngine::new();
        let spans: Vec<HolidaySpan> = days
            .windows(2)
            .flat_map(|pair| {
                let sun = DaySun {
                    eve: pair[0].sun,
                    day: pair[1].sun,
                };
                rules.spans_for(pair[1].date, &pair[1].hebrew, pair[1].weekday(), &sun, &config)
            })
            .collect();
        WindowComposer::new(config, chrono_tz::UTC).compose(&spans, &days, &[])
    }

    fn only(composition: &Composition, kind: WindowKind) -> Vec<&Window> {
        composition.windows_of(kind).collect()
    }

    #[test]
    fn test_plain_shabbos_block_and_edges() {
        // No Yom Tov in this stretch of Iyar 5785.
        let c = compose_range(ymd(2025, 5, 5), ymd(2025, 5, 14), CalendarConfig::default());
        assert_eq!(c.blocks.len(), 1);

        let block = &c.blocks[0];
        let (fri, sat, sun) = (ymd(2025, 5, 9), ymd(2025, 5, 10), ymd(2025, 5, 11));
        assert_eq!(block.class, BlockClass::PureShabbos);
        assert_eq!(block.start, at(fri, 17, 45));
        assert_eq!(block.end, at(sat, 19, 12));

        let erev = only(&c, WindowKind::Erev);
        assert_eq!(erev.len(), 1);
        assert_eq!((erev[0].start, erev[0].end), (at(fri, 4, 48), at(fri, 17, 45)));

        let motzi = only(&c, WindowKind::Motzi);
        assert_eq!(motzi.len(), 1);
        assert_eq!((motzi[0].start, motzi[0].end), (at(sat, 19, 12), at(sun, 2, 0)));

        let shabbos = only(&c, WindowKind::NoMeluchaShabbos);
        assert_eq!(shabbos.len(), 1);
        assert!(only(&c, WindowKind::NoMeluchaYomTov).is_empty());
    }

    #[test]
    fn test_two_day_yomtov_slices_hand_over() {
        // Rosh Hashana 5786: Tuesday and Wednesday.
        let c = compose_range(ymd(2025, 9, 18), ymd(2025, 9, 26), CalendarConfig::default());
        let rh = c
            .blocks
            .iter()
            .find(|b| b.contains_date(ymd(2025, 9, 23)))
            .unwrap();

        assert_eq!(rh.class, BlockClass::PureYomTov);
        assert_eq!(rh.days.len(), 2);
        assert_eq!(rh.days[0].end, rh.days[1].start);
        assert_eq!(rh.start, at(ymd(2025, 9, 22), 17, 45));
        assert_eq!(rh.end, at(ymd(2025, 9, 24), 19, 12));

        let yomtov = only(&c, WindowKind::NoMeluchaYomTov);
        assert_eq!(yomtov.len(), 1);
        assert_eq!(yomtov[0].interval(), rh.interval());
    }

    #[test]
    fn test_yomtov_into_shabbos_is_three_day_block() {
        // Pesach 5786 outside Israel: Thursday, Friday, then Shabbos.
        let c = compose_range(ymd(2026, 3, 28), ymd(2026, 4, 7), CalendarConfig::default());
        let block = c
            .blocks
            .iter()
            .find(|b| b.contains_date(ymd(2026, 4, 2)))
            .unwrap();

        assert_eq!(block.class, BlockClass::ThreeDayPlus);
        assert_eq!(block.days.len(), 3);
        assert!(block.days[2].is_pure_shabbos());
        assert!(block.days[2].chol_hamoed);
        assert_eq!(block.start, at(ymd(2026, 4, 1), 17, 45));
        assert_eq!(block.end, at(ymd(2026, 4, 4), 19, 12));

        let three = only(&c, WindowKind::ThreeDayYomTov);
        assert_eq!(three.len(), 1);
        assert_eq!(three[0].end, at(ymd(2026, 4, 5), 4, 48));
        assert_eq!(three[0].attributes["yomtov_first"], Value::Bool(true));
        assert_eq!(three[0].attributes["shabbos_first"], Value::Bool(false));

        let into_shabbos = only(
            &c,
            WindowKind::Transition(Transition::MotzeiYomTovIntoShabbos),
        );
        assert_eq!(into_shabbos.len(), 1);
        assert_eq!(into_shabbos[0].start, at(ymd(2026, 4, 3), 19, 12));
        assert!(only(&c, WindowKind::Transition(Transition::ErevYomTov))
            .iter()
            .any(|w| w.start == at(ymd(2026, 4, 1), 4, 48)));
    }

    #[test]
    fn test_israel_splits_pesach_from_shabbos() {
        let config = CalendarConfig {
            israel: true,
            ..Default::default()
        };
        let c = compose_range(ymd(2026, 3, 28), ymd(2026, 4, 7), config);
        let classes: Vec<BlockClass> = c
            .blocks
            .iter()
            .filter(|b| b.start >= at(ymd(2026, 4, 1), 0, 0) && b.end <= at(ymd(2026, 4, 5), 0, 0))
            .map(|b| b.class)
            .collect();
        assert_eq!(classes, vec![BlockClass::PureYomTov, BlockClass::PureShabbos]);
        assert!(only(&c, WindowKind::ThreeDayYomTov).is_empty());
    }

    #[test]
    fn test_upcoming_announces_first_day_only() {
        let config = CalendarConfig {
            lookahead_days: 2,
            ..Default::default()
        };
        let c = compose_range(ymd(2025, 9, 15), ymd(2025, 9, 26), config);

        let rh1 = only(&c, WindowKind::Upcoming(HolidayId::RoshHashana(1)));
        assert_eq!(rh1.len(), 1);
        assert_eq!(rh1[0].start, at(ymd(2025, 9, 19), 19, 12));
        assert_eq!(rh1[0].end, at(ymd(2025, 9, 22), 17, 45));

        assert!(only(&c, WindowKind::Upcoming(HolidayId::RoshHashana(2))).is_empty());
        assert!(only(&c, WindowKind::Upcoming(HolidayId::ErevRoshHashana)).is_empty());
        assert!(only(&c, WindowKind::Upcoming(HolidayId::RoshHashanaAll)).is_empty());
    }

    #[test]
    fn test_slichos_captions_and_holes() {
        // Alef Slichos 5786 is Sunday 21 Elul; Tzom Gedalia falls on Thursday.
        let c = compose_range(ymd(2025, 9, 12), ymd(2025, 10, 3), CalendarConfig::default());

        let mut captions: Vec<SlichosDay> = c
            .windows
            .iter()
            .filter_map(|w| match w.kind {
                WindowKind::SlichosDay(s) => Some(s),
                _ => None,
            })
            .collect();
        captions.dedup();
        assert_eq!(
            captions,
            vec![
                SlichosDay::Day(1),
                SlichosDay::Day(2),
                SlichosDay::Day(3),
                SlichosDay::Day(4),
                SlichosDay::Day(5),
                SlichosDay::Day(6),
                SlichosDay::Day(7),
                SlichosDay::ErevRoshHashana,
                SlichosDay::TzomGedalia,
                SlichosDay::AseresYemeiTeshuva(2),
                SlichosDay::AseresYemeiTeshuva(3),
                SlichosDay::AseresYemeiTeshuva(4),
                SlichosDay::AseresYemeiTeshuva(5),
                SlichosDay::ErevYomKippur,
            ]
        );

        let slichos = only(&c, WindowKind::Slichos);
        assert_eq!(slichos[0].start, at(ymd(2025, 9, 13), 19, 12));
        for w in &slichos {
            assert!(c.blocks.iter().all(|b| !b.interval().overlaps(&w.interval())));
        }
    }

    #[test]
    fn test_compose_is_deterministic_and_sorted() {
        let a = compose_range(ymd(2026, 3, 28), ymd(2026, 4, 12), CalendarConfig::default());
        let b = compose_range(ymd(2026, 3, 28), ymd(2026, 4, 12), CalendarConfig::default());
        assert_eq!(a, b);
        for pair in a.windows.windows(2) {
            assert!((pair[0].start, pair[0].end, pair[0].kind) <= (pair[1].start, pair[1].end, pair[1].kind));
        }
        assert!(a.windows.iter().all(|w| w.start < w.end));
    }

    #[test]
    fn test_shabbos_interval_requires_saturday_and_friday() {
        let table = DayTable::new(&[day_info(ymd(2025, 5, 9)), day_info(ymd(2025, 5, 10))]);
        let config = CalendarConfig::default();
        assert!(table.shabbos_interval(ymd(2025, 5, 9), &config).is_none());
        let shabbos = table.shabbos_interval(ymd(2025, 5, 10), &config).unwrap();
        assert_eq!(shabbos.start, at(ymd(2025, 5, 9), 17, 45));

        let lonely = DayTable::new(&[day_info(ymd(2025, 5, 10))]);
        assert!(lonely.shabbos_interval(ymd(2025, 5, 10), &config).is_none());
    }
}
