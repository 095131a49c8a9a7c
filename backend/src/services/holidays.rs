//! Holiday rule engine.
//!
//! Every holiday identity is one [`HolidayId`] variant, and the rule for each
//! one lives in the exhaustive `match` of [`HolidayId::occurs_on`]. Adding a
//! variant without a rule does not compile. Preconditions within a family
//! (deferred fasts, Israel vs Diaspora day counts, Adar vs Adar II) are
//! mutually exclusive; the rule-table tests check that over whole cycles.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::config::CalendarConfig;
use crate::models::hebrew::{days_in_month, HebrewDate, HebrewMonth};
use crate::models::sun::SunEvents;
use crate::models::time::{Instant, Interval};

/// One holiday identity. Multi-day festivals carry their day number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HolidayId {
    AlefSlichos,
    ErevRoshHashana,
    RoshHashana(u8),
    RoshHashanaAll,
    TzomGedalia,
    ShloshEsreiMidos,
    ErevYomKippur,
    YomKippur,
    ErevSukkos,
    Sukkos(u8),
    SukkosAll,
    CholHamoedSukkos(u8),
    CholHamoedSukkosAll,
    HoshanaRabbah,
    SheminiAtzeres,
    SimchasTorah,
    IsruChagSukkos,
    ErevChanukah,
    Chanukah(u8),
    ChanukahAll,
    ZosChanukah,
    AsaraBTeves,
    TuBShvat,
    TaanisEsther,
    Purim,
    ShushanPurim,
    PurimMeshulashMegillah,
    PurimMeshulashShabbos,
    PurimMeshulashSeudah,
    BedikasChametz,
    ErevPesach,
    Pesach(u8),
    PesachAll,
    CholHamoedPesach(u8),
    CholHamoedPesachAll,
    ShviiShelPesach,
    AchronShelPesach,
    IsruChagPesach,
    PesachSheni,
    LagBaomer,
    ErevShavuos,
    Shavuos(u8),
    ShavuosAll,
    IsruChagShavuos,
    ShivaAsarBTammuz,
    ErevTishaBav,
    TishaBav,
    TishaBavNidche,
    RoshChodesh,
}

/// How a span's bounds are built from the eve's and the day's sun events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `[eve.sunset - candle, day.sunset + havdalah)`
    CandleHavdalah,
    /// `[eve.sunset + havdalah, day.sunset + havdalah)`
    HavdalahHavdalah,
    /// `[eve.sunset + havdalah, day.sunset - candle)`
    HavdalahCandle,
    /// `[day.dawn, day.sunset + havdalah)`
    AlosHavdalah,
    /// `[eve.sunset - candle, day.dawn)`
    CandleDawn,
}

/// Facts about one civil date that rules are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayFacts {
    pub date: NaiveDate,
    pub hebrew: HebrewDate,
    pub weekday: Weekday,
    pub israel: bool,
}

impl DayFacts {
    fn chol_hamoed_day(&self, month: HebrewMonth) -> Option<u8> {
        let first = if self.israel { 16 } else { 17 };
        (self.hebrew.month == month && (first..=20).contains(&self.hebrew.day))
            .then(|| self.hebrew.day - first + 1)
    }

    fn chanukah_day(&self) -> Option<u8> {
        let h = self.hebrew;
        match h.month {
            HebrewMonth::Kislev if h.day >= 25 => Some(h.day - 24),
            HebrewMonth::Teves => {
                let n = days_in_month(h.year, HebrewMonth::Kislev) - 24 + h.day;
                (n <= 8).then_some(n)
            }
            _ => None,
        }
    }
}

impl HolidayId {
    /// Every identity in table order.
    pub fn all() -> Vec<HolidayId> {
        use HolidayId::*;
        let mut ids = vec![
            AlefSlichos,
            ErevRoshHashana,
            RoshHashana(1),
            RoshHashana(2),
            RoshHashanaAll,
            TzomGedalia,
            ShloshEsreiMidos,
            ErevYomKippur,
            YomKippur,
            ErevSukkos,
            Sukkos(1),
            Sukkos(2),
            SukkosAll,
        ];
        ids.extend((1..=5).map(CholHamoedSukkos));
        ids.extend([
            CholHamoedSukkosAll,
            HoshanaRabbah,
            SheminiAtzeres,
            SimchasTorah,
            IsruChagSukkos,
            ErevChanukah,
        ]);
        ids.extend((1..=8).map(Chanukah));
        ids.extend([
            ChanukahAll,
            ZosChanukah,
            AsaraBTeves,
            TuBShvat,
            TaanisEsther,
            Purim,
            ShushanPurim,
            PurimMeshulashMegillah,
            PurimMeshulashShabbos,
            PurimMeshulashSeudah,
            BedikasChametz,
            ErevPesach,
            Pesach(1),
            Pesach(2),
            PesachAll,
        ]);
        ids.extend((1..=5).map(CholHamoedPesach));
        ids.extend([
            CholHamoedPesachAll,
            ShviiShelPesach,
            AchronShelPesach,
            IsruChagPesach,
            PesachSheni,
            LagBaomer,
            ErevShavuos,
            Shavuos(1),
            Shavuos(2),
            ShavuosAll,
            IsruChagShavuos,
            ShivaAsarBTammuz,
            ErevTishaBav,
            TishaBav,
            TishaBavNidche,
            RoshChodesh,
        ]);
        ids
    }

    /// The rule table.
    pub fn occurs_on(self, facts: &DayFacts) -> bool {
        use HebrewMonth::*;
        use HolidayId::*;

        let h = facts.hebrew;
        let (m, d) = (h.month, h.day);
        let wd = facts.weekday;
        let il = facts.israel;
        let purim = HebrewDate::purim_month(h.year);

        match self {
            AlefSlichos => m == Elul && (21..=26).contains(&d) && wd == Weekday::Sun,
            ErevRoshHashana => h.is(Elul, 29),
            RoshHashana(n) => m == Tishrei && d == n,
            RoshHashanaAll => m == Tishrei && d <= 2,
            TzomGedalia => {
                (h.is(Tishrei, 3) && wd != Weekday::Sat) || (h.is(Tishrei, 4) && wd == Weekday::Sun)
            }
            ShloshEsreiMidos => {
                m == Tishrei
                    && ((d == 8 && matches!(wd, Weekday::Mon | Weekday::Tue | Weekday::Thu))
                        || (d == 6 && wd == Weekday::Thu))
            }
            ErevYomKippur => h.is(Tishrei, 9),
            YomKippur => h.is(Tishrei, 10),
            ErevSukkos => h.is(Tishrei, 14),
            Sukkos(n) => m == Tishrei && d == 14 + n && (n == 1 || !il),
            SukkosAll => m == Tishrei && (d == 15 || (d == 16 && !il)),
            CholHamoedSukkos(n) => facts.chol_hamoed_day(Tishrei) == Some(n),
            CholHamoedSukkosAll => facts.chol_hamoed_day(Tishrei).is_some(),
            HoshanaRabbah => h.is(Tishrei, 21),
            SheminiAtzeres => h.is(Tishrei, 22),
            SimchasTorah => h.is(Tishrei, if il { 22 } else { 23 }),
            IsruChagSukkos => h.is(Tishrei, if il { 23 } else { 24 }),
            ErevChanukah => h.is(Kislev, 24),
            Chanukah(n) => facts.chanukah_day() == Some(n),
            ChanukahAll => facts.chanukah_day().is_some(),
            ZosChanukah => facts.chanukah_day() == Some(8),
            AsaraBTeves => h.is(Teves, 10),
            TuBShvat => h.is(Shvat, 15),
            TaanisEsther => {
                (h.is(purim, 13) && wd != Weekday::Sat) || (h.is(purim, 11) && wd == Weekday::Thu)
            }
            Purim => h.is(purim, 14),
            ShushanPurim => h.is(purim, 15),
            PurimMeshulashMegillah => h.is(purim, 14) && wd == Weekday::Fri,
            PurimMeshulashShabbos => h.is(purim, 15) && wd == Weekday::Sat,
            PurimMeshulashSeudah => h.is(purim, 16) && wd == Weekday::Sun,
            BedikasChametz => {
                (h.is(Nissan, 14) && wd != Weekday::Sat) || (h.is(Nissan, 13) && wd == Weekday::Fri)
            }
            ErevPesach => h.is(Nissan, 14),
            Pesach(n) => m == Nissan && d == 14 + n && (n == 1 || !il),
            PesachAll => m == Nissan && (d == 15 || (d == 16 && !il)),
            CholHamoedPesach(n) => facts.chol_hamoed_day(Nissan) == Some(n),
            CholHamoedPesachAll => facts.chol_hamoed_day(Nissan).is_some(),
            ShviiShelPesach => h.is(Nissan, 21),
            AchronShelPesach => h.is(Nissan, 22) && !il,
            IsruChagPesach => h.is(Nissan, if il { 22 } else { 23 }),
            PesachSheni => h.is(Iyar, 14),
            LagBaomer => h.is(Iyar, 18),
            ErevShavuos => h.is(Sivan, 5),
            Shavuos(n) => m == Sivan && d == 5 + n && (n == 1 || !il),
            ShavuosAll => m == Sivan && (d == 6 || (d == 7 && !il)),
            IsruChagShavuos => h.is(Sivan, if il { 7 } else { 8 }),
            ShivaAsarBTammuz => {
                (h.is(Tammuz, 17) && wd != Weekday::Sat) || (h.is(Tammuz, 18) && wd == Weekday::Sun)
            }
            ErevTishaBav => {
                (h.is(Av, 8) && wd != Weekday::Fri) || (h.is(Av, 9) && wd == Weekday::Sat)
            }
            TishaBav => h.is(Av, 9) && wd != Weekday::Sat,
            TishaBavNidche => h.is(Av, 10) && wd == Weekday::Sun,
            RoshChodesh => d == 30 || (d == 1 && m != Tishrei),
        }
    }

    /// Boundary shape for the span emitted on `facts.date`.
    pub fn shape(self, facts: &DayFacts) -> Shape {
        use HolidayId::*;
        match self {
            AlefSlichos | ErevRoshHashana | ErevYomKippur | ErevSukkos | ErevPesach
            | ErevShavuos | ErevTishaBav => Shape::HavdalahCandle,
            TzomGedalia | AsaraBTeves | TaanisEsther | ShivaAsarBTammuz | ShloshEsreiMidos => {
                Shape::AlosHavdalah
            }
            YomKippur | TishaBav | TishaBavNidche => Shape::CandleHavdalah,
            BedikasChametz => Shape::CandleDawn,
            RoshHashana(1) | Sukkos(1) | Pesach(1) | Shavuos(1) | SheminiAtzeres
            | ShviiShelPesach => Shape::CandleHavdalah,
            SimchasTorah if facts.israel => Shape::CandleHavdalah,
            RoshHashanaAll | SukkosAll | PesachAll | ShavuosAll => {
                if self.first_day_of_run(facts) {
                    Shape::CandleHavdalah
                } else {
                    Shape::HavdalahHavdalah
                }
            }
            _ => Shape::HavdalahHavdalah,
        }
    }

    fn first_day_of_run(self, facts: &DayFacts) -> bool {
        use HebrewMonth::*;
        let h = facts.hebrew;
        match self {
            HolidayId::RoshHashanaAll => h.is(Tishrei, 1),
            HolidayId::SukkosAll => h.is(Tishrei, 15),
            HolidayId::PesachAll => h.is(Nissan, 15),
            HolidayId::ShavuosAll => h.is(Sivan, 6),
            _ => false,
        }
    }

    pub fn is_yomtov(self) -> bool {
        use HolidayId::*;
        matches!(
            self,
            RoshHashana(_)
                | RoshHashanaAll
                | YomKippur
                | Sukkos(_)
                | SukkosAll
                | SheminiAtzeres
                | SimchasTorah
                | Pesach(_)
                | PesachAll
                | ShviiShelPesach
                | AchronShelPesach
                | Shavuos(_)
                | ShavuosAll
        )
    }

    pub fn is_fast(self) -> bool {
        use HolidayId::*;
        matches!(
            self,
            TzomGedalia
                | YomKippur
                | AsaraBTeves
                | TaanisEsther
                | ShivaAsarBTammuz
                | TishaBav
                | TishaBavNidche
        )
    }

    /// "All days" spans that repeat the per-day spans of a festival.
    pub fn is_aggregate(self) -> bool {
        use HolidayId::*;
        matches!(
            self,
            RoshHashanaAll
                | SukkosAll
                | CholHamoedSukkosAll
                | ChanukahAll
                | PesachAll
                | CholHamoedPesachAll
                | ShavuosAll
        )
    }

    pub fn is_chol_hamoed(self) -> bool {
        use HolidayId::*;
        matches!(
            self,
            CholHamoedSukkos(_) | CholHamoedSukkosAll | CholHamoedPesach(_) | CholHamoedPesachAll
        )
    }

    pub fn is_erev(self) -> bool {
        use HolidayId::*;
        matches!(
            self,
            ErevRoshHashana
                | ErevYomKippur
                | ErevSukkos
                | ErevChanukah
                | ErevPesach
                | ErevShavuos
                | ErevTishaBav
        )
    }

    /// Identities that annotate a day rather than name it; they may share
    /// a date with another identity.
    pub fn is_overlay(self) -> bool {
        use HolidayId::*;
        matches!(
            self,
            AlefSlichos
                | ShloshEsreiMidos
                | ZosChanukah
                | PurimMeshulashMegillah
                | PurimMeshulashShabbos
                | PurimMeshulashSeudah
                | BedikasChametz
                | RoshChodesh
        )
    }

    /// Stable slug; the display text table lives with the host.
    pub fn label(self) -> String {
        use HolidayId::*;
        match self {
            AlefSlichos => "alef_selichos".into(),
            ErevRoshHashana => "erev_rosh_hashana".into(),
            RoshHashana(n) => format!("rosh_hashana_{}", n),
            RoshHashanaAll => "rosh_hashana_1_2".into(),
            TzomGedalia => "tzom_gedalia".into(),
            ShloshEsreiMidos => "shlosh_asrei_midos".into(),
            ErevYomKippur => "erev_yom_kippur".into(),
            YomKippur => "yom_kippur".into(),
            ErevSukkos => "erev_sukkos".into(),
            Sukkos(n) => format!("sukkos_{}", n),
            SukkosAll => "sukkos_1_2".into(),
            CholHamoedSukkos(n) => format!("chol_hamoed_sukkos_{}", n),
            CholHamoedSukkosAll => "chol_hamoed_sukkos".into(),
            HoshanaRabbah => "hoshanah_rabbah".into(),
            SheminiAtzeres => "shemini_atzeres".into(),
            SimchasTorah => "simchas_torah".into(),
            IsruChagSukkos => "isru_chag_sukkos".into(),
            ErevChanukah => "erev_chanukah".into(),
            Chanukah(n) => format!("chanukah_{}", n),
            ChanukahAll => "chanukah".into(),
            ZosChanukah => "zos_chanukah".into(),
            AsaraBTeves => "tzom_asura_beteves".into(),
            TuBShvat => "tu_bishvat".into(),
            TaanisEsther => "taanis_esther".into(),
            Purim => "purim".into(),
            ShushanPurim => "shushan_purim".into(),
            PurimMeshulashMegillah => "purim_meshulash_megillah".into(),
            PurimMeshulashShabbos => "purim_meshulash_al_hanissim".into(),
            PurimMeshulashSeudah => "purim_meshulash_seudah".into(),
            BedikasChametz => "leil_bedikas_chumetz".into(),
            ErevPesach => "erev_pesach".into(),
            Pesach(n) => format!("pesach_{}", n),
            PesachAll => "pesach_1_2".into(),
            CholHamoedPesach(n) => format!("chol_hamoed_pesach_{}", n),
            CholHamoedPesachAll => "chol_hamoed_pesach".into(),
            ShviiShelPesach => "shviei_shel_pesach".into(),
            AchronShelPesach => "achron_shel_pesach".into(),
            IsruChagPesach => "isru_chag_pesach".into(),
            PesachSheni => "pesach_sheni".into(),
            LagBaomer => "lag_baomer".into(),
            ErevShavuos => "erev_shavuos".into(),
            Shavuos(n) => format!("shavuos_{}", n),
            ShavuosAll => "shavuos_1_2".into(),
            IsruChagShavuos => "isru_chag_shavuos".into(),
            ShivaAsarBTammuz => "shiva_usor_btammuz".into(),
            ErevTishaBav => "erev_tisha_bav".into(),
            TishaBav => "tisha_bav".into(),
            TishaBavNidche => "tisha_bav_nidche".into(),
            RoshChodesh => "rosh_chodesh".into(),
        }
    }
}

/// A holiday's active interval on one civil date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidaySpan {
    pub holiday_id: HolidayId,
    pub label: String,
    /// Civil date whose daytime the span belongs to
    pub date: NaiveDate,
    pub start: Instant,
    pub end: Instant,
    pub is_yomtov: bool,
    pub is_fast: bool,
}

impl HolidaySpan {
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

/// Sun events for a date and for the civil date before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySun {
    pub eve: SunEvents,
    pub day: SunEvents,
}

impl DaySun {
    fn bounds(&self, shape: Shape, config: &CalendarConfig) -> (Instant, Instant) {
        let candle = config.candle_offset();
        let havdalah = config.havdalah_offset();
        match shape {
            Shape::CandleHavdalah => (self.eve.sunset - candle, self.day.sunset + havdalah),
            Shape::HavdalahHavdalah => (self.eve.sunset + havdalah, self.day.sunset + havdalah),
            Shape::HavdalahCandle => (self.eve.sunset + havdalah, self.day.sunset - candle),
            Shape::AlosHavdalah => (self.day.dawn, self.day.sunset + havdalah),
            Shape::CandleDawn => (self.eve.sunset - candle, self.day.dawn),
        }
    }
}

/// Identities whose rule matches `facts`, in table order.
pub fn matching_rules(facts: &DayFacts) -> Vec<HolidayId> {
    HolidayId::all()
        .into_iter()
        .filter(|id| id.occurs_on(facts))
        .collect()
}

/// Maps a civil date to the holiday spans active on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HolidayRuleEngine;

impl HolidayRuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Spans for `date`, ordered by start and then table order.
    pub fn spans_for(
        &self,
        date: NaiveDate,
        hebrew: &HebrewDate,
        weekday: Weekday,
        sun: &DaySun,
        config: &CalendarConfig,
    ) -> Vec<HolidaySpan> {
        let facts = DayFacts {
            date,
            hebrew: *hebrew,
            weekday,
            israel: config.israel,
        };

        let mut spans: Vec<HolidaySpan> = matching_rules(&facts)
            .into_iter()
            .filter_map(|id| {
                let (start, end) = sun.bounds(id.shape(&facts), config);
                if start >= end {
                    log::warn!("{} on {} has an empty span, skipping", id.label(), date);
                    return None;
                }
                Some(HolidaySpan {
                    holiday_id: id,
                    label: id.label(),
                    date,
                    start,
                    end,
                    is_yomtov: id.is_yomtov(),
                    is_fast: id.is_fast(),
                })
            })
            .collect();
        // Stable sort keeps table order among equal starts.
        spans.sort_by_key(|s| s.start);
        spans
    }
}
