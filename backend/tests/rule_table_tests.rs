//! Sweeps of the holiday rule table over whole Hebrew years.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use yidcal_rust::models::hebrew::{ArithmeticCalendar, HebrewCalendar};
use yidcal_rust::services::holidays::{DayFacts, HolidayId};

/// 5770 through 5789, a little over one 19-year cycle.
fn sweep() -> impl Iterator<Item = (NaiveDate, yidcal_rust::models::hebrew::HebrewDate)> {
    let calendar = ArithmeticCalendar::default();
    let first = NaiveDate::from_ymd_opt(2009, 9, 19).unwrap();
    let last = NaiveDate::from_ymd_opt(2029, 9, 9).unwrap();
    first
        .iter_days()
        .take_while(move |d| *d <= last)
        .map(move |d| (d, calendar.hebrew_date(d).unwrap()))
}

fn facts(date: NaiveDate, hebrew: yidcal_rust::models::hebrew::HebrewDate, israel: bool) -> DayFacts {
    DayFacts {
        date,
        hebrew,
        weekday: date.weekday(),
        israel,
    }
}

fn primary(facts: &DayFacts) -> Vec<HolidayId> {
    HolidayId::all()
        .into_iter()
        .filter(|id| !id.is_overlay() && !id.is_aggregate())
        .filter(|id| id.occurs_on(facts))
        .collect()
}

#[test]
fn test_at_most_one_primary_identity_per_date() {
    for (date, hebrew) in sweep() {
        for israel in [false, true] {
            let ids = primary(&facts(date, hebrew, israel));
            let allowed_pair = israel
                && ids == vec![HolidayId::SheminiAtzeres, HolidayId::SimchasTorah];
            assert!(
                ids.len() <= 1 || allowed_pair,
                "{} ({}, israel={}): {:?}",
                date,
                hebrew,
                israel,
                ids
            );
        }
    }
}

#[test]
fn test_every_identity_occurs_within_a_cycle() {
    let mut seen: BTreeSet<HolidayId> = BTreeSet::new();
    for (date, hebrew) in sweep() {
        for israel in [false, true] {
            let facts = facts(date, hebrew, israel);
            seen.extend(HolidayId::all().into_iter().filter(|id| id.occurs_on(&facts)));
        }
    }
    let missing: Vec<HolidayId> = HolidayId::all()
        .into_iter()
        .filter(|id| !seen.contains(id))
        .collect();
    assert!(missing.is_empty(), "never observed: {:?}", missing);
}

#[test]
fn test_fasts_never_land_on_shabbos_except_yom_kippur() {
    for (date, hebrew) in sweep() {
        let facts = facts(date, hebrew, false);
        if facts.weekday != chrono::Weekday::Sat {
            continue;
        }
        for id in primary(&facts) {
            if id.is_fast() {
                assert_eq!(id, HolidayId::YomKippur, "{} on Shabbos {}", id.label(), date);
            }
        }
    }
}

#[test]
fn test_israel_drops_second_days() {
    for (date, hebrew) in sweep() {
        let facts = facts(date, hebrew, true);
        for id in [
            HolidayId::Sukkos(2),
            HolidayId::Pesach(2),
            HolidayId::Shavuos(2),
            HolidayId::AchronShelPesach,
        ] {
            assert!(!id.occurs_on(&facts), "{:?} in Israel on {}", id, date);
        }
    }
}
