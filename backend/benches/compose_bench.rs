use std::hint::black_box;

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use yidcal_rust::models::config::CalendarConfig;
use yidcal_rust::models::config::EngineSettings;
use yidcal_rust::models::hebrew::{ArithmeticCalendar, HebrewCalendar};
use yidcal_rust::models::location::Location;
use yidcal_rust::models::sun::{SolarCalculator, SunEventsProvider};
use yidcal_rust::services::composer::{DayInfo, WindowComposer};
use yidcal_rust::services::holidays::{DaySun, HolidayRuleEngine, HolidaySpan};
use yidcal_rust::Pipeline;

fn jerusalem() -> Location {
    Location::new(31.778, 35.2354, 754.0, chrono_tz::Asia::Jerusalem)
}

fn resolve(first: NaiveDate, days: i64) -> Vec<DayInfo> {
    let calendar = ArithmeticCalendar::default();
    let sun = SolarCalculator::new();
    (0..days)
        .map(|i| {
            let date = first + Duration::days(i);
            DayInfo {
                date,
                hebrew: calendar.hebrew_date(date).unwrap(),
                sun: sun.sun_events(date, &jerusalem()).unwrap(),
            }
        })
        .collect()
}

fn spans(days: &[DayInfo], config: &CalendarConfig) -> Vec<HolidaySpan> {
    let rules = HolidayRuleEngine::new();
    days.windows(2)
        .flat_map(|pair| {
            let sun = DaySun {
                eve: pair[0].sun,
                day: pair[1].sun,
            };
            rules.spans_for(pair[1].date, &pair[1].hebrew, pair[1].date.weekday(), &sun, config)
        })
        .collect()
}

fn bench_sun_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("inputs");
    let date = NaiveDate::from_ymd_opt(2025, 9, 22).unwrap();

    group.bench_function("sun_events", |b| {
        let sun = SolarCalculator::new();
        b.iter(|| sun.sun_events(black_box(date), black_box(&jerusalem())));
    });
    group.bench_function("hebrew_date", |b| {
        let calendar = ArithmeticCalendar::default();
        b.iter(|| calendar.hebrew_date(black_box(date)));
    });

    group.finish();
}

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    let config = CalendarConfig::default();
    let composer = WindowComposer::new(config.clone(), chrono_tz::Asia::Jerusalem);

    // Elul through Cheshvan is the densest stretch of the year.
    let first = NaiveDate::from_ymd_opt(2025, 8, 20).unwrap();
    for days in [36i64, 90] {
        let table = resolve(first, days);
        let spans = spans(&table, &config);
        group.bench_with_input(BenchmarkId::new("tishrei", days), &days, |b, _| {
            b.iter(|| composer.compose(black_box(&spans), black_box(&table), &[]));
        });
    }

    group.finish();
}

fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute");
    let settings = EngineSettings::new(jerusalem(), CalendarConfig::default()).unwrap();
    let pipeline = Pipeline::new(settings).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 9, 22, 15, 0, 0).unwrap();
    pipeline.recompute(now);

    group.bench_function("warm_cache", |b| {
        b.iter(|| pipeline.recompute(black_box(now)));
    });
    group.bench_function("cold_cache", |b| {
        b.iter(|| {
            pipeline.cache().invalidate();
            pipeline.recompute(black_box(now))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sun_events, bench_compose, bench_recompute);
criterion_main!(benches);
