#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};

use yidcal_rust::models::config::{CalendarConfig, EngineSettings};
use yidcal_rust::models::hebrew::ArithmeticCalendar;
use yidcal_rust::models::location::Location;
use yidcal_rust::models::sun::{SunEvents, SunEventsProvider};
use yidcal_rust::models::time::Instant;
use yidcal_rust::{CalendarError, CalendarResult, Pipeline};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the previous values on unwind and serializes access to the
/// process environment across parallel tests.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

/// Sunrise at 06:00 and sunset at 18:00 UTC every day, so dawn is 04:48 and
/// nightfall 19:12. Dates in `failing` report a solar error.
#[derive(Debug, Default)]
pub struct FixedSun {
    pub failing: BTreeSet<NaiveDate>,
    pub calls: Mutex<usize>,
}

impl FixedSun {
    pub fn failing_on(dates: &[NaiveDate]) -> Self {
        Self {
            failing: dates.iter().copied().collect(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl SunEventsProvider for FixedSun {
    fn sun_events(&self, date: NaiveDate, _location: &Location) -> CalendarResult<SunEvents> {
        *self.calls.lock().unwrap() += 1;
        if self.failing.contains(&date) {
            return Err(CalendarError::solar_event(date, "polar night"));
        }
        let sunrise = at(date, 6, 0);
        Ok(SunEvents::from_solar(
            date,
            sunrise,
            at(date, 18, 0),
            sunrise + Duration::days(1),
        ))
    }
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(date: NaiveDate, h: u32, m: u32) -> Instant {
    Utc.with_ymd_and_hms(date.year(), date.month(), date.day(), h, m, 0)
        .unwrap()
}

/// Jerusalem coordinates on UTC wall-clock time.
pub fn settings(config: CalendarConfig) -> EngineSettings {
    EngineSettings::new(
        Location::new(31.778, 35.2354, 0.0, chrono_tz::UTC),
        config,
    )
    .unwrap()
}

pub fn diaspora() -> CalendarConfig {
    CalendarConfig::default()
}

pub fn israel() -> CalendarConfig {
    CalendarConfig {
        israel: true,
        ..Default::default()
    }
}

pub fn fixed_pipeline(config: CalendarConfig) -> Pipeline {
    pipeline_with_sun(config, Arc::new(FixedSun::default()))
}

pub fn pipeline_with_sun(config: CalendarConfig, sun: Arc<FixedSun>) -> Pipeline {
    Pipeline::with_providers(settings(config), Arc::new(ArithmeticCalendar::default()), sun)
        .unwrap()
}

pub const CONFIG_TOML: &str = r#"
[location]
latitude = 31.778
longitude = 35.2354
timezone = "Asia/Jerusalem"

[calendar]
candlelighting_offset_min = 40
israel = true
lookahead_days = 3
"#;
