//! Sliding-window driver.
//!
//! One recompute captures the settings by value, resolves every day in
//! `[today - HISTORY_DAYS, today + lookahead + LOOKAHEAD_MARGIN_DAYS]` through
//! the cache, runs the rule engine per day, composes and projects. A day whose
//! Hebrew date or sun events cannot be resolved contributes nothing; its
//! neighbours are unaffected.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use parking_lot::RwLock;

use crate::api::Projection;
use crate::error::CalendarResult;
use crate::models::config::EngineSettings;
use crate::models::hebrew::{ArithmeticCalendar, HebrewCalendar};
use crate::models::sun::{SolarCalculator, SunEventsProvider};
use crate::models::time::{local_date, Instant};
use crate::services::cache::{CacheKey, DayCache, DayRecord};
use crate::services::composer::{Composition, DayInfo, WindowComposer};
use crate::services::holidays::{DaySun, HolidayRuleEngine, HolidaySpan};
use crate::services::observances;
use crate::services::projector::StateProjector;

/// Days resolved before today. Covers the whole Slichos season and the
/// longest festival run.
pub const HISTORY_DAYS: i64 = 30;
/// Days resolved past the lookahead horizon.
pub const LOOKAHEAD_MARGIN_DAYS: i64 = 3;

pub struct Pipeline {
    settings: RwLock<EngineSettings>,
    calendar: Arc<dyn HebrewCalendar>,
    sun: Arc<dyn SunEventsProvider>,
    rules: HolidayRuleEngine,
    cache: DayCache,
}

impl Pipeline {
    /// Pipeline with the arithmetic calendar and the NOAA solar model.
    pub fn new(settings: EngineSettings) -> CalendarResult<Self> {
        Self::with_providers(
            settings,
            Arc::new(ArithmeticCalendar::default()),
            Arc::new(SolarCalculator::new()),
        )
    }

    pub fn with_providers(
        settings: EngineSettings,
        calendar: Arc<dyn HebrewCalendar>,
        sun: Arc<dyn SunEventsProvider>,
    ) -> CalendarResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings: RwLock::new(settings),
            calendar,
            sun,
            rules: HolidayRuleEngine::new(),
            cache: DayCache::new(),
        })
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings.read().clone()
    }

    /// Replace the settings. A real change clears the cache.
    pub fn update_settings(&self, settings: EngineSettings) -> CalendarResult<()> {
        settings.validate()?;
        let mut current = self.settings.write();
        if *current != settings {
            *current = settings;
            self.cache.invalidate();
        }
        Ok(())
    }

    pub fn cache(&self) -> &DayCache {
        &self.cache
    }

    fn resolve_day(&self, date: NaiveDate, settings: &EngineSettings, fingerprint: &str) -> Arc<DayRecord> {
        let key = CacheKey {
            date,
            location: settings.location,
            fingerprint: fingerprint.to_string(),
        };
        self.cache.get_or_compute(key, || {
            let record = self
                .calendar
                .hebrew_date(date)
                .and_then(|hebrew| {
                    let sun = self.sun.sun_events(date, &settings.location)?;
                    Ok(DayInfo { date, hebrew, sun })
                });
            if let Err(e) = &record {
                log::warn!("degrading {}: {}", date, e);
            }
            record
        })
    }

    fn resolved(&self, date: NaiveDate, settings: &EngineSettings, fingerprint: &str) -> Option<DayInfo> {
        match &*self.resolve_day(date, settings, fingerprint) {
            Ok(day) => Some(*day),
            Err(_) => None,
        }
    }

    /// Rule-engine output for every resolvable day of `days`.
    pub fn spans(&self, days: &[DayInfo], settings: &EngineSettings) -> Vec<HolidaySpan> {
        let by_date: BTreeMap<NaiveDate, &DayInfo> = days.iter().map(|d| (d.date, d)).collect();
        let mut spans = Vec::new();
        for day in days {
            let Some(eve) = day.date.pred_opt().and_then(|d| by_date.get(&d)) else {
                log::debug!("no eve resolved for {}, skipping its spans", day.date);
                continue;
            };
            let sun = DaySun {
                eve: eve.sun,
                day: day.sun,
            };
            spans.extend(self.rules.spans_for(
                day.date,
                &day.hebrew,
                day.date.weekday(),
                &sun,
                &settings.calendar,
            ));
        }
        spans
    }

    /// Compose the sliding range around `now`.
    pub fn compose(&self, now: Instant) -> Composition {
        let settings = self.settings();
        self.compose_with(&settings, now)
    }

    fn compose_with(&self, settings: &EngineSettings, now: Instant) -> Composition {
        let fingerprint = settings.fingerprint();
        let today = local_date(now, settings.location.timezone);
        let first = today - Duration::days(HISTORY_DAYS);
        let last = today
            + Duration::days(i64::from(settings.calendar.lookahead_days) + LOOKAHEAD_MARGIN_DAYS);

        let days: Vec<DayInfo> = first
            .iter_days()
            .take_while(|d| *d <= last)
            .filter_map(|d| self.resolved(d, settings, &fingerprint))
            .collect();

        let spans = self.spans(&days, settings);

        let years: BTreeSet<i32> = days.iter().map(|d| d.hebrew.year).collect();
        let anchors: Vec<DayInfo> = years
            .into_iter()
            .flat_map(observances::anchor_dates)
            .filter_map(|h| self.calendar.civil_date(&h).ok())
            .filter(|d| *d < first || *d > last)
            .filter_map(|d| self.resolved(d, settings, &fingerprint))
            .collect();

        WindowComposer::new(settings.calendar.clone(), settings.location.timezone)
            .compose(&spans, &days, &anchors)
    }

    /// Compose and project at `now`.
    pub fn recompute(&self, now: Instant) -> Projection {
        let settings = self.settings();
        let composition = self.compose_with(&settings, now);
        let projection = StateProjector::new(settings.calendar.clone(), settings.location.timezone)
            .project(&composition, now);
        log::debug!(
            "recomputed at {}: {} indicators, next transition {}",
            now,
            projection.indicators.len(),
            projection.next_transition
        );
        projection
    }
}
