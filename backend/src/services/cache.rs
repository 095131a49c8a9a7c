//! Per-day input cache.
//!
//! Stores the resolved Hebrew date and sun events of each civil date, keyed
//! by date, location and configuration fingerprint. Entries are immutable
//! once inserted; a location or offset change clears the whole cache.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::CalendarResult;
use crate::models::location::Location;
use crate::services::composer::DayInfo;

/// A resolved day, or the error that degraded it.
pub type DayRecord = CalendarResult<DayInfo>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub date: NaiveDate,
    pub location: Location,
    pub fingerprint: String,
}

/// In-memory day cache.
#[derive(Clone, Default)]
pub struct DayCache {
    entries: Arc<RwLock<HashMap<CacheKey, Arc<DayRecord>>>>,
}

impl DayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<DayRecord>> {
        self.entries.read().get(key).cloned()
    }

    /// Return the cached record, computing and inserting it on a miss.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Arc<DayRecord>
    where
        F: FnOnce() -> DayRecord,
    {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let record = Arc::new(compute());
        // A racing writer may have filled the slot; keep whichever landed first.
        Arc::clone(self.entries.write().entry(key).or_insert(record))
    }

    /// Drop every entry.
    pub fn invalidate(&self) {
        let mut entries = self.entries.write();
        log::debug!("invalidating {} cached days", entries.len());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalendarError;
    use crate::models::hebrew::{ArithmeticCalendar, HebrewCalendar};
    use crate::models::sun::{SolarCalculator, SunEventsProvider};
    use std::cell::Cell;

    fn key(day: u32, fingerprint: &str) -> CacheKey {
        CacheKey {
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            location: Location::new(31.778, 35.2354, 0.0, chrono_tz::Asia::Jerusalem),
            fingerprint: fingerprint.to_string(),
        }
    }

    fn resolve(key: &CacheKey) -> DayRecord {
        let hebrew = ArithmeticCalendar::default().hebrew_date(key.date)?;
        let sun = SolarCalculator::new().sun_events(key.date, &key.location)?;
        Ok(DayInfo {
            date: key.date,
            hebrew,
            sun,
        })
    }

    #[test]
    fn test_second_lookup_is_a_hit() {
        let cache = DayCache::new();
        let calls = Cell::new(0);
        let k = key(20, "a");
        for _ in 0..3 {
            let record = cache.get_or_compute(k.clone(), || {
                calls.set(calls.get() + 1);
                resolve(&k)
            });
            assert!(record.is_ok());
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fingerprint_is_part_of_the_key() {
        let cache = DayCache::new();
        cache.get_or_compute(key(20, "a"), || resolve(&key(20, "a")));
        cache.get_or_compute(key(20, "b"), || resolve(&key(20, "b")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_errors_are_cached_too() {
        let cache = DayCache::new();
        let k = key(21, "a");
        let date = k.date;
        cache.get_or_compute(k.clone(), || Err(CalendarError::date_range(date, "outside era")));
        let record = cache.get(&k).unwrap();
        assert!(matches!(*record, Err(CalendarError::DateRangeError { .. })));
    }

    #[test]
    fn test_invalidate_clears_everything() {
        let cache = DayCache::new();
        cache.get_or_compute(key(20, "a"), || resolve(&key(20, "a")));
        cache.get_or_compute(key(22, "a"), || resolve(&key(22, "a")));
        cache.invalidate();
        assert!(cache.is_empty());
    }
}
