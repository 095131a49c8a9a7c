//! State projection.
//!
//! Evaluates a [`Composition`] at one instant. Every indicator is a pure
//! function of the windows and `now`; the projection also reports the
//! earliest future instant at which any of them could change, so a host never
//! needs to poll.

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde_json::Value;

use crate::api::{
    Indicator, IndicatorValue, Projection, ATTR_NOW, ATTR_REASON, ATTR_WINDOW_END,
    ATTR_WINDOW_START,
};
use crate::models::config::CalendarConfig;
use crate::models::time::{
    ceil_minute, format_local, format_simple, local_date, local_midnight, round_half_up_minute,
    Instant,
};
use crate::services::composer::{Composition, MotziHoliday, Transition, Window, WindowKind};
use crate::services::holidays::HolidayId;
use crate::services::observances::Observance;

/// Upcoming labels shown before collapsing into `(+N)`.
const UPCOMING_LABEL_CAP: usize = 6;

pub const DAY_TYPE: &str = "day_type";
pub const HOLIDAY: &str = "holiday";
pub const UPCOMING_HOLIDAY: &str = "upcoming_holiday";
pub const SLICHOS_LABEL: &str = "slichos_label";
pub const FAST_ENDS_IN: &str = "fast_ends_in";

#[derive(Debug, Clone)]
pub struct StateProjector {
    config: CalendarConfig,
    tz: Tz,
}

impl StateProjector {
    pub fn new(config: CalendarConfig, tz: Tz) -> Self {
        Self { config, tz }
    }

    /// Indicator kinds reported as plain booleans.
    fn boolean_kinds() -> Vec<WindowKind> {
        let mut kinds = vec![
            WindowKind::NoMelucha,
            WindowKind::NoMeluchaShabbos,
            WindowKind::NoMeluchaYomTov,
            WindowKind::Erev,
            WindowKind::Motzi,
            WindowKind::ThreeDayYomTov,
            WindowKind::Slichos,
        ];
        kinds.extend(HolidayId::all().into_iter().map(WindowKind::Holiday));
        kinds.extend(MotziHoliday::ALL.into_iter().map(WindowKind::MotziHoliday));
        kinds.extend(Transition::ALL.into_iter().map(WindowKind::Transition));
        kinds.extend(Observance::ALL.into_iter().map(WindowKind::Observance));
        kinds
    }

    pub fn project(&self, composition: &Composition, now: Instant) -> Projection {
        let mut indicators = Vec::new();

        for kind in Self::boolean_kinds() {
            indicators.push(self.boolean(composition, kind, now));
        }
        indicators.push(self.upcoming(composition, now));

        if let Some(day_type) = active(composition, now, |k| matches!(k, WindowKind::DayType(_))) {
            indicators.push(self.label(DAY_TYPE, day_type.name(), Some(day_type), now));
        }
        indicators.push(self.label(HOLIDAY, holiday_label(composition, now), None, now));
        if let Some(slichos) = active(composition, now, |k| matches!(k, WindowKind::SlichosDay(_))) {
            indicators.push(self.label(SLICHOS_LABEL, slichos.name(), Some(slichos), now));
        }

        indicators.extend(self.fast_countdown(composition, now));
        indicators.extend(self.zmanim(composition, now));

        Projection {
            now,
            indicators,
            next_transition: self.next_transition(composition, now),
        }
    }

    fn stamp(&self, indicator: Indicator, window: Option<&Window>, now: Instant) -> Indicator {
        let mut indicator = indicator.with_attribute(ATTR_NOW, format_local(now, self.tz));
        if let Some(w) = window {
            indicator = indicator
                .with_attribute(
                    ATTR_WINDOW_START,
                    format_local(round_half_up_minute(w.start), self.tz),
                )
                .with_attribute(ATTR_WINDOW_END, format_local(ceil_minute(w.end), self.tz));
        }
        indicator
    }

    fn boolean(&self, composition: &Composition, kind: WindowKind, now: Instant) -> Indicator {
        let current = composition.windows_of(kind).find(|w| w.contains(now));
        let shown = current.or_else(|| composition.windows_of(kind).find(|w| w.start > now));

        let mut indicator = self.stamp(
            Indicator::new(kind.name(), IndicatorValue::Boolean { on: current.is_some() }),
            shown,
            now,
        );
        if let Some(w) = current {
            for (key, value) in &w.attributes {
                indicator = indicator.with_attribute(key, render(value));
            }
            if let Some(Value::String(class)) = w.attributes.get("class") {
                indicator = indicator.with_attribute(ATTR_REASON, class.clone());
            } else if let WindowKind::Holiday(id) = kind {
                indicator = indicator.with_attribute(ATTR_REASON, id.label());
            }
        }
        indicator
    }

    fn upcoming(&self, composition: &Composition, now: Instant) -> Indicator {
        let mut current: Vec<&Window> = composition
            .windows
            .iter()
            .filter(|w| matches!(w.kind, WindowKind::Upcoming(_)) && w.contains(now))
            .collect();
        current.sort_by_key(|w| (w.end, w.kind));

        let mut indicator = Indicator::new(
            UPCOMING_HOLIDAY,
            IndicatorValue::Boolean {
                on: !current.is_empty(),
            },
        )
        .with_attribute(ATTR_NOW, format_local(now, self.tz))
        .with_attribute("lookahead_days", self.config.lookahead_days.to_string());

        if let (Some(first_start), Some(first_end)) = (
            current.iter().map(|w| w.start).min(),
            current.iter().map(|w| w.end).min(),
        ) {
            let labels: Vec<String> = current
                .iter()
                .filter_map(|w| match w.kind {
                    WindowKind::Upcoming(id) => Some(id.label()),
                    _ => None,
                })
                .collect();
            indicator = indicator
                .with_attribute(
                    ATTR_WINDOW_START,
                    format_local(round_half_up_minute(first_start), self.tz),
                )
                .with_attribute(ATTR_WINDOW_END, format_local(ceil_minute(first_end), self.tz))
                .with_attribute(ATTR_REASON, join_capped(&labels, UPCOMING_LABEL_CAP));
        }
        indicator
    }

    fn label(&self, name: &str, key: String, window: Option<&Window>, now: Instant) -> Indicator {
        self.stamp(
            Indicator::new(name, IndicatorValue::Label { key }),
            window,
            now,
        )
    }

    /// `HH:MM` until the fast ends: the full length before it starts, the
    /// remainder once running. Absent unless a fast is running or starts today.
    fn fast_countdown(&self, composition: &Composition, now: Instant) -> Option<Indicator> {
        let fast = self.counted_fast(composition, now)?;

        let remaining = if now < fast.start {
            fast.end - fast.start
        } else {
            fast.end - now
        };
        let total_minutes = remaining.num_minutes();
        let key = format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60);
        Some(
            self.stamp(
                Indicator::new(FAST_ENDS_IN, IndicatorValue::Label { key }),
                Some(fast),
                now,
            )
            .with_attribute(ATTR_REASON, fast.name()),
        )
    }

    fn counted_fast<'a>(&self, composition: &'a Composition, now: Instant) -> Option<&'a Window> {
        let today = local_date(now, self.tz);
        composition.windows.iter().find(|w| match w.kind {
            WindowKind::Holiday(id) if id.is_fast() => {
                now < w.end && (w.start <= now || local_date(w.start, self.tz) == today)
            }
            _ => false,
        })
    }

    /// Civil date whose sunset closes the current halachic day. It advances
    /// to tomorrow at candle lighting.
    fn halachic_date(&self, composition: &Composition, now: Instant) -> Option<NaiveDate> {
        let civil = local_date(now, self.tz);
        let day = composition.day(civil)?;
        if now >= day.sun.candle_lighting(&self.config) {
            civil.succ_opt()
        } else {
            Some(civil)
        }
    }

    fn zmanim(&self, composition: &Composition, now: Instant) -> Vec<Indicator> {
        let Some(day) = composition.day(local_date(now, self.tz)) else {
            return Vec::new();
        };
        let evening = self
            .halachic_date(composition, now)
            .and_then(|d| composition.day(d))
            .unwrap_or(day);
        let mut named = day.sun.named(&self.config);
        named.push(("candle_lighting", evening.sun.candle_lighting(&self.config)));
        named.push(("havdalah", evening.sun.havdalah(&self.config)));

        named
            .into_iter()
            .map(|(name, at)| {
                let simple = format_simple(at, self.tz, self.config.time_display);
                Indicator::new(format!("zman_{}", name), IndicatorValue::Timestamp { at, simple })
                    .with_attribute(ATTR_NOW, format_local(now, self.tz))
            })
            .collect()
    }

    fn next_transition(&self, composition: &Composition, now: Instant) -> Instant {
        let tomorrow = local_date(now, self.tz) + Duration::days(1);
        let mut next = local_midnight(tomorrow, self.tz);
        if next <= now {
            next = now + Duration::days(1);
        }

        let candle = composition
            .day(local_date(now, self.tz))
            .map(|d| d.sun.candle_lighting(&self.config));
        if let Some(edge) = candle.filter(|&c| c > now && c < next) {
            next = edge;
        }

        for w in &composition.windows {
            for edge in [w.start, w.end] {
                if edge > now && edge < next {
                    next = edge;
                }
            }
        }
        // A running countdown drops a minute one second past each whole
        // minute left.
        if let Some(fast) = self
            .counted_fast(composition, now)
            .filter(|w| w.start <= now)
        {
            let left = (fast.end - now).num_minutes();
            let tick = fast.end - Duration::minutes(left) + Duration::seconds(1);
            next = next.min(tick);
        }
        next
    }
}

fn active(
    composition: &Composition,
    now: Instant,
    pick: impl Fn(&WindowKind) -> bool,
) -> Option<&Window> {
    composition
        .windows
        .iter()
        .find(|w| pick(&w.kind) && w.contains(now))
}

/// One active span by priority: Zos Chanukah, then a holiday Motzi, then
/// Isru Chag, then table order.
fn holiday_label(composition: &Composition, now: Instant) -> String {
    let mut current: Vec<HolidayId> = composition
        .windows
        .iter()
        .filter(|w| w.contains(now))
        .filter_map(|w| match w.kind {
            WindowKind::Holiday(id) if !id.is_aggregate() => Some(id),
            _ => None,
        })
        .collect();
    current.sort();

    if current.contains(&HolidayId::ZosChanukah) {
        return HolidayId::ZosChanukah.label();
    }
    if let Some(motzi) = active(composition, now, |k| matches!(k, WindowKind::MotziHoliday(_))) {
        return motzi.name();
    }
    let isru = [
        HolidayId::IsruChagSukkos,
        HolidayId::IsruChagPesach,
        HolidayId::IsruChagShavuos,
    ];
    if let Some(id) = current.iter().find(|id| isru.contains(id)) {
        return id.label();
    }
    current.first().map(|id| id.label()).unwrap_or_default()
}

fn join_capped(labels: &[String], cap: usize) -> String {
    if labels.len() <= cap {
        return labels.join(", ");
    }
    format!("{} (+{})", labels[..cap].join(", "), labels.len() - cap)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_capped() {
        let labels: Vec<String> = (1..=8).map(|i| format!("h{}", i)).collect();
        assert_eq!(join_capped(&labels[..2], 6), "h1, h2");
        assert_eq!(join_capped(&labels, 6), "h1, h2, h3, h4, h5, h6 (+2)");
    }

    #[test]
    fn test_render_unquotes_strings() {
        assert_eq!(render(&Value::from("pure_shabbos")), "pure_shabbos");
        assert_eq!(render(&Value::from(true)), "true");
    }
}
