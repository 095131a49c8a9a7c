//! Solar events and the zmanim derived from them.
//!
//! Sunrise and sunset use the NOAA formulation of the Meeus equations with
//! the standard -0.833° apparent horizon, lowered by the dip of the horizon
//! for the observer's elevation. Dawn and nightfall are the fixed 72-minute
//! offsets; the remaining prayer times use proportional hours.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, CalendarResult};
use crate::models::config::CalendarConfig;
use crate::models::location::Location;
use crate::models::time::{minutes, Instant};

/// Minutes between dawn and sunrise, and between sunset and nightfall.
pub const ALOS_OFFSET_MIN: i64 = 72;

/// Named solar instants for one civil date at one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunEvents {
    pub date: NaiveDate,
    pub dawn: Instant,
    pub sunrise: Instant,
    pub midday: Instant,
    pub sunset: Instant,
    pub nightfall: Instant,
    pub sof_zman_shma_mga: Instant,
    pub sof_zman_shma_gra: Instant,
    pub sof_zman_tefilah_mga: Instant,
    pub sof_zman_tefilah_gra: Instant,
    pub mincha_gedola: Instant,
    pub mincha_ketana: Instant,
    pub plag_hamincha: Instant,
    pub chatzos_haleila: Instant,
}

fn proportional(start: Instant, end: Instant, hours: f64) -> Instant {
    let hour_ms = (end - start).num_milliseconds() as f64 / 12.0;
    start + Duration::milliseconds((hour_ms * hours).round() as i64)
}

impl SunEvents {
    /// Derive every named instant from sunrise, sunset and the next sunrise.
    pub fn from_solar(
        date: NaiveDate,
        sunrise: Instant,
        sunset: Instant,
        next_sunrise: Instant,
    ) -> Self {
        let dawn = sunrise - minutes(ALOS_OFFSET_MIN);
        let nightfall = sunset + minutes(ALOS_OFFSET_MIN);
        let next_dawn = next_sunrise - minutes(ALOS_OFFSET_MIN);
        Self {
            date,
            dawn,
            sunrise,
            midday: sunrise + (sunset - sunrise) / 2,
            sunset,
            nightfall,
            sof_zman_shma_mga: proportional(dawn, nightfall, 3.0),
            sof_zman_shma_gra: proportional(sunrise, sunset, 3.0),
            sof_zman_tefilah_mga: proportional(dawn, nightfall, 4.0),
            sof_zman_tefilah_gra: proportional(sunrise, sunset, 4.0),
            mincha_gedola: proportional(dawn, nightfall, 6.5),
            mincha_ketana: proportional(dawn, nightfall, 9.5),
            plag_hamincha: proportional(dawn, nightfall, 10.75),
            chatzos_haleila: nightfall + (next_dawn - nightfall) / 2,
        }
    }

    /// Earliest time for tallis and tefillin.
    pub fn misheyakir(&self, offset_min: i64) -> Instant {
        self.dawn + minutes(offset_min)
    }

    pub fn candle_lighting(&self, config: &CalendarConfig) -> Instant {
        self.sunset - minutes(config.candlelighting_offset_min)
    }

    pub fn havdalah(&self, config: &CalendarConfig) -> Instant {
        self.sunset + minutes(config.havdalah_offset_min)
    }

    /// Every instant paired with its indicator key, in chronological order.
    pub fn named(&self, config: &CalendarConfig) -> Vec<(&'static str, Instant)> {
        vec![
            ("alos", self.dawn),
            ("misheyakir", self.misheyakir(config.misheyakir_offset_min)),
            ("netz", self.sunrise),
            ("sof_zman_krias_shma_mga", self.sof_zman_shma_mga),
            ("sof_zman_krias_shma_gra", self.sof_zman_shma_gra),
            ("sof_zman_tefilah_mga", self.sof_zman_tefilah_mga),
            ("sof_zman_tefilah_gra", self.sof_zman_tefilah_gra),
            ("chatzos_hayom", self.midday),
            ("mincha_gedola", self.mincha_gedola),
            ("mincha_ketana", self.mincha_ketana),
            ("plag_hamincha", self.plag_hamincha),
            ("shkia", self.sunset),
            ("tzeis", self.nightfall),
            ("chatzos_haleila", self.chatzos_haleila),
        ]
    }
}

/// Source of [`SunEvents`]; a pure function of date and location.
pub trait SunEventsProvider: Send + Sync {
    fn sun_events(&self, date: NaiveDate, location: &Location) -> CalendarResult<SunEvents>;
}

/// NOAA solar calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarCalculator;

#[derive(Debug, Clone, Copy)]
enum Event {
    Rise,
    Set,
}

impl SolarCalculator {
    pub fn new() -> Self {
        Self
    }

    fn event(&self, date: NaiveDate, location: &Location, event: Event) -> CalendarResult<Instant> {
        let midnight_jd = julian_day(date);
        let zenith = 90.833 + horizon_dip(location.elevation_m);

        // First pass at local solar noon, second pass at the event estimate.
        let mut minutes_utc = 720.0 - 4.0 * location.longitude;
        for _ in 0..2 {
            let t = julian_century(midnight_jd + minutes_utc / 1440.0);
            let (eq_time, declination) = solar_position(t);
            let hour_angle = hour_angle(location.latitude, declination, zenith).ok_or_else(|| {
                CalendarError::solar_event(
                    date,
                    format!(
                        "sun does not {} at latitude {:.2}",
                        match event {
                            Event::Rise => "rise",
                            Event::Set => "set",
                        },
                        location.latitude
                    ),
                )
            })?;
            let signed = match event {
                Event::Rise => hour_angle,
                Event::Set => -hour_angle,
            };
            minutes_utc = 720.0 - 4.0 * (location.longitude + signed) - eq_time;
        }

        let midnight = Utc.from_utc_datetime(&NaiveDateTime::new(date, chrono::NaiveTime::MIN));
        Ok(midnight + Duration::milliseconds((minutes_utc * 60_000.0).round() as i64))
    }
}

impl SunEventsProvider for SolarCalculator {
    fn sun_events(&self, date: NaiveDate, location: &Location) -> CalendarResult<SunEvents> {
        let next = date
            .succ_opt()
            .ok_or_else(|| CalendarError::solar_event(date, "date has no successor"))?;
        let sunrise = self.event(date, location, Event::Rise)?;
        let sunset = self.event(date, location, Event::Set)?;
        let next_sunrise = self.event(next, location, Event::Rise)?;
        Ok(SunEvents::from_solar(date, sunrise, sunset, next_sunrise))
    }
}

fn julian_day(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce()) + 1_721_424.5
}

fn julian_century(jd: f64) -> f64 {
    (jd - 2_451_545.0) / 36_525.0
}

/// Dip of the horizon in degrees: 2.076' per sqrt(meter).
fn horizon_dip(elevation_m: f64) -> f64 {
    if elevation_m <= 0.0 {
        0.0
    } else {
        2.076 * elevation_m.sqrt() / 60.0
    }
}

/// Equation of time (minutes) and solar declination (degrees).
fn solar_position(t: f64) -> (f64, f64) {
    let l0 = (280.46646 + t * (36000.76983 + t * 0.0003032)).rem_euclid(360.0);
    let m = 357.52911 + t * (35999.05029 - 0.0001537 * t);
    let e = 0.016708634 - t * (0.000042037 + 0.0000001267 * t);

    let m_rad = m.to_radians();
    let c = m_rad.sin() * (1.914602 - t * (0.004817 + 0.000014 * t))
        + (2.0 * m_rad).sin() * (0.019993 - 0.000101 * t)
        + (3.0 * m_rad).sin() * 0.000289;
    let omega = 125.04 - 1934.136 * t;
    let lambda = l0 + c - 0.00569 - 0.00478 * omega.to_radians().sin();

    let eps0 = 23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0;
    let eps = eps0 + 0.00256 * omega.to_radians().cos();

    let declination = (eps.to_radians().sin() * lambda.to_radians().sin())
        .asin()
        .to_degrees();

    let y = (eps.to_radians() / 2.0).tan().powi(2);
    let l0_rad = l0.to_radians();
    let eq_time = 4.0
        * (y * (2.0 * l0_rad).sin() - 2.0 * e * m_rad.sin()
            + 4.0 * e * y * m_rad.sin() * (2.0 * l0_rad).cos()
            - 0.5 * y * y * (4.0 * l0_rad).sin()
            - 1.25 * e * e * (2.0 * m_rad).sin())
        .to_degrees();

    (eq_time, declination)
}

fn hour_angle(latitude: f64, declination: f64, zenith: f64) -> Option<f64> {
    let lat = latitude.to_radians();
    let decl = declination.to_radians();
    let cos_h = zenith.to_radians().cos() / (lat.cos() * decl.cos()) - lat.tan() * decl.tan();
    (-1.0..=1.0).contains(&cos_h).then(|| cos_h.acos().to_degrees())
}
