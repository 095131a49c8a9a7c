use std::hash::{Hash, Hasher};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, CalendarResult, ErrorContext};

/// Observer location. Timezone resolution from coordinates happens outside
/// the engine; the IANA id arrives already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180, east positive)
    pub longitude: f64,
    /// Elevation above sea level in meters
    #[serde(default)]
    pub elevation_m: f64,
    pub timezone: Tz,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, elevation_m: f64, timezone: Tz) -> Self {
        Self {
            latitude,
            longitude,
            elevation_m,
            timezone,
        }
    }

    /// Parse the timezone id and validate coordinates.
    pub fn try_new(
        latitude: f64,
        longitude: f64,
        elevation_m: f64,
        timezone: &str,
    ) -> CalendarResult<Self> {
        let tz: Tz = timezone.parse().map_err(|_| {
            CalendarError::config_with_context(
                format!("unsupported timezone '{}'", timezone),
                ErrorContext::new("parse_timezone").with_entity("location"),
            )
        })?;
        let location = Self::new(latitude, longitude, elevation_m, tz);
        location.validate()?;
        Ok(location)
    }

    pub fn validate(&self) -> CalendarResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CalendarError::config(format!(
                "latitude {} outside -90..90",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CalendarError::config(format!(
                "longitude {} outside -180..180",
                self.longitude
            )));
        }
        if !self.elevation_m.is_finite() {
            return Err(CalendarError::config("elevation must be finite"));
        }
        Ok(())
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.latitude.to_bits().hash(state);
        self.longitude.to_bits().hash(state);
        self.elevation_m.to_bits().hash(state);
        self.timezone.name().hash(state);
    }
}
