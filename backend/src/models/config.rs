//! Engine configuration.
//!
//! Settings are read from a TOML file with a `[location]` table and an
//! optional `[calendar]` table. Every calendar field has a default, and every
//! value is checked against its documented range; out-of-range values are
//! rejected, never clamped.
//!
//! ```toml
//! [location]
//! latitude = 40.6782
//! longitude = -73.9442
//! elevation_m = 10.0
//! timezone = "America/New_York"
//!
//! [calendar]
//! candlelighting_offset_min = 18
//! havdalah_offset_min = 72
//! israel = false
//! lookahead_days = 3
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CalendarError, CalendarResult, ErrorContext};
use crate::models::location::Location;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "YIDCAL_CONFIG";

/// When the Slichos label moves on to the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelichosAdvanceMode {
    /// At sunset plus the havdalah offset
    Havdalah,
    /// At local civil midnight
    Midnight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeDisplay {
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "24h")]
    TwentyFourHour,
}

/// Offsets and flags consumed by every stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_candle_offset")]
    pub candlelighting_offset_min: i64,
    #[serde(default = "default_havdalah_offset")]
    pub havdalah_offset_min: i64,
    #[serde(default = "default_misheyakir_offset")]
    pub misheyakir_offset_min: i64,
    #[serde(default)]
    pub israel: bool,
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,
    #[serde(default = "default_selichos_advance_mode")]
    pub selichos_advance_mode: SelichosAdvanceMode,
    #[serde(default = "default_time_display")]
    pub time_display: TimeDisplay,
}

fn default_candle_offset() -> i64 {
    15
}

fn default_havdalah_offset() -> i64 {
    72
}

fn default_misheyakir_offset() -> i64 {
    50
}

fn default_lookahead_days() -> u32 {
    2
}

fn default_selichos_advance_mode() -> SelichosAdvanceMode {
    SelichosAdvanceMode::Havdalah
}

fn default_time_display() -> TimeDisplay {
    TimeDisplay::TwentyFourHour
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            candlelighting_offset_min: default_candle_offset(),
            havdalah_offset_min: default_havdalah_offset(),
            misheyakir_offset_min: default_misheyakir_offset(),
            israel: false,
            lookahead_days: default_lookahead_days(),
            selichos_advance_mode: default_selichos_advance_mode(),
            time_display: default_time_display(),
        }
    }
}

fn check_range(name: &str, value: i64, min: i64, max: i64) -> CalendarResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CalendarError::config_with_context(
            format!("{} = {} outside {}..={}", name, value, min, max),
            ErrorContext::new("validate_config")
                .with_entity("config")
                .with_details(name),
        ))
    }
}

impl CalendarConfig {
    pub fn validate(&self) -> CalendarResult<()> {
        check_range("candlelighting_offset_min", self.candlelighting_offset_min, 0, 90)?;
        check_range("havdalah_offset_min", self.havdalah_offset_min, 0, 120)?;
        check_range("misheyakir_offset_min", self.misheyakir_offset_min, 0, 90)?;
        check_range("lookahead_days", i64::from(self.lookahead_days), 1, 14)?;
        Ok(())
    }

    pub fn candle_offset(&self) -> Duration {
        Duration::minutes(self.candlelighting_offset_min)
    }

    pub fn havdalah_offset(&self) -> Duration {
        Duration::minutes(self.havdalah_offset_min)
    }
}

/// Everything captured by value at the start of a recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub location: Location,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl EngineSettings {
    pub fn new(location: Location, calendar: CalendarConfig) -> CalendarResult<Self> {
        let settings = Self { location, calendar };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> CalendarResult<()> {
        self.location.validate()?;
        self.calendar.validate()
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> CalendarResult<Self> {
        let settings: EngineSettings = toml::from_str(content).map_err(|e| {
            CalendarError::config(format!("Failed to parse config file: {}", e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CalendarResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            CalendarError::config_with_context(
                format!("Failed to read config file: {}", e),
                ErrorContext::new("load_config")
                    .with_entity("config")
                    .with_details(path.as_ref().display().to_string()),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Load settings from the default location.
    ///
    /// Searches for `yidcal.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> CalendarResult<Self> {
        let search_paths = [
            PathBuf::from("yidcal.toml"),
            PathBuf::from("backend/yidcal.toml"),
            PathBuf::from("../yidcal.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(CalendarError::config(
            "No yidcal.toml found in standard locations",
        ))
    }

    /// Honour `YIDCAL_CONFIG`, falling back to the default search.
    pub fn from_env() -> CalendarResult<Self> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Self::from_default_location(),
        }
    }

    /// SHA-256 over the canonical JSON form; the config-hash of cache keys.
    pub fn fingerprint(&self) -> String {
        let canonical =
            serde_json::to_vec(self).unwrap_or_else(|_| format!("{:?}", self).into_bytes());
        hex::encode(Sha256::digest(&canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [location]
        latitude = 31.778
        longitude = 35.2354
        timezone = "Asia/Jerusalem"
    "#;

    #[test]
    fn test_defaults_applied() {
        let settings = EngineSettings::from_toml_str(MINIMAL).unwrap();
        assert_eq!(settings.calendar, CalendarConfig::default());
        assert_eq!(settings.calendar.candlelighting_offset_min, 15);
        assert_eq!(settings.calendar.havdalah_offset_min, 72);
        assert_eq!(settings.location.elevation_m, 0.0);
        assert_eq!(settings.location.timezone, chrono_tz::Asia::Jerusalem);
    }

    #[test]
    fn test_full_calendar_table() {
        let content = format!(
            "{}\n[calendar]\ncandlelighting_offset_min = 40\nisrael = true\nlookahead_days = 7\nselichos_advance_mode = \"midnight\"\ntime_display = \"12h\"\n",
            MINIMAL
        );
        let settings = EngineSettings::from_toml_str(&content).unwrap();
        assert_eq!(settings.calendar.candlelighting_offset_min, 40);
        assert!(settings.calendar.israel);
        assert_eq!(settings.calendar.lookahead_days, 7);
        assert_eq!(
            settings.calendar.selichos_advance_mode,
            SelichosAdvanceMode::Midnight
        );
        assert_eq!(settings.calendar.time_display, TimeDisplay::TwelveHour);
    }

    #[test]
    fn test_out_of_range_lookahead_is_rejected() {
        let content = format!("{}\n[calendar]\nlookahead_days = 15\n", MINIMAL);
        let err = EngineSettings::from_toml_str(&content).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("lookahead_days"));
    }

    #[test]
    fn test_negative_offset_is_rejected() {
        let config = CalendarConfig {
            havdalah_offset_min: -5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_timezone_is_config_error() {
        let content = MINIMAL.replace("Asia/Jerusalem", "Nowhere/Special");
        let err = EngineSettings::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, CalendarError::ConfigError { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let settings = EngineSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.location.latitude, 31.778);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = EngineSettings::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let a = EngineSettings::from_toml_str(MINIMAL).unwrap();
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.calendar.candlelighting_offset_min = 18;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
