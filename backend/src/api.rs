//! Public API surface for indicator projections.
//!
//! These DTOs are what a host layer consumes. All types derive
//! Serialize/Deserialize for JSON output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::time::Instant;

pub use crate::services::composer::{Block, BlockClass, BlockDay, Composition, Window, WindowKind};
pub use crate::services::holidays::{HolidayId, HolidaySpan};

/// Attribute key: current instant in the local timezone.
pub const ATTR_NOW: &str = "Now";
/// Attribute key: start of the active (or next) window.
pub const ATTR_WINDOW_START: &str = "Window_Start";
/// Attribute key: end of the active (or next) window.
pub const ATTR_WINDOW_END: &str = "Window_End";
/// Attribute key: why the indicator is on.
pub const ATTR_REASON: &str = "Reason";

/// Value of a single indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorValue {
    Boolean { on: bool },
    Timestamp { at: Instant, simple: String },
    Label { key: String },
}

impl IndicatorValue {
    pub fn is_on(&self) -> bool {
        matches!(self, IndicatorValue::Boolean { on: true })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub value: IndicatorValue,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Indicator {
    pub fn new(name: impl Into<String>, value: IndicatorValue) -> Self {
        Self {
            name: name.into(),
            value,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Every indicator evaluated at one instant, plus the next instant at which
/// any of them could change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub now: Instant,
    pub indicators: Vec<Indicator>,
    pub next_transition: Instant,
}

impl Projection {
    pub fn get(&self, name: &str) -> Option<&Indicator> {
        self.indicators.iter().find(|i| i.name == name)
    }

    /// `Some(on)` for a Boolean indicator, `None` when absent or not Boolean.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name).map(|i| &i.value) {
            Some(IndicatorValue::Boolean { on }) => Some(*on),
            _ => None,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        match self.get(name).map(|i| &i.value) {
            Some(IndicatorValue::Label { key }) => Some(key.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str, key: &str) -> Option<&str> {
        self.get(name)
            .and_then(|i| i.attributes.get(key))
            .map(String::as_str)
    }
}
