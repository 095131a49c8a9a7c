//! Error types for calendar computations.
//!
//! Errors fall in two groups. Configuration problems are fatal and must be
//! surfaced when the engine is initialised. Date-scoped problems (a Hebrew
//! date outside the supported era, a day on which the sun never sets) only
//! degrade the affected civil date; the sliding-window driver logs them and
//! keeps going.

use std::fmt;

use chrono::NaiveDate;

/// Result type for calendar operations
pub type CalendarResult<T> = Result<T, CalendarError>;

/// Structured context for calendar errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "hebrew_from_civil", "load_config")
    pub operation: Option<String>,
    /// The entity involved (e.g., "config", "sun_events")
    pub entity: Option<String>,
    /// Civil date the error is scoped to, if any
    pub date: Option<NaiveDate>,
    /// Additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Scope the error to a civil date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(date) = self.date {
            parts.push(format!("date={}", date));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for calendar operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalendarError {
    /// Offset out of its documented range, unparsable config file or an
    /// unknown timezone. Fatal at initialisation.
    #[error("Configuration error: {message} {context}")]
    ConfigError {
        message: String,
        context: ErrorContext,
    },

    /// Hebrew-date conversion outside the supported era.
    #[error("Date range error: {message} {context}")]
    DateRangeError {
        message: String,
        context: ErrorContext,
    },

    /// The sun does not rise or set on the requested date at this location.
    #[error("Solar event error: {message} {context}")]
    SolarEventError {
        message: String,
        context: ErrorContext,
    },

    /// An interval whose start is not strictly before its end.
    #[error("Invalid interval: {message} {context}")]
    InvalidInterval {
        message: String,
        context: ErrorContext,
    },
}

impl CalendarError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            context: ErrorContext::new("load_config").with_entity("config"),
        }
    }

    /// Create a configuration error with context.
    pub fn config_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ConfigError {
            message: message.into(),
            context,
        }
    }

    /// Create a date range error scoped to `date`.
    pub fn date_range(date: NaiveDate, message: impl Into<String>) -> Self {
        Self::DateRangeError {
            message: message.into(),
            context: ErrorContext::new("hebrew_from_civil")
                .with_entity("hebrew_date")
                .with_date(date),
        }
    }

    /// Create a date range error for a Hebrew date with no civil date.
    pub fn hebrew_range(hebrew: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::DateRangeError {
            message: message.into(),
            context: ErrorContext::new("civil_from_hebrew")
                .with_entity("hebrew_date")
                .with_details(hebrew.to_string()),
        }
    }

    /// Create a solar event error scoped to `date`.
    pub fn solar_event(date: NaiveDate, message: impl Into<String>) -> Self {
        Self::SolarEventError {
            message: message.into(),
            context: ErrorContext::new("sun_events")
                .with_entity("sun_events")
                .with_date(date),
        }
    }

    /// Create an invalid interval error.
    pub fn invalid_interval(message: impl Into<String>) -> Self {
        Self::InvalidInterval {
            message: message.into(),
            context: ErrorContext::new("interval"),
        }
    }

    /// Fatal errors abort initialisation; the rest degrade a single date.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigError { .. } | Self::InvalidInterval { .. })
    }

    /// Civil date this error is scoped to, if any.
    pub fn date(&self) -> Option<NaiveDate> {
        self.context().date
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::ConfigError { context, .. }
            | Self::DateRangeError { context, .. }
            | Self::SolarEventError { context, .. }
            | Self::InvalidInterval { context, .. } => context,
        }
    }
}
