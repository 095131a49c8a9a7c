//! Service layer: the rule engine, window composition and projection.
//!
//! Each stage is a pure function of the previous stage's output. The pipeline
//! module wires them together over a sliding date range.

pub mod cache;
pub mod composer;
pub mod day_type;
pub mod holidays;
pub mod observances;
pub mod pipeline;
pub mod projector;

pub use composer::{Composition, WindowComposer};
pub use holidays::{HolidayId, HolidayRuleEngine, HolidaySpan};
pub use projector::StateProjector;
