//! # YidCal Rust Engine
//!
//! Hebrew-calendar window-composition engine.
//!
//! This crate derives, for a location and an instant, the calendar indicators a
//! host exposes: Shabbos and Yom-Tov boundaries, holiday spans, prohibited-work
//! windows, liturgical-insertion flags, zmanim and countdowns. Inputs are solar
//! event times, the Hebrew date and a fixed holiday rule table.
//!
//! ## Architecture
//!
//! Data flows strictly downstream:
//!
//! - [`models`]: leaf inputs. Hebrew date arithmetic, solar events, location
//!   and configuration.
//! - [`services::holidays`]: the rule table, mapping one civil date to its
//!   [`HolidaySpan`](services::holidays::HolidaySpan)s.
//! - [`services::composer`]: merges spans and the weekly Shabbos into blocks
//!   and derives every named window.
//! - [`services::projector`]: evaluates windows at an instant and reports the
//!   next instant at which anything changes.
//! - [`services::pipeline`]: the sliding-window driver, with a per-day cache.
//! - [`scheduler`]: single-slot alarm interface driven by the projection.
//! - [`api`]: output DTOs.
//!
//! ## Errors
//!
//! Configuration problems are fatal at startup. A date the calendar or the
//! solar model cannot handle degrades only that date; see [`error`].

pub mod api;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod services;

pub use error::{CalendarError, CalendarResult};
pub use services::pipeline::Pipeline;
