#![forbid(unsafe_code)]

//! Core domain model and rule engine for the supplement regimen planner.
//!
//! This crate provides:
//! - Domain types (blocks, supplements, rules, constraints, events, day plans)
//! - The built-in regimen and a model file loader
//! - Model validation and normalization
//! - The per-day phase pipeline and the year driver
//! - CSV, iCalendar and plain-text digest renderers

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod loader;
pub mod validate;
pub mod normalize;
pub mod events;
pub mod engine;
pub mod planner;
pub mod csv_export;
pub mod ics_export;
pub mod digest;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_model, get_default_model};
pub use config::Config;
pub use loader::{load_model, save_model};
pub use validate::validate_model;
pub use normalize::normalize_model;
pub use events::{active_events_on_day, resolve_event_days};
pub use engine::{evaluate_day, DayEvaluation};
pub use planner::{generate_range, generate_year, plan_for_day};
pub use csv_export::{export_csv, write_csv};
pub use ics_export::{export_ics, render_ics, IcsOptions};
pub use digest::Digest;
