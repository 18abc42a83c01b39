//! Monthly reservation-attempt trends per region (UF).
//!
//! Loads a tabular feed with Brazilian number formatting, forecasts each
//! region, and ranks regions by growth or decline between years.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod forecast;
pub mod loader;
pub mod locale;
pub mod output;
pub mod reports;
pub mod schema;
pub mod types;
pub mod util;

pub use error::{DashboardError, ForecastError, Result};
