use thiserror::Error;

/// Errors that stop a load or ranking run. Per-cell parse failures and
/// per-region forecast failures are not represented here; they are recovered
/// where they happen.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Required column '{column}' not found (headers: {available})")]
    MissingColumn { column: String, available: String },

    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure of the forecasting collaborator for a single region.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("no historical observations to fit")]
    EmptySeries,

    #[error("horizon must be at least one month (got {0})")]
    InvalidHorizon(usize),

    #[error("model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
