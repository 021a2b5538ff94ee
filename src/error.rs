// error.rs

use thiserror::Error;

/// Everything that can go wrong inside the dashboard pipeline.
///
/// None of these end the session: callers log them and degrade the one view
/// they belong to.
#[derive(Debug, Error)]
pub enum DashError {
    #[error("malformed tabular text: {0}")]
    Decode(String),

    #[error("traffic row references unknown station '{0}'")]
    UnknownStation(String),

    #[error("query failed with status {status}")]
    Query { status: u16 },

    #[error("result has no data rows")]
    EmptyResult,

    #[error("table has no '{0}' column")]
    MissingColumn(String),

    #[error("backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("could not load overlay: {0}")]
    Overlay(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DashError>;
