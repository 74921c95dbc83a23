//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// The record change was committed but the period summary could not be
    /// rebuilt; it stays stale until the next successful recalculation.
    #[error("Summary recalculation failed for {period}: {source}")]
    SummaryRecompute {
        period: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Short machine-readable name for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Validation { .. } => "validation",
            Self::NotFound(_) => "not_found",
            Self::SummaryRecompute { .. } => "summary_recompute",
            _ => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
