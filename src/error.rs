//! Custom error types for belegsync

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for belegsync operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported BelegManager database: {0}")]
    UnsupportedStore(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not an invoice: {0}")]
    Classification(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Glob error: {0}")]
    Glob(#[from] ignore::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error only affects a single imported file.
    ///
    /// Configuration and store precondition failures abort the whole run,
    /// everything else is recorded as a failed outcome for one file.
    pub fn is_file_scoped(&self) -> bool {
        !matches!(self, Error::Config(_) | Error::UnsupportedStore(_))
    }
}

/// Result type alias for belegsync
pub type Result<T> = std::result::Result<T, Error>;
