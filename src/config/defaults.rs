//! Default values for configuration

use std::path::PathBuf;

/// File types both BelegManager and the analysis service accept
pub const SUPPORTED_FILE_EXTENSIONS: &[&str] = &["jpg", "pdf", "png", "tif", "tiff"];

fn documents_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default BelegManager data directory (~/Documents/BelegManager-Daten)
pub fn default_beleg_manager_dir() -> PathBuf {
    documents_dir().join("BelegManager-Daten")
}

/// Default glob for files to import (~/Documents/BelegManager-Import/**/*.{jpg,pdf,...})
pub fn default_files_to_import_glob() -> String {
    let base = documents_dir().join("BelegManager-Import");
    format!(
        "{}/**/*.{{{}}}",
        base.display(),
        SUPPORTED_FILE_EXTENSIONS.join(",")
    )
}

/// Default: back up the database file before importing
pub fn default_backup_store() -> bool {
    true
}

/// Default analysis endpoint, taken from the environment when present
pub fn default_analysis_endpoint() -> Option<String> {
    std::env::var("BELEGSYNC_DI_ENDPOINT").ok()
}

/// Default environment variable holding the analysis subscription key
pub fn default_analysis_api_key_env() -> String {
    "BELEGSYNC_DI_KEY".to_string()
}

/// Default prebuilt analysis model
pub fn default_analysis_model_id() -> String {
    "prebuilt-invoice".to_string()
}

/// Default analysis API version
pub fn default_analysis_api_version() -> String {
    "2024-11-30".to_string()
}

/// Default path segment between endpoint and `documentModels`
pub fn default_analysis_path_prefix() -> String {
    "documentintelligence".to_string()
}

/// Default polling interval (1 second)
pub fn default_analysis_poll_interval_ms() -> u64 {
    1000
}

/// Default HTTP request timeout in seconds
pub fn default_analysis_request_timeout() -> u64 {
    30
}

/// Default number of files processed concurrently
pub fn default_import_max_concurrent_files() -> usize {
    4
}

/// Default SQLite pool size; SQLite allows a single writer
pub fn default_store_max_connections() -> u32 {
    1
}
