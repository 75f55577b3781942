//! Configuration management for belegsync
//!
//! Handles loading and validating configuration from TOML files. Values
//! from the command line are applied on top via [`ConfigOverrides`].

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name of the BelegManager SQLite database inside its data directory
pub const STORE_FILE_NAME: &str = "BelegManager.db4";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// BelegManager data directory (holds the database and imported files)
    #[serde(default = "default_beleg_manager_dir")]
    pub beleg_manager_dir: PathBuf,

    /// Glob pattern identifying the documents to import
    #[serde(default = "default_files_to_import_glob")]
    pub files_to_import_glob: String,

    /// Copy the database file aside before touching it
    #[serde(default = "default_backup_store")]
    pub backup_store: bool,

    /// Document analysis service configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Import pipeline configuration
    #[serde(default)]
    pub import: ImportConfig,

    /// Database pool configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Document analysis service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Service endpoint, e.g. https://<resource>.cognitiveservices.azure.com
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: Option<String>,

    /// Environment variable name for the subscription key
    #[serde(default = "default_analysis_api_key_env")]
    pub api_key_env: String,

    /// Analysis model identifier
    #[serde(default = "default_analysis_model_id")]
    pub model_id: String,

    /// API version query parameter
    #[serde(default = "default_analysis_api_version")]
    pub api_version: String,

    /// Path segment placed before `documentModels` (may be empty)
    #[serde(default = "default_analysis_path_prefix")]
    pub path_prefix: String,

    /// Fixed delay between two polls of a running analysis
    #[serde(default = "default_analysis_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_analysis_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Import pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Maximum number of files analyzed and reconciled at the same time
    #[serde(default = "default_import_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// Upper bound for processing a single file; unset waits indefinitely
    #[serde(default)]
    pub file_timeout_secs: Option<u64>,
}

/// Database pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum pooled SQLite connections
    ///
    /// Write transactions are serialized by SQLite regardless; additional
    /// connections wait on the busy timeout for the write lock.
    #[serde(default = "default_store_max_connections")]
    pub max_connections: u32,
}

/// Values given on the command line, applied over the loaded config
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub beleg_manager_dir: Option<PathBuf>,
    pub files_to_import_glob: Option<String>,
    pub endpoint: Option<String>,
    pub max_concurrent_files: Option<usize>,
    pub file_timeout_secs: Option<u64>,
    pub no_backup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            beleg_manager_dir: default_beleg_manager_dir(),
            files_to_import_glob: default_files_to_import_glob(),
            backup_store: default_backup_store(),
            analysis: AnalysisConfig::default(),
            import: ImportConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analysis_endpoint(),
            api_key_env: default_analysis_api_key_env(),
            model_id: default_analysis_model_id(),
            api_version: default_analysis_api_version(),
            path_prefix: default_analysis_path_prefix(),
            poll_interval_ms: default_analysis_poll_interval_ms(),
            request_timeout_secs: default_analysis_request_timeout(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: default_import_max_concurrent_files(),
            file_timeout_secs: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_store_max_connections(),
        }
    }
}

impl AnalysisConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the subscription key from the configured environment variable
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl ImportConfig {
    pub fn file_timeout(&self) -> Option<Duration> {
        self.file_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Get the default base directory for belegsync (~/.belegsync)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".belegsync")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the given file, or the default location if present, or defaults
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load(path);
        }

        let default_path = Self::default_config_path();
        if default_path.exists() {
            Self::load(&default_path)
        } else {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Apply command line values on top of the loaded configuration
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(dir) = overrides.beleg_manager_dir {
            self.beleg_manager_dir = dir;
        }
        if let Some(glob) = overrides.files_to_import_glob {
            self.files_to_import_glob = glob;
        }
        if let Some(endpoint) = overrides.endpoint {
            self.analysis.endpoint = Some(endpoint);
        }
        if let Some(max) = overrides.max_concurrent_files {
            self.import.max_concurrent_files = max;
        }
        if let Some(secs) = overrides.file_timeout_secs {
            self.import.file_timeout_secs = Some(secs);
        }
        if overrides.no_backup {
            self.backup_store = false;
        }
        self.validate()
    }

    /// Path of the BelegManager database file
    pub fn store_file(&self) -> PathBuf {
        self.beleg_manager_dir.join(STORE_FILE_NAME)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.import.max_concurrent_files == 0 {
            return Err(Error::Config(
                "import.max_concurrent_files must be at least 1".to_string(),
            ));
        }

        if self.import.file_timeout_secs == Some(0) {
            return Err(Error::Config(
                "import.file_timeout_secs must be positive when set".to_string(),
            ));
        }

        if self.analysis.poll_interval_ms == 0 {
            return Err(Error::Config(
                "analysis.poll_interval_ms must be positive".to_string(),
            ));
        }

        if self.store.max_connections == 0 {
            return Err(Error::Config(
                "store.max_connections must be at least 1".to_string(),
            ));
        }

        if self.files_to_import_glob.trim().is_empty() {
            return Err(Error::Config(
                "files_to_import_glob must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
