//! Check command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{BelegStore, StoreStats};
use serde::Serialize;
use tracing::info;

/// Result of checking the BelegManager store
#[derive(Debug, Clone, Serialize)]
pub struct CheckInfo {
    pub store_file: String,
    pub files_to_import_glob: String,
    pub analysis_endpoint: Option<String>,
    pub stats: StoreStats,
}

/// Verify store preconditions and gather row counts
pub async fn cmd_check(config: &Config) -> Result<CheckInfo> {
    let store_file = config.store_file();
    info!("Checking {}", store_file.display());

    let store = BelegStore::open(&store_file, &config.store).await?;
    let verified = store.verify().await;
    let stats = match verified {
        Ok(()) => store.stats().await,
        Err(e) => Err(e),
    };
    store.close().await;

    Ok(CheckInfo {
        store_file: store.path().display().to_string(),
        files_to_import_glob: config.files_to_import_glob.clone(),
        analysis_endpoint: config.analysis.endpoint.clone(),
        stats: stats?,
    })
}

/// Print check result to console
pub fn print_check(info: &CheckInfo) {
    println!("\n🧾 BelegManager store\n");
    println!("Database: {}", info.store_file);
    println!("  Version: {} ✓", info.stats.database_version);
    println!("  Assets: {}", info.stats.assets);
    println!("  Belege: {}", info.stats.belege);
    println!("  Categories: {}", info.stats.categories);
    println!("  Links: {}", info.stats.links);
    println!("\nImport glob: {}", info.files_to_import_glob);
    println!(
        "Analysis endpoint: {}",
        info.analysis_endpoint.as_deref().unwrap_or("(not configured)")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STORE_FILE_NAME;
    use crate::error::Error;
    use crate::store::schema::fixtures;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_check_empty_store() {
        let tmp = TempDir::new().unwrap();
        fixtures::create_empty_store(&tmp.path().join(STORE_FILE_NAME)).await;

        let config = Config {
            beleg_manager_dir: tmp.path().to_path_buf(),
            ..Config::default()
        };
        let info = cmd_check(&config).await.unwrap();
        assert_eq!(info.stats.database_version, 22003);
        assert_eq!(info.stats.assets, 0);
        assert!(info.store_file.ends_with(STORE_FILE_NAME));
    }

    #[tokio::test]
    async fn test_check_unsupported_version() {
        let tmp = TempDir::new().unwrap();
        fixtures::create_store_with_version(&tmp.path().join(STORE_FILE_NAME), 1).await;

        let config = Config {
            beleg_manager_dir: tmp.path().to_path_buf(),
            ..Config::default()
        };
        let err = cmd_check(&config).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedStore(_)));
    }
}
