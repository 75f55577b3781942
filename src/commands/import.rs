//! Import command implementation

use crate::analysis::{AnalysisClient, DocumentAnalyzer};
use crate::config::Config;
use crate::discover::discover_files;
use crate::error::{Error, Result};
use crate::files::backup_store_file;
use crate::pipeline::{ImportPipeline, RunSummary};
use crate::progress::file_progress_bar;
use crate::report::write_report;
use crate::store::BelegStore;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of an import run
#[derive(Debug, Clone, Serialize)]
pub struct ImportStats {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub backup_path: Option<String>,
    pub report_path: Option<String>,
    pub cancelled: bool,
}

/// Analyze every matching file and reconcile it into the store.
///
/// `api_key` takes precedence over the key from the configured
/// environment variable.
pub async fn cmd_import(
    config: &Config,
    api_key: Option<String>,
    cancel: &CancellationToken,
) -> Result<ImportStats> {
    let store_file = config.store_file();
    if !store_file.is_file() {
        return Err(Error::Config(format!(
            "BelegManager database not found: {}",
            store_file.display()
        )));
    }

    let endpoint = config.analysis.endpoint.clone().ok_or_else(|| {
        Error::Config("No analysis endpoint configured. Use --di-endpoint or set analysis.endpoint".to_string())
    })?;
    let api_key = api_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| config.analysis.api_key_from_env())
        .ok_or_else(|| {
            Error::Config(format!(
                "No analysis key configured. Use --di-key or set {}",
                config.analysis.api_key_env
            ))
        })?;
    let client = AnalysisClient::new(&config.analysis, &endpoint, api_key)?;
    info!("Analyzing documents with {}", client.analyze_url());
    let analyzer: Arc<dyn DocumentAnalyzer> = Arc::new(client);

    let backup_path = if config.backup_store {
        let backup = backup_store_file(&store_file).await?;
        info!("Backed up database to {}", backup.display());
        Some(backup.display().to_string())
    } else {
        warn!("Skipping database backup");
        None
    };

    let store = BelegStore::open(&store_file, &config.store).await?;
    if let Err(e) = store.verify().await {
        store.close().await;
        return Err(e);
    }

    let files = match discover_files(&config.files_to_import_glob) {
        Ok(files) => files,
        Err(e) => {
            store.close().await;
            return Err(e);
        }
    };
    let file_count = files.len();

    let progress = file_progress_bar(file_count);
    let pipeline = ImportPipeline::new(
        store.clone(),
        analyzer,
        config.beleg_manager_dir.clone(),
        &config.import,
    )
    .with_progress(progress.clone());
    let outcomes = pipeline.run(files, cancel).await;
    progress.finish_and_clear();
    store.close().await;

    let report_path = write_report(&config.beleg_manager_dir, &outcomes);
    let summary = RunSummary::from_outcomes(file_count, &outcomes);
    info!(
        files = summary.files,
        created = summary.created,
        updated = summary.updated,
        failed = summary.failed,
        "Import finished"
    );

    Ok(ImportStats {
        summary,
        backup_path,
        report_path: report_path.map(|p| p.display().to_string()),
        cancelled: cancel.is_cancelled(),
    })
}

/// Print import result to console
pub fn print_import_stats(stats: &ImportStats) {
    let summary = &stats.summary;

    if stats.cancelled {
        println!("\n⚠️  Import cancelled\n");
    } else {
        println!("\n✓ Import complete\n");
    }
    println!("Files: {}", summary.files);
    println!("  Documents analyzed: {}", summary.documents);
    println!("  Belege created: {}", summary.created);
    println!("  Belege updated: {}", summary.updated);
    println!("  Failed: {}", summary.failed);

    if let Some(backup) = &stats.backup_path {
        println!("\nBackup: {}", backup);
    }
    match &stats.report_path {
        Some(report) => println!("Report: {}", report),
        None => println!("Report: (not written)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{OPERATION_LOCATION_HEADER, SUBSCRIPTION_KEY_HEADER};
    use crate::config::{AnalysisConfig, STORE_FILE_NAME};
    use crate::files::BACKUP_INFIX;
    use crate::store::schema::fixtures;
    use std::path::Path;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_invoice_service(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(
                "/documentintelligence/documentModels/prebuilt-invoice:analyze",
            ))
            .and(header(SUBSCRIPTION_KEY_HEADER, "secret"))
            .respond_with(ResponseTemplate::new(202).insert_header(
                OPERATION_LOCATION_HEADER,
                format!("{}/operations/1", server.uri()).as_str(),
            ))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operations/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "succeeded",
                "analyzeResult": {
                    "documents": [{
                        "docType": "invoice",
                        "fields": {
                            "InvoiceId": {"content": "R-1001"},
                            "InvoiceDate": {"valueDate": "2024-05-01"},
                            "VendorName": {"content": "Acme"},
                            "InvoiceTotal": {"confidence": 0.9, "valueCurrency": {"amount": 119.0}}
                        }
                    }]
                }
            })))
            .mount(server)
            .await;
    }

    fn test_config(dir: &Path, endpoint: Option<String>) -> Config {
        Config {
            beleg_manager_dir: dir.to_path_buf(),
            files_to_import_glob: format!("{}/inbox/**/*.pdf", dir.display()),
            analysis: AnalysisConfig {
                endpoint,
                api_key_env: "BELEGSYNC_TEST_UNSET_KEY".to_string(),
                poll_interval_ms: 10,
                request_timeout_secs: 5,
                ..AnalysisConfig::default()
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_import_end_to_end() {
        let server = MockServer::start().await;
        mount_invoice_service(&server).await;

        let tmp = TempDir::new().unwrap();
        fixtures::create_empty_store(&tmp.path().join(STORE_FILE_NAME)).await;
        std::fs::create_dir_all(tmp.path().join("inbox")).unwrap();
        std::fs::write(tmp.path().join("inbox/scan.pdf"), b"%PDF-1.4 scan").unwrap();

        let config = test_config(tmp.path(), Some(server.uri()));
        let stats = cmd_import(&config, Some("secret".to_string()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.summary.files, 1);
        assert_eq!(stats.summary.created, 1);
        assert_eq!(stats.summary.failed, 0);
        assert!(!stats.cancelled);
        assert!(stats.backup_path.as_deref().unwrap().contains(BACKUP_INFIX));

        let report = std::fs::read_to_string(stats.report_path.unwrap()).unwrap();
        assert!(report.contains("Invoice R-1001 from Acme"));
        assert!(tmp.path().join("scan.pdf").is_file());
    }

    #[tokio::test]
    async fn test_missing_store_aborts() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path(), Some("https://di.example.com".to_string()));

        let err = cmd_import(&config, Some("secret".to_string()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_abort() {
        let tmp = TempDir::new().unwrap();
        fixtures::create_empty_store(&tmp.path().join(STORE_FILE_NAME)).await;

        let config = test_config(tmp.path(), None);
        let err = cmd_import(&config, Some("secret".to_string()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = test_config(tmp.path(), Some("https://di.example.com".to_string()));
        let err = cmd_import(&config, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_unsupported_store_aborts_before_analysis() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        fixtures::create_store_with_version(&tmp.path().join(STORE_FILE_NAME), 21000).await;

        let mut config = test_config(tmp.path(), Some(server.uri()));
        config.backup_store = false;
        let err = cmd_import(&config, Some("secret".to_string()), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedStore(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
