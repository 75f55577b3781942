//! Concurrent import of many files
//!
//! One task is spawned per input file. Tasks wait on a semaphore so at
//! most `max_concurrent_files` files are analyzed and reconciled at once.
//! Every task yields at least one [`Outcome`]; failures, timeouts and
//! panics are recorded as outcomes without a beleg and never abort the run.

use crate::analysis::{AnalyzedDocument, DocumentAnalyzer};
use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::reconcile::{self, ReconcileAction, Reconciled};
use crate::store::BelegStore;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Result of processing one document of one input file
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The input file as discovered
    pub file: PathBuf,
    /// The analyzed document, absent when analysis failed
    pub document: Option<AnalyzedDocument>,
    /// The reconciled beleg, absent when anything failed
    pub reconciled: Option<Reconciled>,
    /// Why no beleg was produced
    pub error: Option<String>,
}

impl Outcome {
    fn failed(file: &Path, error: &Error) -> Self {
        Self {
            file: file.to_path_buf(),
            document: None,
            reconciled: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_imported(&self) -> bool {
        self.reconciled.is_some()
    }
}

/// Counts over all outcomes of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub files: usize,
    pub documents: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes(files: usize, outcomes: &[Outcome]) -> Self {
        let mut summary = RunSummary {
            files,
            ..Default::default()
        };
        for outcome in outcomes {
            if outcome.document.is_some() {
                summary.documents += 1;
            }
            match outcome.reconciled.as_ref().map(|r| r.action) {
                Some(ReconcileAction::Created) => summary.created += 1,
                Some(ReconcileAction::Updated) => summary.updated += 1,
                None => summary.failed += 1,
            }
        }
        summary
    }
}

/// Orchestrates analysis and reconciliation of a batch of files
pub struct ImportPipeline {
    store: BelegStore,
    analyzer: Arc<dyn DocumentAnalyzer>,
    target_dir: PathBuf,
    max_concurrent_files: usize,
    file_timeout: Option<Duration>,
    progress: ProgressBar,
}

impl ImportPipeline {
    pub fn new(
        store: BelegStore,
        analyzer: Arc<dyn DocumentAnalyzer>,
        target_dir: PathBuf,
        config: &ImportConfig,
    ) -> Self {
        Self {
            store,
            analyzer,
            target_dir,
            max_concurrent_files: config.max_concurrent_files.max(1),
            file_timeout: config.file_timeout(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Advance `progress` once per finished file
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Process all files and gather their outcomes in completion order
    pub async fn run(&self, files: Vec<PathBuf>, cancel: &CancellationToken) -> Vec<Outcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_files));
        let mut tasks = FuturesUnordered::new();

        for file in files {
            let task = FileTask {
                store: self.store.clone(),
                analyzer: Arc::clone(&self.analyzer),
                target_dir: self.target_dir.clone(),
                file: file.clone(),
                timeout: self.file_timeout,
                cancel: cancel.child_token(),
            };
            let semaphore = Arc::clone(&semaphore);
            let span = info_span!("import_file", file = %file.display());

            let handle = tokio::spawn(
                async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return vec![Outcome::failed(&task.file, &Error::Cancelled)],
                    };
                    task.run().await
                }
                .instrument(span),
            );
            tasks.push(async move { (file, handle.await) });
        }

        let mut outcomes = Vec::new();
        while let Some((file, joined)) = tasks.next().await {
            match joined {
                Ok(file_outcomes) => outcomes.extend(file_outcomes),
                Err(join_err) => {
                    error!(file = %file.display(), "Import task aborted: {}", join_err);
                    let err = Error::Other(format!("import task aborted: {}", join_err));
                    outcomes.push(Outcome::failed(&file, &err));
                }
            }
            self.progress.inc(1);
        }

        outcomes
    }
}

/// Everything one spawned task needs to process its file
struct FileTask {
    store: BelegStore,
    analyzer: Arc<dyn DocumentAnalyzer>,
    target_dir: PathBuf,
    file: PathBuf,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl FileTask {
    async fn run(self) -> Vec<Outcome> {
        let Some(limit) = self.timeout else {
            return self.process().await;
        };

        match tokio::time::timeout(limit, self.process()).await {
            Ok(outcomes) => outcomes,
            Err(_) => {
                self.cancel.cancel();
                let err = Error::Timeout(limit);
                warn!("Failed to import file: {}", err);
                vec![Outcome::failed(&self.file, &err)]
            }
        }
    }

    async fn process(&self) -> Vec<Outcome> {
        if self.cancel.is_cancelled() {
            return vec![Outcome::failed(&self.file, &Error::Cancelled)];
        }

        debug!("Analyzing...");
        let result = match self.analyzer.analyze(&self.file, &self.cancel).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to analyze file: {}", e);
                return vec![Outcome::failed(&self.file, &e)];
            }
        };

        if result.documents.is_empty() {
            let err = Error::Analysis("no documents recognized".to_string());
            warn!("Failed to import file: {}", err);
            return vec![Outcome::failed(&self.file, &err)];
        }

        let mut outcomes = Vec::with_capacity(result.documents.len());
        for (index, document) in result.documents.into_iter().enumerate() {
            debug!("Importing document nr {}...", index + 1);
            let imported = self.import_document(&document).await;

            let outcome = match imported {
                Ok(reconciled) => {
                    info!(
                        document = index + 1,
                        beleg = reconciled.beleg.meta.id,
                        "Beleg {}",
                        reconciled.action
                    );
                    Outcome {
                        file: self.file.clone(),
                        document: Some(document),
                        reconciled: Some(reconciled),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(document = index + 1, "Failed to import file: {}", e);
                    Outcome {
                        file: self.file.clone(),
                        document: Some(document),
                        reconciled: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn import_document(&self, document: &AnalyzedDocument) -> Result<Reconciled> {
        reconcile::reconcile_document(
            &self.store,
            &self.target_dir,
            &self.file,
            document,
            &self.cancel,
        )
        .await
    }
}
