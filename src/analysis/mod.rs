//! Document analysis client
//!
//! Submits one file to the analysis service and polls the returned job
//! until it reaches a terminal state:
//! - `succeeded` with a result ends the loop
//! - `succeeded` without a result is a terminal error
//! - anything else (running, 429, other statuses, transport failures)
//!   is retried after a fixed interval
//!
//! The loop has no attempt cap; callers bound it with the cancellation
//! token or an outer timeout.

mod types;

pub use types::*;

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

/// Authentication header expected by the analysis service
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Response header carrying the polling URL of a submitted job
pub const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// Trait for document analysis providers
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Analyze one file and wait for the result
    async fn analyze(&self, path: &Path, cancel: &CancellationToken) -> Result<AnalyzeResult>;
}

/// Build `{endpoint}/{prefix}/documentModels/{model}:analyze?api-version={version}`
pub fn build_analyze_url(
    endpoint: &str,
    path_prefix: &str,
    model_id: &str,
    api_version: &str,
) -> Result<Url> {
    let endpoint = endpoint.trim_end_matches('/');
    let prefix = path_prefix.trim_matches('/');
    let raw = if prefix.is_empty() {
        format!("{endpoint}/documentModels/{model_id}:analyze?api-version={api_version}")
    } else {
        format!("{endpoint}/{prefix}/documentModels/{model_id}:analyze?api-version={api_version}")
    };
    Ok(Url::parse(&raw)?)
}

/// Decide what a single poll response means for the job.
///
/// `Ok(Some(_))` ends polling with a result, `Ok(None)` means poll again,
/// `Err(_)` is terminal for the file.
pub fn interpret_poll_response(status: StatusCode, body: &[u8]) -> Result<Option<AnalyzeResult>> {
    match status {
        StatusCode::OK => {
            let parsed: AnalysisStatus = match serde_json::from_slice(body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Failed to parse poll response body, trying again: {}", e);
                    return Ok(None);
                }
            };

            match parsed.status {
                JobStatus::Succeeded => match parsed.analyze_result {
                    Some(result) => {
                        debug!(documents = result.documents.len(), "Analysis succeeded");
                        Ok(Some(result))
                    }
                    None => Err(Error::Analysis(
                        "analysis succeeded but analyzeResult is missing".to_string(),
                    )),
                },
                JobStatus::Running => {
                    trace!("Analysis running...");
                    Ok(None)
                }
                other => {
                    warn!(
                        status = ?other,
                        body = %String::from_utf8_lossy(body),
                        "Unexpected poll response, trying again"
                    );
                    Ok(None)
                }
            }
        }
        StatusCode::TOO_MANY_REQUESTS => {
            debug!("Too many requests, trying again");
            Ok(None)
        }
        other => {
            debug!(status = %other, "Unexpected status code while polling, trying again");
            Ok(None)
        }
    }
}

/// HTTP client for the analysis service
pub struct AnalysisClient {
    client: Client,
    analyze_url: Url,
    api_key: String,
    poll_interval: Duration,
}

impl AnalysisClient {
    /// Create a client for the given endpoint and subscription key
    pub fn new(config: &AnalysisConfig, endpoint: &str, api_key: String) -> Result<Self> {
        let analyze_url = build_analyze_url(
            endpoint,
            &config.path_prefix,
            &config.model_id,
            &config.api_version,
        )?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            analyze_url,
            api_key,
            poll_interval: config.poll_interval(),
        })
    }

    pub fn analyze_url(&self) -> &Url {
        &self.analyze_url
    }

    /// Submit the raw file bytes; returns the job's polling URL
    async fn submit(&self, path: &Path) -> Result<Url> {
        let content = tokio::fs::read(path).await?;

        trace!(bytes = content.len(), "Submitting file for analysis");
        let response = self
            .client
            .post(self.analyze_url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .body(content)
            .send()
            .await
            .map_err(|e| Error::Analysis(format!("submission failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Analysis(format!(
                "submission rejected with status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let location = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                Error::Analysis(format!("{} header missing", OPERATION_LOCATION_HEADER))
            })?;
        debug!(operation_location = %location, "Analysis submitted");

        match Url::parse(location) {
            Ok(url) => Ok(url),
            Err(_) => Ok(self.analyze_url.join(location)?),
        }
    }

    /// Perform one poll; transport failures count as "not done yet"
    async fn poll_once(&self, operation: &Url) -> Result<Option<AnalyzeResult>> {
        let response = match self
            .client
            .get(operation.clone())
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to poll analysis status, trying again: {}", e);
                return Ok(None);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read poll response body, trying again: {}", e);
                return Ok(None);
            }
        };

        interpret_poll_response(status, &body)
    }

    async fn poll_until_complete(
        &self,
        operation: &Url,
        cancel: &CancellationToken,
    ) -> Result<AnalyzeResult> {
        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                polled = self.poll_once(operation) => polled?,
            };
            if let Some(result) = polled {
                return Ok(result);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for AnalysisClient {
    async fn analyze(&self, path: &Path, cancel: &CancellationToken) -> Result<AnalyzeResult> {
        let operation = self.submit(path).await?;
        let result = self.poll_until_complete(&operation, cancel).await?;
        debug!(
            documents = result.documents.len(),
            "Analysis done for {}",
            path.display()
        );
        Ok(result)
    }
}
