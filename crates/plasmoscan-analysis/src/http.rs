//! HTTP analysis service backend.
//!
//! Submits one image reference per request to the field-station analysis
//! server. Batching is the pipeline's responsibility; this client knows
//! nothing about batches.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use plasmoscan_core::{defaults, AnalysisBackend, AnalysisResult, Error, Result, SampleType};

/// Default analysis service endpoint.
pub const DEFAULT_ANALYSIS_URL: &str = defaults::ANALYSIS_URL;

/// Default per-request timeout (seconds).
pub const ANALYSIS_TIMEOUT_SECS: u64 = defaults::ANALYSIS_TIMEOUT_SECS;

/// HTTP client for the analysis service.
pub struct HttpAnalysisBackend {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    image_uri: &'a str,
    sample_type: SampleType,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    confidence: u8,
    parasites_detected: bool,
    parasite_count: u32,
    rbc_count: u32,
}

impl HttpAnalysisBackend {
    /// Create a backend with default settings.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_ANALYSIS_URL.to_string(), ANALYSIS_TIMEOUT_SECS)
    }

    /// Create a backend with custom endpoint and timeout.
    pub fn with_config(base_url: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PLASMOSCAN_ANALYSIS_URL` | `http://127.0.0.1:8090` |
    /// | `PLASMOSCAN_ANALYSIS_TIMEOUT_SECS` | `60` |
    pub fn from_env() -> Self {
        let base_url = std::env::var("PLASMOSCAN_ANALYSIS_URL")
            .unwrap_or_else(|_| DEFAULT_ANALYSIS_URL.to_string());
        let timeout_secs = std::env::var("PLASMOSCAN_ANALYSIS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(ANALYSIS_TIMEOUT_SECS);
        Self::with_config(base_url, timeout_secs)
    }
}

impl Default for HttpAnalysisBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn analyze(&self, uri: &str, sample_type: SampleType) -> Result<AnalysisResult> {
        let start = Instant::now();
        let url = format!("{}/v1/analyses", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&AnalyzeRequest {
                image_uri: uri,
                sample_type,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                subsystem = "analysis",
                component = "http",
                op = "analyze",
                image_uri = %uri,
                status = %status,
                "Analysis request rejected"
            );
            return Err(Error::Analysis(format!(
                "analysis service returned {status}: {body}"
            )));
        }

        let parsed: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| Error::Analysis(format!("malformed analysis response: {e}")))?;

        debug!(
            subsystem = "analysis",
            component = "http",
            op = "analyze",
            image_uri = %uri,
            duration_ms = start.elapsed().as_millis() as u64,
            parasites_detected = parsed.parasites_detected,
            "Analysis complete"
        );

        Ok(AnalysisResult {
            image_uri: uri.to_string(),
            confidence: parsed.confidence.min(100),
            parasites_detected: parsed.parasites_detected,
            parasite_count: parsed.parasite_count,
            rbc_count: parsed.rbc_count,
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_analyze_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/analyses"))
            .and(body_partial_json(serde_json::json!({
                "image_uri": "smear-001.jpg",
                "sample_type": "thin_smear",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "confidence": 93,
                "parasites_detected": true,
                "parasite_count": 14,
                "rbc_count": 5120,
            })))
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::with_config(server.uri(), 5);
        let result = backend
            .analyze("smear-001.jpg", SampleType::ThinSmear)
            .await
            .unwrap();

        assert_eq!(result.image_uri, "smear-001.jpg");
        assert_eq!(result.confidence, 93);
        assert!(result.parasites_detected);
        assert_eq!(result.parasite_count, 14);
        assert_eq!(result.rbc_count, 5120);
    }

    #[tokio::test]
    async fn test_analyze_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/analyses"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::with_config(server.uri(), 5);
        let err = backend
            .analyze("smear-001.jpg", SampleType::ThickSmear)
            .await
            .unwrap_err();

        match err {
            Error::Analysis(msg) => assert!(msg.contains("500")),
            other => panic!("expected Analysis error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/analyses"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(serde_json::json!({
                        "confidence": 0,
                        "parasites_detected": false,
                        "parasite_count": 0,
                        "rbc_count": 0,
                    })),
            )
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::with_config(server.uri(), 1);
        let err = backend
            .analyze("smear-001.jpg", SampleType::ThinSmear)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_analyze_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/analyses"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::with_config(server.uri(), 5);
        let err = backend
            .analyze("smear-001.jpg", SampleType::ThinSmear)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Analysis(_)));
    }
}
