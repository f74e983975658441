//! Selection-stage quality assessment and confirmation.
//!
//! Assessment is the one concurrent stage of the pipeline: images have no
//! ordering dependency, so each gets its own task and results are keyed by
//! uri. A failed or timed-out assessment degrades to a conservative
//! placeholder for that image without disturbing the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

use plasmoscan_core::{
    defaults, BatchJob, CapturedImage, Error, QualityAssessor, QualityReport, Result, SampleType,
};

/// Configuration for the selection stage.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Minimum acceptable quality score.
    pub quality_threshold: u8,
    /// Per-image assessment deadline.
    pub assess_timeout: Duration,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            quality_threshold: defaults::QUALITY_SCORE_THRESHOLD,
            assess_timeout: Duration::from_secs(defaults::ASSESS_TIMEOUT_SECS),
        }
    }
}

impl SelectionConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PLASMOSCAN_QUALITY_THRESHOLD` | `60` | Minimum acceptable score |
    /// | `PLASMOSCAN_ASSESS_TIMEOUT_SECS` | `10` | Per-image assessment deadline |
    pub fn from_env() -> Self {
        let quality_threshold = std::env::var("PLASMOSCAN_QUALITY_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(defaults::QUALITY_SCORE_THRESHOLD);

        let assess_timeout_secs = std::env::var("PLASMOSCAN_ASSESS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::ASSESS_TIMEOUT_SECS);

        Self {
            quality_threshold,
            assess_timeout: Duration::from_secs(assess_timeout_secs),
        }
    }

    /// Set the quality threshold.
    pub fn with_quality_threshold(mut self, threshold: u8) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Set the per-image assessment deadline.
    pub fn with_assess_timeout(mut self, timeout: Duration) -> Self {
        self.assess_timeout = timeout;
        self
    }
}

/// Assess all images concurrently, keyed by uri.
///
/// Every input uri gets an entry: a failed, timed-out, or panicked
/// assessment yields [`QualityReport::assessment_failed`] for that uri and
/// never aborts the rest of the selection.
pub async fn assess_selection(
    assessor: Arc<dyn QualityAssessor>,
    uris: &[String],
    config: &SelectionConfig,
) -> HashMap<String, QualityReport> {
    let mut tasks = JoinSet::new();
    for uri in uris {
        let assessor = assessor.clone();
        let uri = uri.clone();
        let deadline = config.assess_timeout;
        tasks.spawn(async move {
            let outcome = timeout(deadline, assessor.assess(&uri)).await;
            (uri, outcome)
        });
    }

    let mut reports = HashMap::with_capacity(uris.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((uri, Ok(Ok(report)))) => {
                debug!(
                    subsystem = "pipeline",
                    component = "selection",
                    op = "assess",
                    image_uri = %uri,
                    score = report.score,
                    "Image assessed"
                );
                reports.insert(uri, report);
            }
            Ok((uri, Ok(Err(e)))) => {
                warn!(
                    subsystem = "pipeline",
                    component = "selection",
                    op = "assess",
                    image_uri = %uri,
                    error = %e,
                    "Assessment failed, using conservative placeholder"
                );
                reports.insert(uri, QualityReport::assessment_failed());
            }
            Ok((uri, Err(_elapsed))) => {
                warn!(
                    subsystem = "pipeline",
                    component = "selection",
                    op = "assess",
                    image_uri = %uri,
                    timeout_secs = config.assess_timeout.as_secs(),
                    "Assessment timed out, using conservative placeholder"
                );
                reports.insert(uri, QualityReport::assessment_failed());
            }
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "selection",
                    op = "assess",
                    error = %e,
                    "Assessment task failed"
                );
            }
        }
    }
    reports
}

/// Copy assessment reports onto the working image set.
pub fn apply_reports(images: &mut [CapturedImage], reports: &HashMap<String, QualityReport>) {
    for image in images {
        if let Some(report) = reports.get(&image.uri) {
            image.quality = Some(report.clone());
        }
    }
}

/// Confirm a selection and create an Idle [`BatchJob`].
///
/// The quality gate is a pipeline-level decision, not a rendering concern:
/// if any image scores below `threshold` (an unassessed image counts as
/// score 0) and `override_low_quality` is false, this fails with
/// `QualityBelowThreshold` listing the offending uris so the caller can
/// warn the user and ask for an explicit override. Images are never
/// silently dropped.
pub fn confirm_selection(
    sample_id: &str,
    sample_type: SampleType,
    images: Vec<CapturedImage>,
    threshold: u8,
    override_low_quality: bool,
) -> Result<BatchJob> {
    if images.is_empty() {
        return Err(Error::EmptySelection);
    }

    let below: Vec<String> = images
        .iter()
        .filter(|img| img.quality.as_ref().map(|q| q.score).unwrap_or(0) < threshold)
        .map(|img| img.uri.clone())
        .collect();

    if !below.is_empty() && !override_low_quality {
        return Err(Error::QualityBelowThreshold {
            threshold,
            count: below.len(),
            uris: below,
        });
    }

    BatchJob::new(sample_id, sample_type, images)
}
