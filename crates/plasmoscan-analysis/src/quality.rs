//! Local image quality assessment.
//!
//! Heuristic scoring over the decoded image: resolution, exposure,
//! contrast, and sharpness. Unreadable input degrades to a zero score with
//! issue tags rather than failing the caller; only an unreadable *file*
//! (missing, permission) is an explicit assessment error.

use async_trait::async_trait;
use tracing::{debug, trace};

use plasmoscan_core::{
    defaults, issue_tags, Error, QualityAssessor, QualityReport, Result,
};

/// Luma mean below which an image is tagged underexposed.
const UNDEREXPOSED_MEAN: f64 = 60.0;

/// Luma mean above which an image is tagged overexposed.
const OVEREXPOSED_MEAN: f64 = 200.0;

/// Luma standard deviation below which contrast is considered too low to
/// distinguish cells from background.
const LOW_CONTRAST_STDDEV: f64 = 25.0;

/// Mean absolute horizontal gradient below which the image is tagged
/// blurred.
const BLUR_GRADIENT: f64 = 4.0;

/// Heuristic on-device [`QualityAssessor`].
pub struct LocalQualityAssessor {
    min_edge_px: u32,
}

impl LocalQualityAssessor {
    pub fn new() -> Self {
        Self {
            min_edge_px: defaults::MIN_IMAGE_EDGE_PX,
        }
    }

    /// Override the minimum usable edge length (pixels).
    pub fn with_min_edge(mut self, px: u32) -> Self {
        self.min_edge_px = px;
        self
    }
}

impl Default for LocalQualityAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QualityAssessor for LocalQualityAssessor {
    async fn assess(&self, uri: &str) -> Result<QualityReport> {
        let bytes = tokio::fs::read(uri)
            .await
            .map_err(|e| Error::Assessment(format!("cannot read image {uri}: {e}")))?;

        let min_edge = self.min_edge_px;
        let owned_uri = uri.to_string();
        let report = tokio::task::spawn_blocking(move || {
            let report = score_bytes(&bytes, min_edge);
            trace!(
                subsystem = "analysis",
                component = "quality",
                image_uri = %owned_uri,
                score = report.score,
                "Image scored"
            );
            report
        })
        .await
        .map_err(|e| Error::Internal(format!("assessment task failed: {e}")))?;

        debug!(
            subsystem = "analysis",
            component = "quality",
            op = "assess",
            image_uri = %uri,
            score = report.score,
            issue_count = report.issues.len(),
            "Assessment complete"
        );
        Ok(report)
    }
}

/// Score decoded image bytes. Undecodable input yields the floor score with
/// explanatory tags instead of an error.
fn score_bytes(bytes: &[u8], min_edge_px: u32) -> QualityReport {
    let Ok(decoded) = image::load_from_memory(bytes) else {
        return QualityReport::new(
            0,
            vec![
                issue_tags::UNREADABLE.to_string(),
                issue_tags::LOW_RESOLUTION.to_string(),
            ],
        );
    };

    let luma = decoded.to_luma8();
    let (width, height) = luma.dimensions();
    if width == 0 || height == 0 {
        return QualityReport::new(
            0,
            vec![
                issue_tags::UNREADABLE.to_string(),
                issue_tags::LOW_RESOLUTION.to_string(),
            ],
        );
    }

    let mut issues = Vec::new();
    let mut score: i32 = 100;

    if width.min(height) < min_edge_px {
        issues.push(issue_tags::LOW_RESOLUTION.to_string());
        score -= 40;
    }

    let pixel_count = (width as u64 * height as u64) as f64;
    let sum: u64 = luma.pixels().map(|p| u64::from(p[0])).sum();
    let mean = sum as f64 / pixel_count;

    if mean < UNDEREXPOSED_MEAN {
        issues.push(issue_tags::UNDEREXPOSED.to_string());
        score -= 20;
    } else if mean > OVEREXPOSED_MEAN {
        issues.push(issue_tags::OVEREXPOSED.to_string());
        score -= 20;
    }

    let variance = luma
        .pixels()
        .map(|p| {
            let d = f64::from(p[0]) - mean;
            d * d
        })
        .sum::<f64>()
        / pixel_count;
    if variance.sqrt() < LOW_CONTRAST_STDDEV {
        issues.push(issue_tags::LOW_CONTRAST.to_string());
        score -= 20;
    }

    if mean_horizontal_gradient(&luma) < BLUR_GRADIENT {
        issues.push(issue_tags::BLUR.to_string());
        score -= 25;
    }

    QualityReport::new(score.max(0) as u8, issues)
}

/// Mean absolute luma difference between horizontally adjacent pixels.
/// Cheap stand-in for focus measures; sharp smears have busy texture.
fn mean_horizontal_gradient(luma: &image::GrayImage) -> f64 {
    let (width, height) = luma.dimensions();
    if width < 2 {
        return 0.0;
    }
    let mut total: u64 = 0;
    for y in 0..height {
        for x in 1..width {
            let a = i32::from(luma.get_pixel(x, y)[0]);
            let b = i32::from(luma.get_pixel(x - 1, y)[0]);
            total += a.abs_diff(b) as u64;
        }
    }
    total as f64 / ((width - 1) as u64 * height as u64) as f64
}
