//! Domain model types shared across plasmoscan crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

// =============================================================================
// USERS & SESSIONS
// =============================================================================

/// Clinical role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Prepares and scans smears; default role for field devices
    LabTechnician,
    /// Reviews results and signs off on diagnoses
    Doctor,
    /// Manages devices and accounts
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LabTechnician => write!(f, "lab_technician"),
            Self::Doctor => write!(f, "doctor"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lab_technician" => Ok(Self::LabTechnician),
            "doctor" => Ok(Self::Doctor),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

/// Stored user account record.
///
/// The `password_hash` is an Argon2 PHC string; the plaintext password never
/// reaches this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    /// Stored normalized (lower-case).
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub has_biometric_enrollment: bool,
    /// Opaque template produced by the biometric verifier at enrollment.
    pub biometric_template: Option<Vec<u8>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The currently authenticated actor.
///
/// At most one Session exists per process. Existence implies a successful
/// credential or biometric verification; it is persisted to the credential
/// store on creation and cleared on logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub role: UserRole,
    pub has_biometric_enrollment: bool,
    pub logged_in_at: DateTime<Utc>,
}

impl Session {
    /// Build a session for a user record at the current instant.
    pub fn for_user(user: &UserRecord) -> Self {
        Self {
            user_id: user.id,
            display_name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            has_biometric_enrollment: user.has_biometric_enrollment,
            logged_in_at: Utc::now(),
        }
    }
}

/// Secret string zeroized on drop.
///
/// Debug output is redacted so secrets cannot leak through logs.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret material. Callers must not persist the reference.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Transient bridge between account creation and biometric enrollment.
///
/// Held in memory only. Dropped (and its password zeroized) once enrollment
/// completes or is skipped.
#[derive(Debug)]
pub struct PendingRegistration {
    pub user_id: Uuid,
    pub email: String,
    pub password: Secret,
    pub role: UserRole,
}

/// Non-secret view returned to callers after `register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationHandle {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Raw biometric capture handed to the verifier. Opaque to the core.
#[derive(Debug, Clone)]
pub struct BiometricSample {
    pub data: Vec<u8>,
}

impl BiometricSample {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

// =============================================================================
// IMAGES & QUALITY
// =============================================================================

/// Smear preparation type for a captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    ThickSmear,
    ThinSmear,
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThickSmear => write!(f, "thick_smear"),
            Self::ThinSmear => write!(f, "thin_smear"),
        }
    }
}

/// Well-known quality issue tags emitted by assessors.
pub mod issue_tags {
    pub const BLUR: &str = "blur";
    pub const LOW_RESOLUTION: &str = "low_resolution";
    pub const UNDEREXPOSED: &str = "underexposed";
    pub const OVEREXPOSED: &str = "overexposed";
    pub const LOW_CONTRAST: &str = "low_contrast";
    pub const UNREADABLE: &str = "unreadable";
    /// The assessor itself failed or timed out; conservative placeholder.
    pub const ASSESSMENT_FAILED: &str = "assessment_failed";
}

/// Usability verdict for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// 0..=100, higher is better.
    pub score: u8,
    /// Ordered issue tags; empty when the image is clean.
    pub issues: Vec<String>,
}

impl QualityReport {
    pub fn new(score: u8, issues: Vec<String>) -> Self {
        Self {
            score: score.min(100),
            issues,
        }
    }

    /// Conservative placeholder used when assessment itself fails.
    pub fn assessment_failed() -> Self {
        Self {
            score: 0,
            issues: vec![issue_tags::ASSESSMENT_FAILED.to_string()],
        }
    }

    pub fn is_acceptable(&self, threshold: u8) -> bool {
        self.score >= threshold
    }
}

/// One locally-sourced image awaiting or having undergone quality assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedImage {
    /// Opaque local reference (file path or platform URI).
    pub uri: String,
    pub sample_type: SampleType,
    /// None until assessed.
    pub quality: Option<QualityReport>,
}

impl CapturedImage {
    pub fn new(uri: impl Into<String>, sample_type: SampleType) -> Self {
        Self {
            uri: uri.into(),
            sample_type,
            quality: None,
        }
    }
}

// =============================================================================
// BATCH JOBS & RESULTS
// =============================================================================

/// Lifecycle state of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Per-image diagnostic result from the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image_uri: String,
    /// 0..=100.
    pub confidence: u8,
    pub parasites_detected: bool,
    /// Meaningful only when `parasites_detected`.
    pub parasite_count: u32,
    pub rbc_count: u32,
    pub completed_at: DateTime<Utc>,
}

/// Outcome slot for one image within a batch.
///
/// A failed analysis occupies its slot rather than being omitted, so
/// `results.len()` always tracks the cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Analyzed(AnalysisResult),
    Failed { image_uri: String, reason: String },
}

impl AnalysisOutcome {
    pub fn image_uri(&self) -> &str {
        match self {
            Self::Analyzed(r) => &r.image_uri,
            Self::Failed { image_uri, .. } => image_uri,
        }
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self, Self::Analyzed(_))
    }

    pub fn as_analyzed(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Analyzed(r) => Some(r),
            Self::Failed { .. } => None,
        }
    }
}

/// One run of sequential analysis over a set of images for one sample.
///
/// Invariants while Running: `results.len() == current_index`, and exactly
/// one image is in flight to the analysis service at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub sample_id: String,
    pub sample_type: SampleType,
    /// Order is significant and preserved through the run.
    pub images: Vec<CapturedImage>,
    pub state: JobState,
    /// 0-based cursor; advances only after a slot's outcome is appended.
    pub current_index: usize,
    pub results: Vec<AnalysisOutcome>,
    pub created_at: DateTime<Utc>,
}

impl BatchJob {
    /// Create an Idle job over a non-empty ordered image set.
    pub fn new(
        sample_id: impl Into<String>,
        sample_type: SampleType,
        images: Vec<CapturedImage>,
    ) -> Result<Self> {
        if images.is_empty() {
            return Err(Error::EmptySelection);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            sample_id: sample_id.into(),
            sample_type,
            images,
            state: JobState::Idle,
            current_index: 0,
            results: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn total(&self) -> usize {
        self.images.len()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Completed | JobState::Cancelled)
    }

    /// Aggregate view over a Completed job's results.
    ///
    /// Fails with `JobNotCompleted` for any other state; cancelled jobs never
    /// expose partial results through this path.
    pub fn summary(&self) -> Result<BatchSummary> {
        if self.state != JobState::Completed {
            return Err(Error::JobNotCompleted(self.id));
        }
        let mut analyzed = 0usize;
        let mut failed = 0usize;
        let mut positive = 0usize;
        let mut total_parasites = 0u64;
        for outcome in &self.results {
            match outcome {
                AnalysisOutcome::Analyzed(r) => {
                    analyzed += 1;
                    if r.parasites_detected {
                        positive += 1;
                        total_parasites += u64::from(r.parasite_count);
                    }
                }
                AnalysisOutcome::Failed { .. } => failed += 1,
            }
        }
        Ok(BatchSummary {
            total_images: self.images.len(),
            analyzed,
            failed,
            positive,
            total_parasites,
        })
    }
}

/// Derived, read-only aggregate over a Completed batch. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_images: usize,
    pub analyzed: usize,
    pub failed: usize,
    /// Images with `parasites_detected`.
    pub positive: usize,
    /// Sum of `parasite_count` across positive images.
    pub total_parasites: u64,
}
