//! Core traits for plasmoscan abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// USER REPOSITORY
// =============================================================================

/// Repository for user account records.
///
/// The session manager is the only writer. Emails are stored normalized
/// (lower-case); implementations must enforce uniqueness and surface a
/// duplicate as `Error::EmailAlreadyInUse`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a record by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Look up a record by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// Insert a new record. Fails with `EmailAlreadyInUse` on collision.
    async fn insert(&self, record: &UserRecord) -> Result<()>;

    /// Record a successful login.
    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Attach a biometric template and mark the record enrolled.
    async fn set_biometric(&self, id: Uuid, template: &[u8]) -> Result<()>;
}

// =============================================================================
// SECURE CREDENTIAL STORE
// =============================================================================

/// Durable secure key/value store for session state.
///
/// Single-writer resource: only the session manager writes, and only on
/// login/registration/enrollment/logout. Reads happen at process start.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a value, or None if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value. All-or-nothing: a failure must leave the previous
    /// value intact.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a value. Idempotent.
    async fn delete(&self, key: &str) -> Result<()>;
}

// =============================================================================
// BIOMETRIC VERIFIER
// =============================================================================

/// Platform biometric capture/match collaborator.
///
/// Matching is template-based per user. A no-match must never be treated as
/// an authentication.
#[async_trait]
pub trait BiometricVerifier: Send + Sync {
    /// Register a template for `user_id` from a captured sample and return
    /// it for portable storage alongside the user record.
    async fn enroll(&self, user_id: Uuid, sample: &BiometricSample) -> Result<Vec<u8>>;

    /// Match a sample against enrolled templates. None on no-match.
    async fn identify(&self, sample: &BiometricSample) -> Result<Option<Uuid>>;
}

// =============================================================================
// IMAGE QUALITY ASSESSOR
// =============================================================================

/// Scores an image's suitability for analysis.
///
/// Contract: returns within a bounded time or fails explicitly; never hangs.
#[async_trait]
pub trait QualityAssessor: Send + Sync {
    async fn assess(&self, uri: &str) -> Result<QualityReport>;
}

// =============================================================================
// ANALYSIS SERVICE
// =============================================================================

/// Per-image diagnostic inference collaborator.
///
/// One call per image; batching is the pipeline's responsibility, not the
/// service's.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, uri: &str, sample_type: SampleType) -> Result<AnalysisResult>;
}
