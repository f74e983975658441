//! Error types for plasmoscan.

use thiserror::Error;

/// Result type alias using plasmoscan's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for plasmoscan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid input, rejected before any state mutation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Selection contained no images
    #[error("No images selected")]
    EmptySelection,

    /// One or more images scored below the quality threshold and no
    /// override was given
    #[error("{count} image(s) scored below quality threshold {threshold}")]
    QualityBelowThreshold {
        threshold: u8,
        count: usize,
        uris: Vec<String>,
    },

    /// Email/password pair did not match a known record
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Biometric sample did not match any enrolled user
    #[error("Biometric sample not recognized")]
    BiometricNotRecognized,

    /// Registration email collides with an existing record
    #[error("Email already in use: {0}")]
    EmailAlreadyInUse(String),

    /// Biometric enrollment attempted without a pending registration or
    /// authenticated session
    #[error("No active registration or session for biometric enrollment")]
    NoActiveRegistration,

    /// Biometric enrollment failed
    #[error("Biometric enrollment failed: {0}")]
    EnrollmentFailed(String),

    /// Batch summary requested before the job completed
    #[error("Batch job {0} is not completed")]
    JobNotCompleted(uuid::Uuid),

    /// A batch job can only be run once
    #[error("Batch job {0} has already been run")]
    JobAlreadyRan(uuid::Uuid),

    /// Secure credential store read/write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Image quality assessment failed
    #[error("Assessment error: {0}")]
    Assessment(String),

    /// Analysis service call failed
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// External call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}

impl Error {
    /// Whether the caller may retry the same operation and expect it to
    /// succeed with corrected input (user-facing, recoverable).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::EmptySelection
                | Error::QualityBelowThreshold { .. }
                | Error::InvalidCredentials
                | Error::BiometricNotRecognized
                | Error::EmailAlreadyInUse(_)
                | Error::NoActiveRegistration
                | Error::EnrollmentFailed(_)
        )
    }
}
