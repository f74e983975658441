//! Centralized default constants for plasmoscan.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers. When adding new constants, place them in the appropriate
//! section and document the rationale for the chosen value.

// =============================================================================
// QUALITY ASSESSMENT
// =============================================================================

/// Minimum quality score for an image to pass the selection gate without an
/// explicit override.
pub const QUALITY_SCORE_THRESHOLD: u8 = 60;

/// Per-image assessment deadline. The assessor contract requires bounded
/// time; this is the enforcement ceiling.
pub const ASSESS_TIMEOUT_SECS: u64 = 10;

/// Minimum usable smear resolution (shorter edge, pixels).
pub const MIN_IMAGE_EDGE_PX: u32 = 480;

// =============================================================================
// ANALYSIS
// =============================================================================

/// Per-image analysis deadline. Exceeding it records a per-image failure,
/// never a batch abort.
pub const ANALYSIS_TIMEOUT_SECS: u64 = 60;

/// Default analysis service endpoint.
pub const ANALYSIS_URL: &str = "http://127.0.0.1:8090";

// =============================================================================
// EVENTS
// =============================================================================

/// Buffered capacity of the application event bus and per-job progress
/// channels. Slow consumers lag rather than block producers.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// SESSION & CREDENTIAL STORE
// =============================================================================

/// Credential store key holding the serialized current session.
pub const SESSION_STORE_KEY: &str = "plasmoscan.session";

/// Credential store key for the one-time onboarding-completed flag.
pub const ONBOARDING_STORE_KEY: &str = "plasmoscan.onboarding_complete";

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;
