//! Structured logging schema and field name constants for plasmoscan.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by standardized names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (sign-in/out, batch start/end) |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-image iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "auth", "pipeline", "db", "vault", "analysis"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "session_manager", "batch_runner", "quality", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "login", "register", "run_batch", "assess"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// User UUID being operated on.
pub const USER_ID: &str = "user_id";

/// Batch job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Sample identifier a batch belongs to.
pub const SAMPLE_ID: &str = "sample_id";

/// Local image reference.
pub const IMAGE_URI: &str = "image_uri";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of images in a selection or batch.
pub const IMAGE_COUNT: &str = "image_count";

/// Quality score assigned to an image.
pub const SCORE: &str = "score";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
