//! # plasmoscan-pipeline
//!
//! Batch capture/upload pipeline: concurrent quality assessment during
//! selection, then strictly sequential submission of confirmed images to
//! the analysis service with progress events and cooperative cancellation.
//!
//! Within one batch, `results[i]` always corresponds to `images[i]` — order
//! is preserved by construction, never by post-hoc sorting.

pub mod runner;
pub mod selection;

pub use runner::{summarize, BatchEvent, BatchHandle, BatchRunner, RunnerConfig};
pub use selection::{apply_reports, assess_selection, confirm_selection, SelectionConfig};
