//! # plasmoscan-core
//!
//! Core types, traits, and abstractions for the plasmoscan workflow engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other plasmoscan crates depend on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;
pub mod validate;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{AppEvent, EventBus};
pub use models::*;
pub use traits::*;
pub use validate::{normalize_email, validate_display_name, validate_password};
