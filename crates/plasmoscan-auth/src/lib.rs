//! # plasmoscan-auth
//!
//! Authentication and session lifecycle for plasmoscan.
//!
//! The [`SessionManager`] gates every other workflow: an unauthenticated
//! actor can only reach login and registration. It owns the single current
//! [`Session`], persists it through the credential store, and notifies the
//! UI shell of state changes over the event bus.
//!
//! [`Session`]: plasmoscan_core::Session

pub mod hash;
pub mod manager;

pub use hash::{hash_password, verify_password};
pub use manager::SessionManager;
