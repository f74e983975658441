//! # plasmoscan-db
//!
//! SQLite database layer for plasmoscan.
//!
//! This crate provides:
//! - Connection pool management for the on-device database
//! - The [`UserRepository`] implementation backing the session manager
//! - An in-memory repository for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use plasmoscan_db::{create_pool, SqliteUserRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("sqlite://plasmoscan.db").await?;
//!     let users = SqliteUserRepository::new(pool).await?;
//!     let record = users.find_by_email("tech@clinic.example").await?;
//!     println!("{record:?}");
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod pool;
pub mod users;

// Re-export core types
pub use plasmoscan_core::*;

pub use memory::InMemoryUserRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use users::SqliteUserRepository;
