//! SQLite storage layer for Claimguard.
//!
//! Provides:
//! - Schema initialization for claims and grants
//! - Connection pragmas applied to every pooled connection
//! - A bounded worker pool that runs units of work off the caller's thread

pub mod executor;
pub mod schema;

pub use executor::{StorageError, StorageExecutor, StorageFuture};
