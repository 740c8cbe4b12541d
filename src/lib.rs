//! Claimguard: a spatial claim registry for shared voxel worlds.
//!
//! Given a block coordinate and an optional acting identity, Claimguard
//! answers whether a pending action is blocked because the coordinate lies
//! near a claim owned by someone else. Claims and access grants live in
//! SQLite and every storage call runs on a bounded worker pool.
//!
//! # Architecture
//!
//! - **Bounded storage pool**: one r2d2 connection per worker thread
//! - **Delegated access**: grantors can exempt grantees from their claims
//! - **Earned protection**: claims start temporary and are promoted once
//!   enough blocks cluster together
//! - **Fail-closed**: any storage failure during a check denies the action
//!
//! # Modules
//!
//! - [`access`]: Player-to-player access grants
//! - [`clock`]: Wall clock and manual clock for tests
//! - [`config`]: CLI and environment configuration
//! - [`observability`]: Metrics and tracing setup
//! - [`protection`]: Claim registry, query builders, action guard
//! - [`service`]: Wiring of the pieces above
//! - [`storage`]: SQLite schema and the storage executor

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // storage::StorageError is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::similar_names,              // min_x/max_x are fine
    clippy::too_many_lines              // Some functions are inherently long
)]

pub mod access;
pub mod clock;
pub mod config;
pub mod observability;
pub mod protection;
pub mod service;
pub mod storage;

pub use access::AccessList;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ProtectionSettings, StorageSettings};
pub use protection::{
    ActionGuard, ActionKind, BoundingBox, Claim, Coordinate, Placement, ProtectionRegistry,
    Verdict,
};
pub use service::ProtectionService;
pub use storage::{StorageError, StorageExecutor, StorageFuture};

/// Identity of a player (or any other actor that can own claims).
pub type Identity = uuid::Uuid;

/// Identifier of a world.
pub type WorldId = uuid::Uuid;
