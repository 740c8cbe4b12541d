//! Configuration parsing for Claimguard.
//!
//! Supports:
//! - CLI arguments via clap (flattened into the `claimctl` command line)
//! - Environment variable overrides
//! - Defaults matching the reference protection tunables

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Storage and protection settings.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    #[arg(long, env = "CLAIMGUARD_DATABASE", default_value = "./data/claims.db")]
    pub database: PathBuf,

    /// Number of pooled connections (and storage worker threads)
    #[arg(
        long,
        env = "CLAIMGUARD_POOL_SIZE",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub pool_size: u32,

    /// How long to wait for a free pooled connection, in milliseconds
    #[arg(
        long,
        env = "CLAIMGUARD_CONNECTION_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub connection_timeout_ms: u64,

    /// Grace period for in-flight storage work on shutdown, in seconds
    #[arg(long, env = "CLAIMGUARD_SHUTDOWN_GRACE_SECS", default_value_t = 60)]
    pub shutdown_grace_secs: u64,

    /// Name prefix for storage worker threads
    #[arg(long, env = "CLAIMGUARD_WORKER_NAME", default_value = "claimguard-storage")]
    pub worker_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// Radius checked for natural (unattributed) effects
    #[arg(long, env = "CLAIMGUARD_NATURAL_RADIUS", default_value_t = 8)]
    pub natural_radius: i32,

    /// Radius checked for breaking and interacting
    #[arg(long, env = "CLAIMGUARD_READ_RADIUS", default_value_t = 32)]
    pub read_radius: i32,

    /// Radius checked for placing
    #[arg(long, env = "CLAIMGUARD_WRITE_RADIUS", default_value_t = 65)]
    pub write_radius: i32,

    /// Days a permanent claim keeps protecting after its last update
    #[arg(long, env = "CLAIMGUARD_PROTECTION_DAYS", default_value_t = 10)]
    pub protection_days: u32,

    /// Radius searched when counting blocks toward promotion
    #[arg(long, env = "CLAIMGUARD_PROMOTION_SEARCH_RADIUS", default_value_t = 5)]
    pub promotion_search_radius: i32,

    /// Number of nearby blocks that turns temporary claims permanent
    #[arg(long, env = "CLAIMGUARD_PROMOTION_THRESHOLD", default_value_t = 26)]
    pub promotion_threshold: u32,
}

impl Config {
    /// Storage executor settings.
    pub fn storage(&self) -> StorageSettings {
        StorageSettings {
            database: self.database.clone(),
            pool_size: self.pool_size,
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            worker_name: self.worker_name.clone(),
        }
    }

    /// Registry tunables.
    pub fn protection(&self) -> ProtectionSettings {
        ProtectionSettings {
            natural_radius: self.natural_radius,
            read_radius: self.read_radius,
            write_radius: self.write_radius,
            protection_days: self.protection_days,
            promotion_search_radius: self.promotion_search_radius,
            promotion_threshold: self.promotion_threshold,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let storage = StorageSettings::default();
        let protection = ProtectionSettings::default();
        Self {
            database: storage.database,
            pool_size: storage.pool_size,
            connection_timeout_ms: storage.connection_timeout.as_millis() as u64,
            shutdown_grace_secs: storage.shutdown_grace.as_secs(),
            worker_name: storage.worker_name,
            log_level: "info".into(),
            otel_endpoint: None,
            natural_radius: protection.natural_radius,
            read_radius: protection.read_radius,
            write_radius: protection.write_radius,
            protection_days: protection.protection_days,
            promotion_search_radius: protection.promotion_search_radius,
            promotion_threshold: protection.promotion_threshold,
        }
    }
}

/// Settings for [`StorageExecutor`](crate::storage::StorageExecutor).
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub database: PathBuf,
    /// Pool size; also the number of worker threads.
    pub pool_size: u32,
    pub connection_timeout: Duration,
    pub shutdown_grace: Duration,
    /// Worker threads are named `<worker_name>-<n>`.
    pub worker_name: String,
}

impl StorageSettings {
    /// Default settings pointing at the given database file.
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("./data/claims.db"),
            pool_size: 10,
            connection_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(60),
            worker_name: "claimguard-storage".into(),
        }
    }
}

/// Tunables for [`ProtectionRegistry`](crate::protection::ProtectionRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionSettings {
    pub natural_radius: i32,
    pub read_radius: i32,
    pub write_radius: i32,
    pub protection_days: u32,
    pub promotion_search_radius: i32,
    pub promotion_threshold: u32,
}

impl ProtectionSettings {
    const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

    /// How long a permanent claim protects after its last update.
    pub fn protection_window_millis(&self) -> i64 {
        i64::from(self.protection_days) * Self::MILLIS_PER_DAY
    }
}

impl Default for ProtectionSettings {
    fn default() -> Self {
        let read_radius = 32;
        Self {
            natural_radius: 8,
            read_radius,
            write_radius: read_radius * 2 + 1,
            protection_days: 10,
            promotion_search_radius: 5,
            promotion_threshold: 26,
        }
    }
}
