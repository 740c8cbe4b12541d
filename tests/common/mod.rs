//! Test utilities for Claimguard integration tests.
//!
//! Provides:
//! - A service backed by a temporary database and a manual clock
//! - Helpers for seeding claims with exact timestamps

#![allow(dead_code)]

use claimguard::config::{ProtectionSettings, StorageSettings};
use claimguard::{Coordinate, Identity, ManualClock, ProtectionService, StorageFuture, WorldId};
use rusqlite::params;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Test fixture that owns a temporary database and the service on top.
///
/// The directory is removed when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
    pub clock: Arc<ManualClock>,
    pub service: ProtectionService,
}

impl TestFixture {
    /// Fixture with default protection tunables.
    pub fn new() -> Self {
        Self::with_settings(ProtectionSettings::default())
    }

    pub fn with_settings(protection: ProtectionSettings) -> Self {
        claimguard::observability::tracing::init_test_tracing();

        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("claims.db");
        let mut storage = StorageSettings::new(&db_path);
        storage.pool_size = 4;
        storage.shutdown_grace = Duration::from_secs(5);
        storage.worker_name = "test-storage".into();

        let clock = Arc::new(ManualClock::starting_now());
        let service = ProtectionService::open_with_clock(&storage, protection, clock.clone())
            .expect("failed to open service");

        Self {
            temp_dir,
            db_path,
            clock,
            service,
        }
    }

    pub fn now(&self) -> i64 {
        use claimguard::Clock;
        self.clock.now_millis()
    }

    /// Insert a claim row directly, bypassing promotion logic.
    pub fn seed_claim(
        &self,
        owner: Identity,
        coordinate: Coordinate,
        last_modified: i64,
        temporary: bool,
    ) {
        self.insert_claim(owner, coordinate, last_modified, temporary)
            .wait()
            .expect("failed to seed claim");
    }

    /// Awaitable form of [`seed_claim`](Self::seed_claim) for async tests.
    pub fn insert_claim(
        &self,
        owner: Identity,
        coordinate: Coordinate,
        last_modified: i64,
        temporary: bool,
    ) -> StorageFuture<()> {
        self.service.executor.run(move |conn| {
            conn.execute(
                "INSERT INTO claims (world_id, x, y, z, last_modified, temporary, owner_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    coordinate.world.to_string(),
                    coordinate.x,
                    coordinate.y,
                    coordinate.z,
                    last_modified,
                    temporary,
                    owner.to_string(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn claim_count(&self) -> i64 {
        self.service
            .executor
            .submit(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM claims", [], |row| row.get(0))?)
            })
            .wait()
            .expect("failed to count claims")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestFixture {
    fn drop(&mut self) {
        self.service.shutdown();
    }
}

pub fn new_world() -> WorldId {
    Uuid::now_v7()
}

pub fn new_player() -> Identity {
    Uuid::now_v7()
}

/// `count` distinct coordinates packed into a cube around `origin`, all
/// within `radius` of it.
pub fn cluster(origin: Coordinate, count: usize, radius: i32) -> Vec<Coordinate> {
    let span = -radius..=radius;
    let mut coordinates = Vec::with_capacity(count);
    'outer: for dx in span.clone() {
        for dy in span.clone() {
            for dz in span.clone() {
                if coordinates.len() == count {
                    break 'outer;
                }
                coordinates.push(origin.offset(dx, dy, dz));
            }
        }
    }
    assert_eq!(coordinates.len(), count, "radius too small for cluster");
    coordinates
}
