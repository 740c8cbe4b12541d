//! Wiring of the storage executor, registry, access list and guard.
//!
//! Hosts open one [`ProtectionService`] at startup, hand clones of its parts
//! to their event handlers, and call [`ProtectionService::shutdown`] when
//! they stop.

use std::sync::Arc;

use crate::access::AccessList;
use crate::clock::{Clock, SystemClock};
use crate::config::{ProtectionSettings, StorageSettings};
use crate::protection::{ActionGuard, ProtectionRegistry};
use crate::storage::{StorageError, StorageExecutor};

/// State shared by every caller of the oracle.
#[derive(Clone)]
pub struct ProtectionService {
    pub executor: StorageExecutor,
    pub registry: ProtectionRegistry,
    pub access: AccessList,
    pub guard: ActionGuard,
}

impl ProtectionService {
    /// Open storage and build every component on top of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(
        storage: &StorageSettings,
        protection: ProtectionSettings,
    ) -> Result<Self, StorageError> {
        Self::open_with_clock(storage, protection, Arc::new(SystemClock))
    }

    /// Like [`open`](Self::open), reading time from `clock`.
    pub fn open_with_clock(
        storage: &StorageSettings,
        protection: ProtectionSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let executor = StorageExecutor::open(storage)?;
        let registry =
            ProtectionRegistry::with_clock(executor.clone(), protection, Arc::clone(&clock));
        let access = AccessList::with_clock(executor.clone(), clock);
        let guard = ActionGuard::new(registry.clone());

        tracing::info!(
            natural_radius = protection.natural_radius,
            read_radius = protection.read_radius,
            write_radius = protection.write_radius,
            protection_days = protection.protection_days,
            promotion_search_radius = protection.promotion_search_radius,
            promotion_threshold = protection.promotion_threshold,
            "Protection service ready"
        );

        Ok(Self {
            executor,
            registry,
            access,
            guard,
        })
    }

    /// Drain and stop the storage executor.
    ///
    /// Blocks for up to the configured shutdown grace period.
    pub fn shutdown(&self) {
        self.executor.shutdown();
        tracing::info!("Protection service stopped");
    }
}
