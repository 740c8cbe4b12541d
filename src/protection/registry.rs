//! Protected-coordinate registry.
//!
//! Answers "who, if anyone, blocks this action here?" and maintains claims
//! as blocks are placed and destroyed. A claim starts temporary; once its
//! owner (together with the owner's grantors) has enough blocks clustered
//! around it, the whole cluster is promoted to permanent in the same
//! transaction that records the placement.

use rusqlite::{params, params_from_iter, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::geometry::{BoundingBox, Coordinate};
use super::guard::ActionKind;
use super::query::{
    ClaimFilter, Liveness, OwnerScope, DELETE_CLAIM, SELECT_CLAIM, UPSERT_CLAIM,
};
use crate::clock::{Clock, SystemClock};
use crate::config::ProtectionSettings;
use crate::observability::metrics::{record_check, record_placement};
use crate::storage::schema::decode_uuid;
use crate::storage::{StorageError, StorageExecutor, StorageFuture};
use crate::Identity;

/// A stored claim on one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub coordinate: Coordinate,
    pub owner: Identity,
    /// Epoch milliseconds of the last insert or update.
    pub last_modified: i64,
    pub temporary: bool,
}

impl Claim {
    /// Whether this claim blocks other actors at time `now`.
    pub fn is_active(&self, now: i64, protection_window_millis: i64) -> bool {
        !self.temporary && now - self.last_modified <= protection_window_millis
    }
}

/// Outcome of [`ProtectionRegistry::record_placement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Whether the placed block's claim is still temporary.
    pub temporary: bool,
    /// Other claims in the cluster promoted to permanent by this placement.
    pub promoted: usize,
}

/// Claims registry backed by the `claims` table.
#[derive(Clone)]
pub struct ProtectionRegistry {
    executor: StorageExecutor,
    settings: ProtectionSettings,
    clock: Arc<dyn Clock>,
}

impl ProtectionRegistry {
    pub fn new(executor: StorageExecutor, settings: ProtectionSettings) -> Self {
        Self::with_clock(executor, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        executor: StorageExecutor,
        settings: ProtectionSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            executor,
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &ProtectionSettings {
        &self.settings
    }

    /// Owner of an active claim within `radius` of `coordinate` that blocks
    /// `actor`.
    ///
    /// With no actor (a natural effect) any active claim blocks. With an
    /// actor, the actor's own claims and claims of anyone who granted the
    /// actor access are ignored. `None` means the action may proceed.
    pub fn check_owner(
        &self,
        coordinate: Coordinate,
        radius: i32,
        actor: Option<Identity>,
    ) -> StorageFuture<Option<Identity>> {
        self.check("custom", coordinate, radius, actor)
    }

    /// Check for breaking or interacting, using the read radius.
    pub fn check_owner_for_read(
        &self,
        coordinate: Coordinate,
        actor: Option<Identity>,
    ) -> StorageFuture<Option<Identity>> {
        self.check_owner_for(ActionKind::Read, coordinate, actor)
    }

    /// Check for placing, using the write radius.
    pub fn check_owner_for_write(
        &self,
        coordinate: Coordinate,
        actor: Option<Identity>,
    ) -> StorageFuture<Option<Identity>> {
        self.check_owner_for(ActionKind::Write, coordinate, actor)
    }

    /// Check for an unattributed effect (fluids, fire, growth), using the
    /// natural radius.
    pub fn check_owner_for_natural_action(
        &self,
        coordinate: Coordinate,
    ) -> StorageFuture<Option<Identity>> {
        self.check_owner_for(ActionKind::Natural, coordinate, None)
    }

    /// Check using the radius configured for `kind`.
    ///
    /// Natural actions are never attributed, so `actor` is ignored for them.
    pub fn check_owner_for(
        &self,
        kind: ActionKind,
        coordinate: Coordinate,
        actor: Option<Identity>,
    ) -> StorageFuture<Option<Identity>> {
        let actor = if kind == ActionKind::Natural { None } else { actor };
        self.check(kind.label(), coordinate, kind.radius(&self.settings), actor)
    }

    fn check(
        &self,
        kind: &'static str,
        coordinate: Coordinate,
        radius: i32,
        actor: Option<Identity>,
    ) -> StorageFuture<Option<Identity>> {
        let clock = Arc::clone(&self.clock);
        let window = self.settings.protection_window_millis();

        self.executor.submit(move |conn| {
            let started = Instant::now();
            let since = clock.now_millis() - window;
            let stmt = ClaimFilter::within(BoundingBox::around(coordinate, radius))
                .liveness(Liveness::Active { since })
                .scope(actor.map_or(OwnerScope::Anyone, OwnerScope::UntrustedBy))
                .select_owner();

            let owner: Option<String> = conn
                .prepare_cached(&stmt.sql)?
                .query_row(params_from_iter(stmt.params.iter()), |row| row.get(0))
                .optional()?;
            let owner = owner.map(|o| decode_uuid("owner_id", o)).transpose()?;

            record_check(kind, owner.is_some(), started.elapsed().as_secs_f64());
            tracing::debug!(
                kind,
                %coordinate,
                radius,
                actor = ?actor,
                owner = ?owner,
                "Checked claim ownership"
            );
            Ok(owner)
        })
    }

    /// Record that `owner` placed a tracked block at `coordinate`.
    ///
    /// Counts the owner's (and the owner's grantors') live claims around the
    /// coordinate, with the new block counting once. Below the promotion
    /// threshold the claim is stored temporary; at or above it the claim is
    /// stored permanent and every temporary claim of the same owners in the
    /// search box is promoted. All of it commits or none of it does.
    pub fn record_placement(
        &self,
        owner: Identity,
        coordinate: Coordinate,
    ) -> StorageFuture<Placement> {
        let clock = Arc::clone(&self.clock);
        let settings = self.settings;

        self.executor.submit(move |conn| {
            let now = clock.now_millis();
            let since = now - settings.protection_window_millis();
            let cluster = ClaimFilter::within(BoundingBox::around(
                coordinate,
                settings.promotion_search_radius,
            ))
            .scope(OwnerScope::TrustedBy(owner));

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let count = cluster
                .liveness(Liveness::ActiveOrTemporary { since })
                .except(coordinate)
                .count();
            let nearby: i64 = tx.query_row(
                &count.sql,
                params_from_iter(count.params.iter()),
                |row| row.get(0),
            )?;
            let temporary = nearby + 1 < i64::from(settings.promotion_threshold);

            tx.execute(
                UPSERT_CLAIM,
                params![
                    coordinate.world.to_string(),
                    coordinate.x,
                    coordinate.y,
                    coordinate.z,
                    now,
                    temporary,
                    owner.to_string(),
                ],
            )?;

            let promoted = if temporary {
                0
            } else {
                let promote = cluster.liveness(Liveness::Temporary).promote(now);
                tx.execute(&promote.sql, params_from_iter(promote.params.iter()))?
            };

            tx.commit()?;

            record_placement(temporary, promoted);
            tracing::debug!(
                %owner,
                %coordinate,
                nearby,
                temporary,
                promoted,
                "Recorded placement"
            );
            Ok(Placement {
                temporary,
                promoted,
            })
        })
    }

    /// Remove the claim at `coordinate`, if any.
    ///
    /// Returns whether a claim was removed.
    pub fn remove_one(&self, coordinate: Coordinate) -> StorageFuture<bool> {
        self.executor.submit(move |conn| {
            let removed = conn.prepare_cached(DELETE_CLAIM)?.execute(params![
                coordinate.world.to_string(),
                coordinate.x,
                coordinate.y,
                coordinate.z,
            ])?;
            Ok(removed > 0)
        })
    }

    /// Remove the claims at every coordinate in one transaction.
    ///
    /// Coordinates without a claim are skipped. Returns how many claims were
    /// removed.
    pub fn remove_many(
        &self,
        coordinates: impl IntoIterator<Item = Coordinate>,
    ) -> StorageFuture<usize> {
        let coordinates: Vec<Coordinate> = coordinates.into_iter().collect();

        self.executor.submit(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare_cached(DELETE_CLAIM)?;
                for coordinate in &coordinates {
                    removed += stmt.execute(params![
                        coordinate.world.to_string(),
                        coordinate.x,
                        coordinate.y,
                        coordinate.z,
                    ])?;
                }
            }
            tx.commit()?;

            tracing::debug!(
                requested = coordinates.len(),
                removed,
                "Removed claims"
            );
            Ok(removed)
        })
    }

    /// The claim stored at exactly `coordinate`, whatever its state.
    pub fn claim_at(&self, coordinate: Coordinate) -> StorageFuture<Option<Claim>> {
        self.executor.submit(move |conn| {
            conn.prepare_cached(SELECT_CLAIM)?
                .query_row(
                    params![
                        coordinate.world.to_string(),
                        coordinate.x,
                        coordinate.y,
                        coordinate.z,
                    ],
                    RawClaim::from_row,
                )
                .optional()?
                .map(RawClaim::decode)
                .transpose()
        })
    }

    /// Every claim within `radius` of `center`, whatever its state, ordered
    /// by x, y, z.
    pub fn claims_within(&self, center: Coordinate, radius: i32) -> StorageFuture<Vec<Claim>> {
        self.executor.submit(move |conn| {
            let stmt = ClaimFilter::within(BoundingBox::around(center, radius)).select_claims();
            let mut prepared = conn.prepare_cached(&stmt.sql)?;
            let raw = prepared
                .query_map(params_from_iter(stmt.params.iter()), RawClaim::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            raw.into_iter().map(RawClaim::decode).collect()
        })
    }
}

/// A claims row before its text columns are decoded.
struct RawClaim {
    world_id: String,
    x: i32,
    y: i32,
    z: i32,
    owner_id: String,
    last_modified: i64,
    temporary: bool,
}

impl RawClaim {
    /// Columns in `SELECT world_id, x, y, z, owner_id, last_modified, temporary` order.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            world_id: row.get(0)?,
            x: row.get(1)?,
            y: row.get(2)?,
            z: row.get(3)?,
            owner_id: row.get(4)?,
            last_modified: row.get(5)?,
            temporary: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Claim, StorageError> {
        Ok(Claim {
            coordinate: Coordinate::new(
                decode_uuid("world_id", self.world_id)?,
                self.x,
                self.y,
                self.z,
            ),
            owner: decode_uuid("owner_id", self.owner_id)?,
            last_modified: self.last_modified,
            temporary: self.temporary,
        })
    }
}
