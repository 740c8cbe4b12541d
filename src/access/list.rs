//! Access list backed by the `grants` table.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::storage::schema::decode_uuid;
use crate::storage::{StorageError, StorageExecutor, StorageFuture};
use crate::Identity;

const SELECT_GRANT: &str =
    "SELECT 1 FROM grants WHERE grantor_id = ?1 AND grantee_id = ?2";
const SELECT_GRANTEES: &str =
    "SELECT grantee_id FROM grants WHERE grantor_id = ?1";
const SELECT_GRANTORS: &str =
    "SELECT grantor_id FROM grants WHERE grantee_id = ?1";
const INSERT_GRANT: &str =
    "INSERT INTO grants (grantor_id, grantee_id, granted_at) VALUES (?1, ?2, ?3)";
const DELETE_GRANT: &str =
    "DELETE FROM grants WHERE grantor_id = ?1 AND grantee_id = ?2";
const DELETE_GRANTS_BY: &str = "DELETE FROM grants WHERE grantor_id = ?1";

/// One-directional permission grants between identities.
#[derive(Clone)]
pub struct AccessList {
    executor: StorageExecutor,
    clock: Arc<dyn Clock>,
}

impl AccessList {
    pub fn new(executor: StorageExecutor) -> Self {
        Self::with_clock(executor, Arc::new(SystemClock))
    }

    pub fn with_clock(executor: StorageExecutor, clock: Arc<dyn Clock>) -> Self {
        Self { executor, clock }
    }

    /// Whether `grantor` has granted `grantee` access.
    pub fn is_granted(&self, grantor: Identity, grantee: Identity) -> StorageFuture<bool> {
        self.executor
            .submit(move |conn| Ok(grant_exists(conn, grantor, grantee)?))
    }

    /// Everyone `grantor` has granted access to.
    pub fn list_grantees(&self, grantor: Identity) -> StorageFuture<BTreeSet<Identity>> {
        self.executor
            .submit(move |conn| list_identities(conn, SELECT_GRANTEES, "grantee_id", grantor))
    }

    /// Everyone who has granted `grantee` access.
    pub fn list_grantors(&self, grantee: Identity) -> StorageFuture<BTreeSet<Identity>> {
        self.executor
            .submit(move |conn| list_identities(conn, SELECT_GRANTORS, "grantor_id", grantee))
    }

    /// Let `grantee` act near `grantor`'s claims.
    ///
    /// Returns `false` when the grant already existed.
    pub fn grant(&self, grantor: Identity, grantee: Identity) -> StorageFuture<bool> {
        let clock = Arc::clone(&self.clock);

        self.executor.submit(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if grant_exists(&tx, grantor, grantee)? {
                return Ok(false);
            }
            let inserted = tx.execute(
                INSERT_GRANT,
                params![grantor.to_string(), grantee.to_string(), clock.now_millis()],
            )?;
            tx.commit()?;

            tracing::info!(%grantor, %grantee, "Access granted");
            Ok(inserted > 0)
        })
    }

    /// Withdraw a grant.
    ///
    /// Returns `false` when there was nothing to withdraw.
    pub fn revoke(&self, grantor: Identity, grantee: Identity) -> StorageFuture<bool> {
        self.executor.submit(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !grant_exists(&tx, grantor, grantee)? {
                return Ok(false);
            }
            let deleted = tx.execute(
                DELETE_GRANT,
                params![grantor.to_string(), grantee.to_string()],
            )?;
            tx.commit()?;

            tracing::info!(%grantor, %grantee, "Access revoked");
            Ok(deleted > 0)
        })
    }

    /// Withdraw every grant made by `grantor`.
    ///
    /// Returns how many grants were removed; zero is not an error.
    pub fn revoke_all(&self, grantor: Identity) -> StorageFuture<usize> {
        self.executor.submit(move |conn| {
            let deleted = conn.execute(DELETE_GRANTS_BY, params![grantor.to_string()])?;
            tracing::info!(%grantor, deleted, "All access revoked");
            Ok(deleted)
        })
    }
}

fn grant_exists(
    conn: &Connection,
    grantor: Identity,
    grantee: Identity,
) -> rusqlite::Result<bool> {
    Ok(conn
        .prepare_cached(SELECT_GRANT)?
        .query_row(params![grantor.to_string(), grantee.to_string()], |_| Ok(()))
        .optional()?
        .is_some())
}

fn list_identities(
    conn: &Connection,
    sql: &str,
    column: &'static str,
    key: Identity,
) -> Result<BTreeSet<Identity>, StorageError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let raw = stmt
        .query_map(params![key.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter()
        .map(|value| decode_uuid(column, value))
        .collect()
}
