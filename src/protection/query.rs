//! Parameterized statement builders for the claims table.
//!
//! Every proximity query shares one WHERE clause: the world, an inclusive
//! box on each axis, a liveness condition, and an owner scope. The owner
//! scope is where delegation happens: an actor's trusted owners are the
//! actor itself plus every grantor that granted the actor access.

use rusqlite::types::Value;

use super::geometry::{BoundingBox, Coordinate};
use crate::Identity;

/// Owners trusted by an actor: every grantor of the actor, and the actor.
const TRUSTED_OWNERS: &str =
    "SELECT grants.grantor_id FROM grants WHERE grants.grantee_id = ? UNION SELECT ?";

pub(crate) const UPSERT_CLAIM: &str = r#"
INSERT INTO claims (world_id, x, y, z, last_modified, temporary, owner_id)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT (world_id, x, y, z) DO UPDATE SET
    temporary = CASE
        WHEN claims.owner_id = excluded.owner_id THEN MIN(claims.temporary, excluded.temporary)
        ELSE excluded.temporary
    END,
    owner_id = excluded.owner_id,
    last_modified = excluded.last_modified
"#;

pub(crate) const DELETE_CLAIM: &str =
    "DELETE FROM claims WHERE world_id = ?1 AND x = ?2 AND y = ?3 AND z = ?4";

pub(crate) const SELECT_CLAIM: &str = r#"
SELECT world_id, x, y, z, owner_id, last_modified, temporary
FROM claims
WHERE world_id = ?1 AND x = ?2 AND y = ?3 AND z = ?4
"#;

/// Which claims count, by promotion state and age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Liveness {
    Any,
    /// Permanent and modified at or after `since`.
    Active { since: i64 },
    /// Temporary, or modified at or after `since`.
    ActiveOrTemporary { since: i64 },
    Temporary,
}

/// Whose claims count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OwnerScope {
    Anyone,
    /// Owners the actor does not trust.
    UntrustedBy(Identity),
    /// The actor and everyone who granted the actor access.
    TrustedBy(Identity),
}

/// A SQL string with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Filter over the claims inside a bounding box.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClaimFilter {
    bounds: BoundingBox,
    liveness: Liveness,
    scope: OwnerScope,
    except: Option<Coordinate>,
}

impl ClaimFilter {
    pub fn within(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            liveness: Liveness::Any,
            scope: OwnerScope::Anyone,
            except: None,
        }
    }

    pub fn liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn scope(mut self, scope: OwnerScope) -> Self {
        self.scope = scope;
        self
    }

    /// Leave one coordinate out of the match.
    pub fn except(mut self, coordinate: Coordinate) -> Self {
        self.except = Some(coordinate);
        self
    }

    /// Owner of any one matching claim.
    pub fn select_owner(&self) -> Statement {
        self.build("SELECT owner_id FROM claims", vec![], " LIMIT 1")
    }

    pub fn count(&self) -> Statement {
        self.build("SELECT COUNT(*) FROM claims", vec![], "")
    }

    pub fn select_claims(&self) -> Statement {
        self.build(
            "SELECT world_id, x, y, z, owner_id, last_modified, temporary FROM claims",
            vec![],
            " ORDER BY x, y, z",
        )
    }

    /// Make every matching claim permanent, stamping it with `now`.
    pub fn promote(&self, now: i64) -> Statement {
        self.build(
            "UPDATE claims SET temporary = 0, last_modified = ?",
            vec![Value::Integer(now)],
            "",
        )
    }

    fn build(&self, head: &str, mut params: Vec<Value>, tail: &str) -> Statement {
        let b = &self.bounds;
        let mut sql = String::from(head);
        sql.push_str(
            " WHERE world_id = ? AND x BETWEEN ? AND ? AND y BETWEEN ? AND ? AND z BETWEEN ? AND ?",
        );
        params.push(Value::Text(b.world.to_string()));
        params.extend(
            [b.min_x, b.max_x, b.min_y, b.max_y, b.min_z, b.max_z]
                .into_iter()
                .map(|bound| Value::Integer(i64::from(bound))),
        );

        match self.liveness {
            Liveness::Any => {}
            Liveness::Active { since } => {
                sql.push_str(" AND temporary = 0 AND last_modified >= ?");
                params.push(Value::Integer(since));
            }
            Liveness::ActiveOrTemporary { since } => {
                sql.push_str(" AND (temporary = 1 OR last_modified >= ?)");
                params.push(Value::Integer(since));
            }
            Liveness::Temporary => sql.push_str(" AND temporary = 1"),
        }

        let actor = match self.scope {
            OwnerScope::Anyone => None,
            OwnerScope::UntrustedBy(actor) => {
                sql.push_str(" AND owner_id NOT IN (");
                Some(actor)
            }
            OwnerScope::TrustedBy(actor) => {
                sql.push_str(" AND owner_id IN (");
                Some(actor)
            }
        };
        if let Some(actor) = actor {
            sql.push_str(TRUSTED_OWNERS);
            sql.push(')');
            params.push(Value::Text(actor.to_string()));
            params.push(Value::Text(actor.to_string()));
        }

        if let Some(except) = self.except {
            sql.push_str(" AND NOT (x = ? AND y = ? AND z = ?)");
            params.extend(
                [except.x, except.y, except.z]
                    .into_iter()
                    .map(|axis| Value::Integer(i64::from(axis))),
            );
        }

        sql.push_str(tail);
        Statement { sql, params }
    }
}
