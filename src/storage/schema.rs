//! Schema definitions and connection pragmas.
//!
//! Every statement is create-if-absent, so initialization can run on every
//! startup against an existing database.

use rusqlite::Connection;
use std::time::Duration;
use uuid::Uuid;

use super::executor::StorageError;

/// Claimed coordinates. One row per (world, x, y, z).
const CREATE_CLAIMS: &str = r#"
CREATE TABLE IF NOT EXISTS claims (
    world_id      TEXT    NOT NULL,
    x             INTEGER NOT NULL,
    y             INTEGER NOT NULL,
    z             INTEGER NOT NULL,
    last_modified INTEGER NOT NULL,
    temporary     INTEGER NOT NULL DEFAULT 1,
    owner_id      TEXT    NOT NULL,
    PRIMARY KEY (world_id, x, y, z)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS claims_last_modified ON claims (last_modified);
CREATE INDEX IF NOT EXISTS claims_owner_id ON claims (owner_id);
CREATE INDEX IF NOT EXISTS claims_temporary ON claims (temporary);
"#;

/// One-directional access grants. The grantor lets the grantee act near
/// the grantor's claims.
const CREATE_GRANTS: &str = r#"
CREATE TABLE IF NOT EXISTS grants (
    grantor_id TEXT    NOT NULL,
    grantee_id TEXT    NOT NULL,
    granted_at INTEGER NOT NULL,
    PRIMARY KEY (grantor_id, grantee_id)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS grants_grantee_id ON grants (grantee_id);
"#;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply pragmas to a freshly opened connection.
///
/// WAL lets readers proceed while a writer holds the lock; the busy timeout
/// makes concurrent writers queue instead of failing immediately.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    })?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// Create the claims and grants tables and their indexes.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_CLAIMS)?;
    conn.execute_batch(CREATE_GRANTS)?;
    tracing::info!("Created tables and indexes for claims and grants");
    Ok(())
}

/// Decode a UUID stored as hyphenated text.
pub(crate) fn decode_uuid(column: &'static str, value: String) -> Result<Uuid, StorageError> {
    Uuid::parse_str(&value).map_err(|_| StorageError::Corrupt { column, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        names
    }

    #[test]
    fn test_initialize_schema_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("schema.db")).unwrap();
        apply_pragmas(&conn).unwrap();

        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO grants (grantor_id, grantee_id, granted_at) VALUES ('a', 'b', 1)",
            [],
        )
        .unwrap();

        // Second run must neither fail nor wipe data
        initialize_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM grants", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_schema_creates_lookup_indexes() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("schema.db")).unwrap();
        initialize_schema(&conn).unwrap();

        assert_eq!(
            index_names(&conn),
            vec![
                "claims_last_modified",
                "claims_owner_id",
                "claims_temporary",
                "grants_grantee_id",
            ]
        );
    }

    #[test]
    fn test_claim_primary_key_is_the_coordinate() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("schema.db")).unwrap();
        initialize_schema(&conn).unwrap();

        let insert = "INSERT INTO claims (world_id, x, y, z, last_modified, temporary, owner_id) \
                      VALUES ('w', 1, 2, 3, 0, 1, ?1)";
        conn.execute(insert, ["owner-a"]).unwrap();
        let err = conn.execute(insert, ["owner-b"]).unwrap_err();
        assert!(matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
        ));
    }

    #[test]
    fn test_decode_uuid_reports_bad_column() {
        let id = Uuid::now_v7();
        assert_eq!(decode_uuid("owner_id", id.to_string()).unwrap(), id);

        let err = decode_uuid("owner_id", "not-a-uuid".into()).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Corrupt { column: "owner_id", ref value } if value == "not-a-uuid"
        ));
    }

    #[test]
    fn test_apply_pragmas_enables_wal() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("schema.db")).unwrap();
        apply_pragmas(&conn).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
