//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::now_millis;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(version = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Catalog with live stock
        CREATE TABLE artifacts (
            artifact_id INTEGER PRIMARY KEY AUTOINCREMENT,
            artist_id INTEGER,                         -- uploading artist, nullable
            museum_id INTEGER,                         -- owning museum, nullable
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            kind TEXT NOT NULL DEFAULT 'Other',
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            stock INTEGER NOT NULL CHECK (stock >= 0),
            created_at INTEGER NOT NULL                -- Unix ms
        );

        -- Purchase ledger, one row per artifact per checkout
        CREATE TABLE purchases (
            purchase_id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL,
            artifact_id INTEGER NOT NULL
                REFERENCES artifacts(artifact_id) ON DELETE RESTRICT,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            total_cents INTEGER NOT NULL CHECK (total_cents >= 0),
            payment_method TEXT NOT NULL,
            purchased_at INTEGER NOT NULL              -- Unix ms
        );

        -- The ledger is append-only
        CREATE TRIGGER purchases_no_update BEFORE UPDATE ON purchases
        BEGIN
            SELECT RAISE(ABORT, 'purchases are append-only');
        END;

        CREATE TRIGGER purchases_no_delete BEFORE DELETE ON purchases
        BEGIN
            SELECT RAISE(ABORT, 'purchases are append-only');
        END;

        CREATE INDEX idx_artifacts_created ON artifacts(created_at);
        CREATE INDEX idx_artifacts_artist ON artifacts(artist_id);
        CREATE INDEX idx_artifacts_kind ON artifacts(kind);
        CREATE INDEX idx_purchases_customer ON purchases(customer_id);
        CREATE INDEX idx_purchases_artifact ON purchases(artifact_id);
        CREATE INDEX idx_purchases_time ON purchases(purchased_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"artifacts".to_string()));
        assert!(tables.contains(&"purchases".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }

    #[test]
    fn test_stock_cannot_go_negative() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO artifacts (title, price_cents, stock, created_at) VALUES ('Bowl', 100, 1, 0)",
            [],
        )
        .unwrap();

        let err = conn
            .execute("UPDATE artifacts SET stock = stock - 2", [])
            .unwrap_err();
        assert!(matches!(StoreError::from(err), StoreError::Constraint(_)));
    }

    #[test]
    fn test_purchases_are_append_only() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO artifacts (title, price_cents, stock, created_at) VALUES ('Bowl', 100, 1, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO purchases (customer_id, artifact_id, quantity, total_cents, payment_method, purchased_at)
             VALUES (1, 1, 1, 100, 'Card', 0)",
            [],
        )
        .unwrap();

        assert!(conn.execute("UPDATE purchases SET quantity = 2", []).is_err());
        assert!(conn.execute("DELETE FROM purchases", []).is_err());
    }
}
