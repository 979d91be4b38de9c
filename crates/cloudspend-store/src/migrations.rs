//! Ordered, idempotent schema migrations.
//!
//! The schema version is `PRAGMA user_version`; migrations past the
//! current version run inside a single transaction and the version is
//! bumped with them, so a crash mid-upgrade leaves the old schema.

use crate::StoreError;
use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // 1: initial schema: raw cost observations + TTL cache.
    "CREATE TABLE cost_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scope_id TEXT NOT NULL,
        date TEXT NOT NULL,
        service TEXT NOT NULL,
        sku TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        amount REAL NOT NULL,
        currency TEXT NOT NULL DEFAULT 'USD',
        usage_quantity REAL,
        usage_unit TEXT,
        fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_cost_entries_date ON cost_entries(date);
    CREATE INDEX idx_cost_entries_service ON cost_entries(service);
    CREATE INDEX idx_cost_entries_scope ON cost_entries(scope_id);
    CREATE UNIQUE INDEX idx_cost_entries_unique
        ON cost_entries(scope_id, date, service, sku);

    CREATE TABLE cache_meta (
        key TEXT PRIMARY KEY,
        data_json TEXT NOT NULL,
        fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
        ttl_seconds INTEGER NOT NULL DEFAULT 3600
    );",
];

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let target = MIGRATIONS.len() as i64;
    if current >= target {
        return Ok(());
    }

    tracing::debug!(from = current, to = target, "applying schema migrations");
    let tx = conn.unchecked_transaction()?;
    for sql in &MIGRATIONS[current as usize..] {
        tx.execute_batch(sql)?;
    }
    tx.execute_batch(&format!("PRAGMA user_version = {target}"))?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_all_then_noop() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);

        // Second run is a no-op: CREATE TABLE without IF NOT EXISTS
        // would error if the migration ran again.
        run(&conn).unwrap();
    }

    #[test]
    fn natural_key_unique_index_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        conn.execute(
            "INSERT INTO cost_entries (scope_id, date, service, sku, amount)
             VALUES ('all', '2026-08-01', 'Compute', 'cpu', 1.0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO cost_entries (scope_id, date, service, sku, amount)
             VALUES ('all', '2026-08-01', 'Compute', 'cpu', 2.0)",
            [],
        );
        assert!(dup.is_err(), "unique index must reject duplicate natural key");
    }
}
