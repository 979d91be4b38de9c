//! Cost repository: durable raw daily observations.
//!
//! Rows are deduplicated by the natural key (scope_id, date, service,
//! sku); the unique index enforces this at the storage layer, so
//! repeated ingestion of the same remote row is idempotent no matter
//! who calls.

use crate::{Store, StoreError};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// One normalized daily cost observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostObservation {
    pub scope_id: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub service: String,
    pub sku: String,
    pub description: String,
    pub amount: f64,
    pub currency: String,
    pub usage_quantity: Option<f64>,
    pub usage_unit: Option<String>,
}

/// Insert or update a batch of observations in one transaction. On a
/// natural-key conflict the amount/currency/description/usage fields
/// are overwritten and `fetched_at` is refreshed.
pub fn upsert_observations(
    store: &Store,
    observations: &[CostObservation],
) -> Result<(), StoreError> {
    let tx = store.conn().unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO cost_entries
                 (scope_id, date, service, sku, description, amount, currency,
                  usage_quantity, usage_unit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(scope_id, date, service, sku)
             DO UPDATE SET amount = excluded.amount,
                           currency = excluded.currency,
                           description = excluded.description,
                           usage_quantity = excluded.usage_quantity,
                           usage_unit = excluded.usage_unit,
                           fetched_at = datetime('now')",
        )?;
        for o in observations {
            stmt.execute(params![
                o.scope_id,
                o.date,
                o.service,
                o.sku,
                o.description,
                o.amount,
                o.currency,
                o.usage_quantity,
                o.usage_unit,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Observations for a scope within `[from, to]` inclusive, ascending
/// by date.
pub fn costs_by_date_range(
    store: &Store,
    scope_id: &str,
    from: &str,
    to: &str,
) -> Result<Vec<CostObservation>, StoreError> {
    let mut stmt = store.conn().prepare(
        "SELECT scope_id, date, service, sku, description, amount, currency,
                usage_quantity, usage_unit
         FROM cost_entries
         WHERE scope_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC",
    )?;
    let rows = stmt.query_map(params![scope_id, from, to], |row| {
        Ok(CostObservation {
            scope_id: row.get(0)?,
            date: row.get(1)?,
            service: row.get(2)?,
            sku: row.get(3)?,
            description: row.get(4)?,
            amount: row.get(5)?,
            currency: row.get(6)?,
            usage_quantity: row.get(7)?,
            usage_unit: row.get(8)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// When the most recent observation for a scope was fetched, if any.
/// Answers "how fresh is my offline data" independent of the cache.
pub fn latest_fetched_at(store: &Store, scope_id: &str) -> Result<Option<String>, StoreError> {
    let latest: Option<String> = store.conn().query_row(
        "SELECT MAX(fetched_at) FROM cost_entries WHERE scope_id = ?1",
        params![scope_id],
        |row| row.get(0),
    )?;
    Ok(latest)
}
