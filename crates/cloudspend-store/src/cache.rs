//! TTL cache over the `cache_meta` table.
//!
//! Expiry is evaluated in SQL against `fetched_at + ttl_seconds`; an
//! expired entry and a missing entry are the same thing to the caller.

use crate::{Store, StoreError};
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Default TTLs (seconds) by cache namespace. Status is volatile
/// (same-day data changes); settled history barely moves.
pub const STATUS_TTL: u32 = 900;
pub const BREAKDOWN_TTL: u32 = 3600;
pub const HISTORY_TTL: u32 = 86400;

/// Fetch a cached payload. `Ok(None)` covers both missing and expired.
pub fn get_cached<T: DeserializeOwned>(store: &Store, key: &str) -> Result<Option<T>, StoreError> {
    let row: Option<String> = store
        .conn()
        .query_row(
            "SELECT data_json FROM cache_meta
             WHERE key = ?1
               AND datetime(fetched_at, '+' || ttl_seconds || ' seconds') > datetime('now')",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    match row {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Store a payload, fully replacing any prior entry and resetting
/// `fetched_at` to now. The TTL must be positive.
pub fn set_cache<T: Serialize>(
    store: &Store,
    key: &str,
    value: &T,
    ttl_seconds: u32,
) -> Result<(), StoreError> {
    if ttl_seconds == 0 {
        return Err(StoreError::InvalidArgument(
            "cache TTL must be positive".to_string(),
        ));
    }
    let json = serde_json::to_string(value)?;
    store.conn().execute(
        "INSERT OR REPLACE INTO cache_meta (key, data_json, fetched_at, ttl_seconds)
         VALUES (?1, ?2, datetime('now'), ?3)",
        params![key, json, ttl_seconds],
    )?;
    Ok(())
}

/// Delete entries whose key starts with `prefix`, or everything when
/// `prefix` is `None`. Returns the number of entries removed.
pub fn clear_cache(store: &Store, prefix: Option<&str>) -> Result<usize, StoreError> {
    let removed = match prefix {
        Some(prefix) => store.conn().execute(
            "DELETE FROM cache_meta WHERE key LIKE ?1",
            params![format!("{prefix}%")],
        )?,
        None => store.conn().execute("DELETE FROM cache_meta", [])?,
    };
    Ok(removed)
}
