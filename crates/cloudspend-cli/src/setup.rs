//! Shared command bootstrap: config, local store, BigQuery source, and
//! the resolved export table.

use cloudspend_core::config::{load_config, save_config, Config};
use cloudspend_core::{paths, TableRef};
use cloudspend_engine::{resolve_table, BigQuerySource, EngineError};
use cloudspend_store::Store;

pub struct AppContext {
    pub config: Config,
    pub store: Store,
    pub source: BigQuerySource,
    pub table: TableRef,
}

/// Loads everything a data command needs. When table discovery ran,
/// the discovered id is written back to the config file so later runs
/// skip the listing call; a write-back failure only warns.
pub async fn init_context() -> anyhow::Result<AppContext> {
    let mut config = load_config().map_err(EngineError::from).map_err(report)?;
    let store = Store::open(&paths::db_path())
        .map_err(EngineError::from)
        .map_err(report)?;
    let source = BigQuerySource::new(config.bigquery.project_id.clone())
        .await
        .map_err(EngineError::from)
        .map_err(report)?;

    let resolution = resolve_table(&config, &source).await.map_err(report)?;
    if resolution.discovered {
        config.bigquery.table_id = Some(resolution.table.table_id.clone());
        if let Err(err) = save_config(&config) {
            tracing::warn!("could not persist discovered table id: {err}");
        }
    }

    Ok(AppContext {
        config,
        store,
        source,
        table: resolution.table,
    })
}

/// Engine error to user-facing error, hint on its own line.
pub fn report(err: EngineError) -> anyhow::Error {
    match err.hint() {
        Some(hint) => anyhow::anyhow!("{err}\n  hint: {hint}"),
        None => anyhow::anyhow!("{err}"),
    }
}

/// Amounts render as `$12.34` for USD and `12.34 EUR` otherwise.
pub fn format_amount(amount: f64, currency: &str) -> String {
    if currency == "USD" {
        format!("${amount:.2}")
    } else {
        format!("{amount:.2} {currency}")
    }
}
