use cloudspend_core::paths;
use cloudspend_engine::EngineError;
use cloudspend_store::cache::clear_cache;
use cloudspend_store::Store;

use crate::setup::report;

pub fn clear(prefix: Option<&str>) -> anyhow::Result<()> {
    let store = Store::open(&paths::db_path())
        .map_err(EngineError::from)
        .map_err(report)?;
    let removed = clear_cache(&store, prefix)
        .map_err(EngineError::from)
        .map_err(report)?;
    match prefix {
        Some(prefix) => println!("Removed {removed} cached entries matching {prefix}*"),
        None => println!("Removed {removed} cached entries"),
    }
    Ok(())
}
