use std::time::Duration;

use cloudspend_engine::{cost_status, EngineError};
use cloudspend_store::cache::clear_cache;

use crate::setup::{format_amount, init_context, report};

/// Polls until interrupted. Each round drops the status cache entries
/// so the fetch is always fresh; a failed round prints the error and
/// keeps polling.
pub async fn execute(interval: Option<u64>, project: Option<&str>) -> anyhow::Result<()> {
    let ctx = init_context().await?;
    let interval = Duration::from_secs(interval.unwrap_or(ctx.config.poll_interval));
    println!(
        "Watching costs every {}s (ctrl-c to stop)",
        interval.as_secs()
    );

    loop {
        clear_cache(&ctx.store, Some("status:"))
            .map_err(EngineError::from)
            .map_err(report)?;
        match cost_status(&ctx.store, &ctx.source, &ctx.config, &ctx.table, project).await {
            Ok(status) => {
                let now = chrono::Local::now().format("%H:%M:%S");
                println!(
                    "[{now}] today {}  week {}  month {}  forecast {}  trend {}",
                    format_amount(status.today, &status.currency),
                    format_amount(status.this_week, &status.currency),
                    format_amount(status.this_month, &status.currency),
                    format_amount(status.forecast, &status.currency),
                    status.trend.direction
                );
            }
            Err(err) => eprintln!("poll failed: {}", report(err)),
        }
        tokio::time::sleep(interval).await;
    }
}
