use cloudspend_core::TrendDirection;
use cloudspend_engine::{cost_status, EngineError};
use cloudspend_store::cache::clear_cache;
use cloudspend_store::history::latest_fetched_at;

use crate::setup::{format_amount, init_context, report};

pub async fn execute(project: Option<&str>, json: bool, refresh: bool) -> anyhow::Result<()> {
    let ctx = init_context().await?;
    if refresh {
        clear_cache(&ctx.store, Some("status:"))
            .map_err(EngineError::from)
            .map_err(report)?;
    }

    let status = match cost_status(&ctx.store, &ctx.source, &ctx.config, &ctx.table, project).await
    {
        Ok(status) => status,
        Err(err @ EngineError::Source(_)) => {
            // Offline or failing remote: say how stale the local data is
            // before surfacing the failure.
            let scope = project.unwrap_or("all");
            if let Ok(Some(last)) = latest_fetched_at(&ctx.store, scope) {
                eprintln!("remote source unavailable; last synced data is from {last} UTC");
                eprintln!("try: cloudspend history --days 14");
            }
            return Err(report(err));
        }
        Err(err) => return Err(report(err)),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let currency = &status.currency;
    match project {
        Some(project) => println!("Cost status for {project}"),
        None => println!("Cost status (all projects)"),
    }
    println!("  Today:      {}", format_amount(status.today, currency));
    println!("  This week:  {}", format_amount(status.this_week, currency));
    println!(
        "  This month: {} (net {})",
        format_amount(status.this_month, currency),
        format_amount(status.net_month, currency)
    );
    println!("  Forecast:   {} by end of month", format_amount(status.forecast, currency));
    println!("  Trend:      {}", describe_trend(&status.trend.direction, status.trend.percent_change));
    if !status.top_services.is_empty() {
        println!("  Top services:");
        for item in &status.top_services {
            println!(
                "    {:<28} {:>12}  {:>5.1}%",
                item.service,
                format_amount(item.amount, &item.currency),
                item.percentage
            );
        }
    }
    println!(
        "  Data freshness: {} UTC",
        status.data_freshness.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn describe_trend(direction: &TrendDirection, percent_change: f64) -> String {
    match direction {
        TrendDirection::Stable => "stable vs previous week".to_string(),
        TrendDirection::Rising => format!("rising (+{percent_change:.1}% vs previous week)"),
        TrendDirection::Falling => format!("falling ({percent_change:.1}% vs previous week)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_descriptions() {
        assert_eq!(describe_trend(&TrendDirection::Stable, 0.0), "stable vs previous week");
        assert_eq!(
            describe_trend(&TrendDirection::Rising, 12.34),
            "rising (+12.3% vs previous week)"
        );
        assert_eq!(
            describe_trend(&TrendDirection::Falling, -40.0),
            "falling (-40.0% vs previous week)"
        );
    }
}
