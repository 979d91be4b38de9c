use cloudspend_engine::history;

use crate::setup::{format_amount, init_context, report};

/// Widest bar in the sparkline column.
const BAR_WIDTH: f64 = 40.0;

pub async fn execute(days: u32, project: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ctx = init_context().await?;
    let costs = history(&ctx.store, &ctx.source, &ctx.config, &ctx.table, days, project)
        .await
        .map_err(report)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&costs)?);
        return Ok(());
    }

    if costs.is_empty() {
        println!("No costs in the last {days} days.");
        return Ok(());
    }

    let max = costs.iter().map(|d| d.amount).fold(0.0_f64, f64::max);
    println!("Daily costs, last {days} days");
    for day in &costs {
        let bar = if max > 0.0 {
            "█".repeat((day.amount / max * BAR_WIDTH).round().max(0.0) as usize)
        } else {
            String::new()
        };
        println!(
            "  {}  {:>12}  {bar}",
            day.date,
            format_amount(day.amount, &day.currency)
        );
    }
    let total: f64 = costs.iter().map(|d| d.amount).sum();
    let currency = costs
        .first()
        .map(|d| d.currency.clone())
        .unwrap_or_else(|| ctx.config.currency.clone());
    println!("  total: {}", format_amount(total, &currency));
    Ok(())
}
