use cloudspend_core::BreakdownItems;
use cloudspend_engine::breakdown;

use crate::setup::{format_amount, init_context, report};

pub async fn execute(
    service: Option<&str>,
    month: Option<&str>,
    project: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let ctx = init_context().await?;
    let result = breakdown(
        &ctx.store,
        &ctx.source,
        &ctx.config,
        &ctx.table,
        service,
        month,
        project,
    )
    .await
    .map_err(report)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match service {
        Some(service) => println!("SKU breakdown for {service}, {}", result.month),
        None => println!("Service breakdown, {}", result.month),
    }
    if result.items.is_empty() {
        println!("  (no costs recorded)");
        return Ok(());
    }
    match &result.items {
        BreakdownItems::Services(items) => {
            for item in items {
                println!(
                    "  {:<32} {:>12}  {:>5.1}%",
                    item.service,
                    format_amount(item.amount, &item.currency),
                    item.percentage
                );
            }
        }
        BreakdownItems::Skus(items) => {
            for item in items {
                println!(
                    "  {:<44} {:>12}  {:>5.1}%",
                    item.description,
                    format_amount(item.amount, &item.currency),
                    item.percentage
                );
            }
        }
    }
    Ok(())
}
