use cloudspend_engine::cost_status;
use cloudspend_tracker::budget::{check_thresholds, get_budget_status};
use serde_json::json;

use crate::setup::{format_amount, init_context, report};

/// One status fetch per budgeted project; each is scoped, so budgets
/// never mix spend across projects.
pub async fn execute(json_output: bool) -> anyhow::Result<()> {
    let ctx = init_context().await?;

    let mut reports = Vec::new();
    for project in &ctx.config.projects {
        if project.monthly_budget.is_none() {
            continue;
        }
        let status = cost_status(
            &ctx.store,
            &ctx.source,
            &ctx.config,
            &ctx.table,
            Some(&project.project_id),
        )
        .await
        .map_err(report)?;
        let Some(budget) = get_budget_status(project, status.this_month) else {
            continue;
        };
        let alerts = check_thresholds(project, status.this_month);
        reports.push((project.project_id.clone(), status.currency, budget, alerts));
    }

    if json_output {
        let out: Vec<_> = reports
            .iter()
            .map(|(project, currency, budget, alerts)| {
                json!({
                    "project": project,
                    "currency": currency,
                    "budget": budget,
                    "alerts": alerts,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No projects have a monthly budget configured.");
        println!("Set one with: cloudspend init --budget <amount> --force");
        return Ok(());
    }

    for (project, currency, budget, alerts) in &reports {
        println!(
            "{project}: {} of {} ({:.1}%, {}) [{}]",
            format_amount(budget.spent, currency),
            format_amount(budget.budget, currency),
            budget.percentage,
            if budget.remaining >= 0.0 {
                format!("{} left", format_amount(budget.remaining, currency))
            } else {
                format!("{} over", format_amount(-budget.remaining, currency))
            },
            budget.level
        );
        for alert in alerts {
            println!("  ! {}", alert.message);
        }
    }
    Ok(())
}
