use cloudspend_core::config::{config_exists, save_config, BigQueryConfig, Config, ProjectConfig};
use cloudspend_core::paths;
use cloudspend_engine::EngineError;

use crate::setup::report;

pub struct InitParams {
    pub billing_project: String,
    pub dataset: Option<String>,
    pub table: Option<String>,
    pub projects: Vec<String>,
    pub currency: String,
    pub budget: Option<f64>,
    pub warn_percent: Option<f64>,
    pub poll_interval: u64,
    pub force: bool,
}

pub fn execute(params: InitParams) -> anyhow::Result<()> {
    if config_exists() && !params.force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            paths::config_path().display()
        );
    }

    let config = Config {
        projects: params
            .projects
            .into_iter()
            .map(|project_id| ProjectConfig {
                project_id,
                display_name: None,
                billing_account_id: None,
                monthly_budget: params.budget,
                budget_warn_percent: params.warn_percent,
            })
            .collect(),
        bigquery: BigQueryConfig {
            project_id: params.billing_project,
            dataset_id: params.dataset,
            table_id: params.table,
        },
        currency: params.currency,
        poll_interval: params.poll_interval,
    };
    config
        .validate()
        .map_err(EngineError::from)
        .map_err(report)?;
    save_config(&config).map_err(EngineError::from).map_err(report)?;

    println!("Wrote {}", paths::config_path().display());
    println!("Local database: {}", paths::db_path().display());
    if config.bigquery.dataset_id.is_none() {
        println!("Note: no dataset configured; set one before running `cloudspend status`.");
    } else if config.bigquery.table_id.is_none() {
        println!("The billing export table will be discovered on first use.");
    }
    Ok(())
}
