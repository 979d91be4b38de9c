//! Billing-export table resolution.
//!
//! Explicit two-step contract: resolution either yields a table ref
//! (flagged when it came from discovery) or a configuration error.
//! Persisting a discovered table id back into the config file is the
//! caller's decision, not a side effect of this read path.

use crate::source::RemoteCostSource;
use crate::EngineError;
use cloudspend_core::config::Config;
use cloudspend_core::error::ConfigError;
use cloudspend_core::TableRef;

#[derive(Debug, Clone)]
pub struct TableResolution {
    pub table: TableRef,
    /// True when the table id came from a discovery call rather than
    /// configuration; the caller may want to persist it.
    pub discovered: bool,
}

const SETUP_HINT: &str =
    "run: cloudspend init (ensure billing export is enabled in the Cloud Console first)";

pub async fn resolve_table(
    config: &Config,
    source: &dyn RemoteCostSource,
) -> Result<TableResolution, EngineError> {
    let bq = &config.bigquery;

    let Some(dataset_id) = bq.dataset_id.clone() else {
        return Err(ConfigError::with_hint("BigQuery dataset not configured", SETUP_HINT).into());
    };

    if let Some(table_id) = bq.table_id.clone() {
        return Ok(TableResolution {
            table: TableRef {
                project_id: bq.project_id.clone(),
                dataset_id,
                table_id,
            },
            discovered: false,
        });
    }

    // One best-effort discovery attempt; failures are "not found", not
    // transient errors.
    match source.find_export_table(&bq.project_id, &dataset_id).await {
        Ok(Some(table_id)) => {
            tracing::info!(table = %table_id, "discovered billing export table");
            Ok(TableResolution {
                table: TableRef {
                    project_id: bq.project_id.clone(),
                    dataset_id,
                    table_id,
                },
                discovered: true,
            })
        }
        Ok(None) => Err(ConfigError::with_hint(
            "BigQuery billing export table not configured",
            SETUP_HINT,
        )
        .into()),
        Err(err) => {
            tracing::debug!("billing export discovery failed: {err}");
            Err(ConfigError::with_hint(
                "BigQuery billing export table not configured",
                SETUP_HINT,
            )
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use cloudspend_core::config::{BigQueryConfig, ProjectConfig};
    use cloudspend_core::error::SourceError;
    use cloudspend_core::{DailyCost, MonthlySummary, ServiceBreakdown, SkuBreakdown};

    /// Source whose only interesting behavior is discovery.
    struct DiscoveryOnly {
        result: Result<Option<String>, ()>,
    }

    #[async_trait]
    impl RemoteCostSource for DiscoveryOnly {
        async fn current_month_costs(
            &self,
            _: &TableRef,
            _: Option<&str>,
            _: &str,
        ) -> Result<MonthlySummary, SourceError> {
            unreachable!("resolution must not run cost queries")
        }
        async fn costs_by_service(
            &self,
            _: &TableRef,
            _: Option<&str>,
            _: Option<&str>,
            _: &str,
        ) -> Result<Vec<ServiceBreakdown>, SourceError> {
            unreachable!()
        }
        async fn costs_by_sku(
            &self,
            _: &TableRef,
            _: Option<&str>,
            _: Option<&str>,
            _: Option<&str>,
            _: &str,
        ) -> Result<Vec<SkuBreakdown>, SourceError> {
            unreachable!()
        }
        async fn daily_costs(
            &self,
            _: &TableRef,
            _: Option<&str>,
            _: u32,
            _: &str,
        ) -> Result<Vec<DailyCost>, SourceError> {
            unreachable!()
        }
        async fn data_freshness(&self, _: &TableRef) -> Result<DateTime<Utc>, SourceError> {
            unreachable!()
        }
        async fn find_export_table(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<String>, SourceError> {
            match &self.result {
                Ok(found) => Ok(found.clone()),
                Err(()) => Err(SourceError::Query {
                    message: "listing tables failed".into(),
                    hint: None,
                }),
            }
        }
    }

    fn config(dataset: Option<&str>, table: Option<&str>) -> Config {
        Config {
            projects: vec![ProjectConfig {
                project_id: "p".into(),
                display_name: None,
                billing_account_id: None,
                monthly_budget: None,
                budget_warn_percent: None,
            }],
            bigquery: BigQueryConfig {
                project_id: "billing".into(),
                dataset_id: dataset.map(String::from),
                table_id: table.map(String::from),
            },
            currency: "USD".into(),
            poll_interval: 300,
        }
    }

    #[tokio::test]
    async fn configured_table_wins_without_discovery() {
        let source = DiscoveryOnly {
            result: Err(()), // would fail if called
        };
        let resolved = resolve_table(&config(Some("billing_export"), Some("t1")), &source)
            .await
            .unwrap();
        assert!(!resolved.discovered);
        assert_eq!(resolved.table.table_id, "t1");
        assert_eq!(resolved.table.dataset_id, "billing_export");
    }

    #[tokio::test]
    async fn missing_dataset_needs_setup() {
        let source = DiscoveryOnly { result: Ok(None) };
        let err = resolve_table(&config(None, None), &source).await.unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(err.hint().unwrap().contains("cloudspend init"));
    }

    #[tokio::test]
    async fn discovery_success_flags_discovered() {
        let source = DiscoveryOnly {
            result: Ok(Some("gcp_billing_export_v1_ABCD".into())),
        };
        let resolved = resolve_table(&config(Some("billing_export"), None), &source)
            .await
            .unwrap();
        assert!(resolved.discovered);
        assert_eq!(resolved.table.table_id, "gcp_billing_export_v1_ABCD");
    }

    #[tokio::test]
    async fn discovery_failure_is_needs_setup_not_source_error() {
        let source = DiscoveryOnly { result: Err(()) };
        let err = resolve_table(&config(Some("billing_export"), None), &source)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
