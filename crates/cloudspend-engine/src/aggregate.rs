//! Cache-first orchestration of the status, breakdown, and history
//! views.
//!
//! On a status cache miss the four independent remote queries fan out
//! concurrently and join before anything is written. Only the status
//! path writes through to the cost repository: it fetches the superset
//! of data worth keeping offline. No retries happen here; a watch loop
//! that wants retry semantics re-invokes the whole flow.

use crate::source::RemoteCostSource;
use crate::EngineError;
use chrono::{Datelike, Duration, Local, NaiveDate};
use cloudspend_core::config::Config;
use cloudspend_core::{
    BreakdownItems, BreakdownResult, CostStatus, DailyCost, TableRef,
};
use cloudspend_store::cache::{
    get_cached, set_cache, BREAKDOWN_TTL, HISTORY_TTL, STATUS_TTL,
};
use cloudspend_store::{history, CostObservation, Store};
use cloudspend_tracker::{detect_trend, forecast::forecast_end_of_month_at};

/// Sentinel service/sku for persisted month-wide daily totals, which
/// carry no per-SKU detail.
pub const TOTAL_SENTINEL: &str = "_total";

/// How many trailing days feed the trend detector.
const TREND_DAYS: u32 = 14;

/// How many services the status view keeps.
const TOP_SERVICES: usize = 5;

fn scope_label(filter_project: Option<&str>) -> &str {
    filter_project.unwrap_or("all")
}

/// The status view for a scope: today / week / month spend, top
/// services, trend, forecast, and export freshness.
pub async fn cost_status(
    store: &Store,
    source: &dyn RemoteCostSource,
    config: &Config,
    table: &TableRef,
    filter_project: Option<&str>,
) -> Result<CostStatus, EngineError> {
    let scope = scope_label(filter_project);
    let cache_key = format!("status:{scope}");
    if let Some(cached) = get_cached::<CostStatus>(store, &cache_key)? {
        tracing::debug!(key = %cache_key, "status cache hit");
        return Ok(cached);
    }

    tracing::debug!(key = %cache_key, "status cache miss, querying remote source");
    let (summary, services, daily, freshness) = tokio::try_join!(
        source.current_month_costs(table, filter_project, &config.currency),
        source.costs_by_service(table, filter_project, None, &config.currency),
        source.daily_costs(table, filter_project, TREND_DAYS, &config.currency),
        source.data_freshness(table),
    )?;

    let today = Local::now().date_naive();
    let today_cost = amount_on(&summary.daily_costs, today);
    let this_week = week_to_date(&summary.daily_costs, today);
    let trend = detect_trend(&daily);
    let forecast = forecast_end_of_month_at(&daily, today);

    // Write-through: daily totals survive offline under the sentinel
    // service/sku, keyed to this scope.
    let observations: Vec<CostObservation> = summary
        .daily_costs
        .iter()
        .map(|d| CostObservation {
            scope_id: scope.to_string(),
            date: d.date.clone(),
            service: TOTAL_SENTINEL.to_string(),
            sku: TOTAL_SENTINEL.to_string(),
            description: "Daily total".to_string(),
            amount: d.amount,
            currency: d.currency.clone(),
            usage_quantity: None,
            usage_unit: None,
        })
        .collect();
    if !observations.is_empty() {
        history::upsert_observations(store, &observations)?;
    }

    let mut top_services = services;
    top_services.truncate(TOP_SERVICES);

    let status = CostStatus {
        today: today_cost,
        this_week,
        this_month: summary.total_cost,
        net_month: summary.net_cost,
        top_services,
        trend,
        forecast,
        currency: summary.currency,
        data_freshness: freshness,
    };
    set_cache(store, &cache_key, &status, STATUS_TTL)?;
    Ok(status)
}

/// Per-service (or per-SKU when `service` is given) breakdown for a
/// month. No repository write-through.
pub async fn breakdown(
    store: &Store,
    source: &dyn RemoteCostSource,
    config: &Config,
    table: &TableRef,
    service: Option<&str>,
    month: Option<&str>,
    filter_project: Option<&str>,
) -> Result<BreakdownResult, EngineError> {
    let cache_key = format!(
        "breakdown:{}:{}:{}",
        service.unwrap_or("all"),
        month.unwrap_or("current"),
        scope_label(filter_project),
    );
    if let Some(cached) = get_cached::<BreakdownResult>(store, &cache_key)? {
        tracing::debug!(key = %cache_key, "breakdown cache hit");
        return Ok(cached);
    }

    let items = match service {
        Some(service) => BreakdownItems::Skus(
            source
                .costs_by_sku(table, Some(service), filter_project, month, &config.currency)
                .await?,
        ),
        None => BreakdownItems::Services(
            source
                .costs_by_service(table, filter_project, month, &config.currency)
                .await?,
        ),
    };

    let currency = match &items {
        BreakdownItems::Services(list) => list.first().map(|i| i.currency.clone()),
        BreakdownItems::Skus(list) => list.first().map(|i| i.currency.clone()),
    }
    .unwrap_or_else(|| config.currency.clone());

    let month = month
        .map(String::from)
        .unwrap_or_else(|| Local::now().date_naive().format("%Y-%m").to_string());

    let result = BreakdownResult {
        items,
        currency,
        month,
    };
    set_cache(store, &cache_key, &result, BREAKDOWN_TTL)?;
    Ok(result)
}

/// Daily costs for the trailing `days` days. No repository
/// write-through.
pub async fn history(
    store: &Store,
    source: &dyn RemoteCostSource,
    config: &Config,
    table: &TableRef,
    days: u32,
    filter_project: Option<&str>,
) -> Result<Vec<DailyCost>, EngineError> {
    let cache_key = format!("history:{days}:{}", scope_label(filter_project));
    if let Some(cached) = get_cached::<Vec<DailyCost>>(store, &cache_key)? {
        tracing::debug!(key = %cache_key, "history cache hit");
        return Ok(cached);
    }

    let costs = source
        .daily_costs(table, filter_project, days, &config.currency)
        .await?;
    set_cache(store, &cache_key, &costs, HISTORY_TTL)?;
    Ok(costs)
}

/// Amount observed on exactly `date`, 0 when absent.
fn amount_on(daily: &[DailyCost], date: NaiveDate) -> f64 {
    let date = date.format("%Y-%m-%d").to_string();
    daily
        .iter()
        .find(|d| d.date == date)
        .map_or(0.0, |d| d.amount)
}

/// Sum from the most recent Monday through `today`. ISO week: Monday
/// starts the week even when today is Sunday.
fn week_to_date(daily: &[DailyCost], today: NaiveDate) -> f64 {
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let start = monday.format("%Y-%m-%d").to_string();
    let end = today.format("%Y-%m-%d").to_string();
    daily
        .iter()
        .filter(|d| d.date >= start && d.date <= end)
        .map(|d| d.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use cloudspend_core::config::{BigQueryConfig, ProjectConfig};
    use cloudspend_core::error::SourceError;
    use cloudspend_core::{MonthlySummary, ServiceBreakdown, SkuBreakdown};
    use cloudspend_store::cache::clear_cache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned source that counts every remote call.
    struct FakeSource {
        daily: Vec<DailyCost>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new() -> Self {
            // 16 days ending today: 8 old days at 10/day then 8 recent
            // at 20/day, so trend and forecast have real signal.
            let today = Local::now().date_naive();
            let daily = (0..16)
                .map(|i| {
                    let date = today - Duration::days(15 - i);
                    DailyCost {
                        date: date.format("%Y-%m-%d").to_string(),
                        amount: if i < 8 { 10.0 } else { 20.0 },
                        currency: "USD".into(),
                    }
                })
                .collect();
            Self {
                daily,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteCostSource for FakeSource {
        async fn current_month_costs(
            &self,
            _: &TableRef,
            _: Option<&str>,
            currency: &str,
        ) -> Result<MonthlySummary, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let total: f64 = self.daily.iter().map(|d| d.amount).sum();
            Ok(MonthlySummary {
                total_cost: total,
                net_cost: total - 5.0,
                currency: currency.to_string(),
                daily_costs: self.daily.clone(),
            })
        }

        async fn costs_by_service(
            &self,
            _: &TableRef,
            _: Option<&str>,
            _: Option<&str>,
            currency: &str,
        ) -> Result<Vec<ServiceBreakdown>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..7)
                .map(|i| ServiceBreakdown {
                    service: format!("service-{i}"),
                    amount: 100.0 - i as f64,
                    percentage: 10.0,
                    currency: currency.to_string(),
                })
                .collect())
        }

        async fn costs_by_sku(
            &self,
            _: &TableRef,
            service: Option<&str>,
            _: Option<&str>,
            _: Option<&str>,
            currency: &str,
        ) -> Result<Vec<SkuBreakdown>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SkuBreakdown {
                sku: "sku-1".into(),
                description: format!("{} sku", service.unwrap_or("?")),
                amount: 12.0,
                percentage: 100.0,
                currency: currency.to_string(),
            }])
        }

        async fn daily_costs(
            &self,
            _: &TableRef,
            _: Option<&str>,
            _: u32,
            _: &str,
        ) -> Result<Vec<DailyCost>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.daily.clone())
        }

        async fn data_freshness(&self, _: &TableRef) -> Result<DateTime<Utc>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Utc.with_ymd_and_hms(2026, 8, 29, 1, 0, 0).unwrap())
        }

        async fn find_export_table(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<String>, SourceError> {
            Ok(None)
        }
    }

    fn test_config() -> Config {
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
                dataset_id: Some("billing_export".into()),
                table_id: Some("gcp_billing_export_v1_X".into()),
            },
            currency: "USD".into(),
            poll_interval: 300,
        }
    }

    fn table() -> TableRef {
        TableRef {
            project_id: "billing".into(),
            dataset_id: "billing_export".into(),
            table_id: "gcp_billing_export_v1_X".into(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn costs(entries: &[(&str, f64)]) -> Vec<DailyCost> {
        entries
            .iter()
            .map(|(date, amount)| DailyCost {
                date: (*date).into(),
                amount: *amount,
                currency: "USD".into(),
            })
            .collect()
    }

    #[test]
    fn amount_on_exact_date_or_zero() {
        let daily = costs(&[("2026-08-25", 3.0), ("2026-08-26", 4.0)]);
        assert_eq!(amount_on(&daily, day("2026-08-26")), 4.0);
        assert_eq!(amount_on(&daily, day("2026-08-27")), 0.0);
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-08-26 is a Wednesday; the week began Monday the 24th.
        let daily = costs(&[
            ("2026-08-22", 100.0), // previous week, ignored
            ("2026-08-23", 100.0), // Sunday, previous week
            ("2026-08-24", 1.0),
            ("2026-08-25", 2.0),
            ("2026-08-26", 3.0),
        ]);
        assert_eq!(week_to_date(&daily, day("2026-08-26")), 6.0);
    }

    #[test]
    fn sunday_belongs_to_the_week_begun_six_days_earlier() {
        // 2026-08-30 is a Sunday; ISO weeks still start Monday the 24th.
        let daily = costs(&[
            ("2026-08-23", 50.0), // previous Sunday, ignored
            ("2026-08-24", 1.0),
            ("2026-08-30", 2.0),
        ]);
        assert_eq!(week_to_date(&daily, day("2026-08-30")), 3.0);
    }

    #[tokio::test]
    async fn status_cache_hit_returns_verbatim_without_remote_calls() {
        let store = Store::open_in_memory().unwrap();
        let source = FakeSource::new();
        let config = test_config();

        let first = cost_status(&store, &source, &config, &table(), None)
            .await
            .unwrap();
        let calls_after_first = source.call_count();
        assert_eq!(calls_after_first, 4);

        let second = cost_status(&store, &source, &config, &table(), None)
            .await
            .unwrap();
        assert_eq!(source.call_count(), calls_after_first);
        assert_eq!(second.this_month, first.this_month);
        assert_eq!(second.data_freshness, first.data_freshness);
    }

    #[tokio::test]
    async fn status_persists_daily_totals_under_sentinel() {
        let store = Store::open_in_memory().unwrap();
        let source = FakeSource::new();
        let config = test_config();

        cost_status(&store, &source, &config, &table(), None)
            .await
            .unwrap();

        let rows = history::costs_by_date_range(&store, "all", "2000-01-01", "2100-01-01").unwrap();
        assert_eq!(rows.len(), 16);
        assert!(rows.iter().all(|r| r.service == TOTAL_SENTINEL));
        assert!(rows.iter().all(|r| r.sku == TOTAL_SENTINEL));
    }

    #[tokio::test]
    async fn status_scope_keys_are_independent() {
        let store = Store::open_in_memory().unwrap();
        let source = FakeSource::new();
        let config = test_config();

        cost_status(&store, &source, &config, &table(), None)
            .await
            .unwrap();
        cost_status(&store, &source, &config, &table(), Some("my-project"))
            .await
            .unwrap();
        // Two misses: each scope fetched its own four queries.
        assert_eq!(source.call_count(), 8);

        // The filtered scope persisted under its own scope id.
        let rows =
            history::costs_by_date_range(&store, "my-project", "2000-01-01", "2100-01-01").unwrap();
        assert_eq!(rows.len(), 16);
    }

    #[tokio::test]
    async fn status_derivations_are_populated() {
        let store = Store::open_in_memory().unwrap();
        let source = FakeSource::new();
        let config = test_config();

        let status = cost_status(&store, &source, &config, &table(), None)
            .await
            .unwrap();
        assert_eq!(status.top_services.len(), 5);
        assert_eq!(status.today, 20.0);
        assert_eq!(
            status.trend.direction,
            cloudspend_core::TrendDirection::Rising
        );
        assert!(status.forecast > 0.0);
        assert_eq!(status.currency, "USD");
    }

    #[tokio::test]
    async fn breakdown_uses_sku_query_when_service_given() {
        let store = Store::open_in_memory().unwrap();
        let source = FakeSource::new();
        let config = test_config();

        let by_service = breakdown(&store, &source, &config, &table(), None, None, None)
            .await
            .unwrap();
        assert!(matches!(by_service.items, BreakdownItems::Services(_)));

        let by_sku = breakdown(
            &store,
            &source,
            &config,
            &table(),
            Some("Compute Engine"),
            Some("2026-07"),
            None,
        )
        .await
        .unwrap();
        assert!(matches!(by_sku.items, BreakdownItems::Skus(_)));
        assert_eq!(by_sku.month, "2026-07");
    }

    #[tokio::test]
    async fn breakdown_does_not_write_through_to_history() {
        let store = Store::open_in_memory().unwrap();
        let source = FakeSource::new();
        let config = test_config();

        breakdown(&store, &source, &config, &table(), None, None, None)
            .await
            .unwrap();
        let rows = history::costs_by_date_range(&store, "all", "2000-01-01", "2100-01-01").unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn history_caches_under_days_scoped_key() {
        let store = Store::open_in_memory().unwrap();
        let source = FakeSource::new();
        let config = test_config();

        let first = history(&store, &source, &config, &table(), 14, None)
            .await
            .unwrap();
        assert_eq!(first.len(), 16);
        assert_eq!(source.call_count(), 1);

        history(&store, &source, &config, &table(), 14, None)
            .await
            .unwrap();
        assert_eq!(source.call_count(), 1, "second call must be a cache hit");

        history(&store, &source, &config, &table(), 30, None)
            .await
            .unwrap();
        assert_eq!(source.call_count(), 2, "different day count is a new key");
    }

    #[tokio::test]
    async fn clearing_status_prefix_leaves_history_cached() {
        let store = Store::open_in_memory().unwrap();
        let source = FakeSource::new();
        let config = test_config();

        cost_status(&store, &source, &config, &table(), None)
            .await
            .unwrap();
        history(&store, &source, &config, &table(), 14, None)
            .await
            .unwrap();
        let before = source.call_count();

        clear_cache(&store, Some("status:")).unwrap();

        // Status refetches, history is still served from cache.
        cost_status(&store, &source, &config, &table(), None)
            .await
            .unwrap();
        history(&store, &source, &config, &table(), 14, None)
            .await
            .unwrap();
        assert_eq!(source.call_count(), before + 4);
    }
}
