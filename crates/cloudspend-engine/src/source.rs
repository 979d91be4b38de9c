//! The remote cost-source seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudspend_core::error::SourceError;
use cloudspend_core::{DailyCost, MonthlySummary, ServiceBreakdown, SkuBreakdown, TableRef};

pub type SourceResult<T> = Result<T, SourceError>;

/// Analytical queries against the cloud billing export.
///
/// Implementations classify their own failures into [`SourceError`];
/// the engine surfaces those unchanged and never retries them. All
/// amounts are net of credits unless a method says otherwise.
#[async_trait]
pub trait RemoteCostSource: Send + Sync {
    /// Current-month totals plus the per-day series.
    async fn current_month_costs(
        &self,
        table: &TableRef,
        filter_project: Option<&str>,
        currency: &str,
    ) -> SourceResult<MonthlySummary>;

    /// Per-service spend for a month (`None` = current), largest first.
    async fn costs_by_service(
        &self,
        table: &TableRef,
        filter_project: Option<&str>,
        month: Option<&str>,
        currency: &str,
    ) -> SourceResult<Vec<ServiceBreakdown>>;

    /// Per-SKU spend, optionally narrowed to one service.
    async fn costs_by_sku(
        &self,
        table: &TableRef,
        service: Option<&str>,
        filter_project: Option<&str>,
        month: Option<&str>,
        currency: &str,
    ) -> SourceResult<Vec<SkuBreakdown>>;

    /// Daily net costs for the trailing `days` days, ascending by date.
    async fn daily_costs(
        &self,
        table: &TableRef,
        filter_project: Option<&str>,
        days: u32,
        currency: &str,
    ) -> SourceResult<Vec<DailyCost>>;

    /// When the billing export last received data.
    async fn data_freshness(&self, table: &TableRef) -> SourceResult<DateTime<Utc>>;

    /// Best-effort billing-export table discovery within a dataset;
    /// `Ok(None)` when nothing matches.
    async fn find_export_table(
        &self,
        project_id: &str,
        dataset_id: &str,
    ) -> SourceResult<Option<String>>;
}
