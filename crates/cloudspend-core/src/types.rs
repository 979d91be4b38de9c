//! Shared data types for the cost engine.
//!
//! Dates are plain `YYYY-MM-DD` strings throughout: that is how they
//! arrive from the billing export, how they are stored in SQLite, and
//! ISO dates compare correctly as strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fully-qualified billing-export table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

/// Net cost for a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCost {
    pub date: String,
    pub amount: f64,
    pub currency: String,
}

/// Month-to-date totals plus the per-day series behind them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub total_cost: f64,
    pub net_cost: f64,
    pub currency: String,
    pub daily_costs: Vec<DailyCost>,
}

/// One service's share of a month's spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBreakdown {
    pub service: String,
    pub amount: f64,
    pub percentage: f64,
    pub currency: String,
}

/// One SKU's share of a month's spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuBreakdown {
    pub sku: String,
    pub description: String,
    pub amount: f64,
    pub percentage: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Stable,
    Falling,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Rising => write!(f, "rising"),
            TrendDirection::Stable => write!(f, "stable"),
            TrendDirection::Falling => write!(f, "falling"),
        }
    }
}

/// Spending direction over the two most recent 7-day windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    pub percent_change: f64,
}

/// The derived status view, cached under `status:<scope>`.
///
/// `data_freshness` is when the billing export last received data,
/// not when this struct was cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostStatus {
    pub today: f64,
    pub this_week: f64,
    pub this_month: f64,
    pub net_month: f64,
    pub top_services: Vec<ServiceBreakdown>,
    pub trend: TrendResult,
    pub forecast: f64,
    pub currency: String,
    pub data_freshness: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BreakdownItems {
    Skus(Vec<SkuBreakdown>),
    Services(Vec<ServiceBreakdown>),
}

impl BreakdownItems {
    pub fn is_empty(&self) -> bool {
        match self {
            BreakdownItems::Skus(items) => items.is_empty(),
            BreakdownItems::Services(items) => items.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BreakdownItems::Skus(items) => items.len(),
            BreakdownItems::Services(items) => items.len(),
        }
    }
}

/// The derived breakdown view, cached under `breakdown:<...>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownResult {
    pub items: BreakdownItems,
    pub currency: String,
    pub month: String,
}
