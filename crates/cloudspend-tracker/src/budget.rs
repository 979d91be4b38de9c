//! Budget evaluation against configured monthly limits.
//!
//! Never persisted; recomputed on every read from current spend and
//! the project's configured budget.

use cloudspend_core::config::ProjectConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Ok,
    Warn,
    Critical,
    Exceeded,
}

impl std::fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetLevel::Ok => write!(f, "ok"),
            BudgetLevel::Warn => write!(f, "warn"),
            BudgetLevel::Critical => write!(f, "critical"),
            BudgetLevel::Exceeded => write!(f, "exceeded"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub budget: f64,
    pub spent: f64,
    pub percentage: f64,
    pub remaining: f64,
    pub level: BudgetLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdAlert {
    pub threshold: u32,
    pub percentage: f64,
    pub message: String,
}

/// Evaluate spend against the project's monthly budget. `None` when no
/// budget is configured, which is distinct from any zero-valued status.
pub fn get_budget_status(project: &ProjectConfig, monthly_spend: f64) -> Option<BudgetStatus> {
    let budget = project.monthly_budget?;
    let percentage = monthly_spend / budget * 100.0;
    let remaining = budget - monthly_spend;

    let level = if percentage >= 100.0 {
        BudgetLevel::Exceeded
    } else if percentage >= 80.0 {
        BudgetLevel::Critical
    } else if percentage >= 50.0 {
        BudgetLevel::Warn
    } else {
        BudgetLevel::Ok
    };

    Some(BudgetStatus {
        budget,
        spent: monthly_spend,
        percentage,
        remaining,
        level,
    })
}

/// Fixed alert checkpoints, ascending.
const ALERT_THRESHOLDS: [u32; 3] = [50, 80, 100];

/// Which checkpoints the current percentage has crossed. Once spend
/// exceeds the budget all three fire together.
pub fn check_thresholds(project: &ProjectConfig, spend: f64) -> Vec<ThresholdAlert> {
    let Some(budget) = project.monthly_budget else {
        return Vec::new();
    };

    let percentage = spend / budget * 100.0;
    let warn_percent = project.budget_warn_percent.unwrap_or(80.0);

    ALERT_THRESHOLDS
        .iter()
        .filter(|&&threshold| percentage >= threshold as f64)
        .map(|&threshold| {
            let message = if threshold >= 100 {
                format!("Budget exceeded! {percentage:.1}% of ${budget}/mo")
            } else if threshold as f64 >= warn_percent {
                format!("Warning: {percentage:.1}% of monthly budget used")
            } else {
                format!("{percentage:.1}% of monthly budget used")
            };
            ThresholdAlert {
                threshold,
                percentage,
                message,
            }
        })
        .collect()
}
