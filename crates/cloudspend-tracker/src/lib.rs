//! Pure derivations over daily cost series. Nothing here touches the
//! network or the store; everything is recomputable from raw data.

pub mod budget;
pub mod forecast;
pub mod trend;

pub use budget::{check_thresholds, get_budget_status, BudgetLevel, BudgetStatus, ThresholdAlert};
pub use forecast::{forecast_end_of_month, forecast_end_of_month_at};
pub use trend::detect_trend;
