//! End-of-month spend projection.
//!
//! A least-squares line over the trailing 7 days gives a smoothed
//! daily rate; the forecast is month-to-date spend plus that rate
//! times the days left in the month. A non-positive fitted rate
//! forecasts no additional spend rather than a shrinking total.

use chrono::{Datelike, Local, NaiveDate};
use cloudspend_core::DailyCost;

const REGRESSION_WINDOW: usize = 7;

/// Forecast against the local calendar.
pub fn forecast_end_of_month(daily_costs: &[DailyCost]) -> f64 {
    forecast_end_of_month_at(daily_costs, Local::now().date_naive())
}

/// Forecast as of `today`. Input is chronological daily costs for the
/// current billing period; fewer than 2 points yields 0.
pub fn forecast_end_of_month_at(daily_costs: &[DailyCost], today: NaiveDate) -> f64 {
    if daily_costs.len() < 2 {
        return 0.0;
    }

    let start = daily_costs.len().saturating_sub(REGRESSION_WINDOW);
    let recent = &daily_costs[start..];
    let n = recent.len() as f64;

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, cost) in recent.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += cost.amount;
        sum_xy += x * cost.amount;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        // Degenerate regression (all x coincide): raw window sum.
        return sum_y;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    // Fitted value at the window midpoint = smoothed daily rate.
    let avg_daily = intercept + slope * (n - 1.0) / 2.0;
    if avg_daily <= 0.0 {
        return 0.0;
    }

    let days_remaining = (days_in_month(today) - today.day()) as f64;
    let month_prefix = today.format("%Y-%m").to_string();
    let month_total: f64 = daily_costs
        .iter()
        .filter(|d| d.date.starts_with(&month_prefix))
        .map(|d| d.amount)
        .sum();

    month_total + avg_daily * days_remaining
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = match date.month() {
        12 => (date.year() + 1, 1),
        m => (date.year(), m + 1),
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map_or(31, |last_day| last_day.day())
}
