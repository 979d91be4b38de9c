//! Spending-direction classification.

use cloudspend_core::{DailyCost, TrendDirection, TrendResult};

/// Window length for each side of the comparison.
const WINDOW: usize = 7;

/// Band (percent) inside which day-to-day variance is treated as noise
/// rather than a direction change.
const NOISE_BAND: f64 = 10.0;

/// Compare the last 7 days against the 7 before them. Input must be
/// chronological, most recent last. Fewer than 14 points is not enough
/// signal and always reads as stable.
pub fn detect_trend(daily_costs: &[DailyCost]) -> TrendResult {
    if daily_costs.len() < WINDOW * 2 {
        return TrendResult {
            direction: TrendDirection::Stable,
            percent_change: 0.0,
        };
    }

    let split = daily_costs.len() - WINDOW;
    let recent = &daily_costs[split..];
    let previous = &daily_costs[split - WINDOW..split];

    let recent_avg = mean(recent);
    let previous_avg = mean(previous);

    if previous_avg == 0.0 {
        return if recent_avg > 0.0 {
            TrendResult {
                direction: TrendDirection::Rising,
                percent_change: 100.0,
            }
        } else {
            TrendResult {
                direction: TrendDirection::Stable,
                percent_change: 0.0,
            }
        };
    }

    let percent_change = (recent_avg - previous_avg) / previous_avg * 100.0;
    let direction = if percent_change > NOISE_BAND {
        TrendDirection::Rising
    } else if percent_change < -NOISE_BAND {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    };

    TrendResult {
        direction,
        percent_change,
    }
}

fn mean(window: &[DailyCost]) -> f64 {
    window.iter().map(|d| d.amount).sum::<f64>() / window.len() as f64
}
