//! Log-scale error score for a trend fit.

use crate::domain::TrendRow;

/// RMSLE-like score: `Σ |log10(actual + 1) - log10(predicted + 1)|`.
///
/// Only rows where both actual and predicted values are positive contribute, so
/// a fit whose predictions all collapsed to `0` scores `0` (undefined).
pub fn rmsle(rows: &[TrendRow]) -> f64 {
    rows.iter()
        .filter(|r| r.susceptible_actual > 0 && r.susceptible_predicted > 0)
        .map(|r| {
            let actual = (r.susceptible_actual as f64 + 1.0).log10();
            let predicted = (r.susceptible_predicted as f64 + 1.0).log10();
            (actual - predicted).abs()
        })
        .sum()
}
