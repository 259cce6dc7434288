//! Model selection (linear vs negative exponential) by log-scale error.
//!
//! The tool fits both candidates on the same log-transformed series and
//! computes each one's RMSLE-like score. Selection rules:
//! 1. Linear wins when its score is positive and strictly lower than the
//!    exponential score.
//! 2. Linear also wins when the exponential score is zero/undefined.
//! 3. Otherwise the negative exponential wins.
//!
//! A non-positive score means the fit is degenerate (e.g. every prediction
//! overflowed), so it never beats a positive score.

use tracing::debug;

use crate::domain::{ModelKind, SrSeries, TrendFit};
use crate::error::Result;
use crate::fit::fitter::{FitOptions, LogSeries, fit_log_series};

/// Fit both candidate models and select the better one.
pub fn fit_trend(series: &SrSeries, opts: &FitOptions) -> Result<TrendFit> {
    let data = LogSeries::from_series(series)?;

    let candidates: Vec<_> = ModelKind::ALL
        .iter()
        .map(|&model| fit_log_series(model, &data, opts))
        .collect();

    let linear = candidates[0].score;
    let exponential = candidates[1].score;
    let best = select_model(linear, exponential);
    debug!(
        linear_score = linear,
        exponential_score = exponential,
        best = best.display_name(),
        "trend model selected"
    );

    Ok(TrendFit { best, candidates })
}

/// Apply the selection rules to a pair of scores.
pub fn select_model(linear_score: f64, exponential_score: f64) -> ModelKind {
    let exponential_undefined = exponential_score.is_nan() || exponential_score <= 0.0;
    if (linear_score > 0.0 && linear_score < exponential_score) || exponential_undefined {
        ModelKind::Linear
    } else {
        ModelKind::NegativeExponential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SrObservation;
    use crate::error::AppError;
    use chrono::NaiveDate;

    #[test]
    fn lower_positive_linear_score_wins() {
        assert_eq!(select_model(0.1, 0.2), ModelKind::Linear);
    }

    #[test]
    fn lower_exponential_score_wins() {
        assert_eq!(select_model(0.3, 0.2), ModelKind::NegativeExponential);
    }

    #[test]
    fn zero_linear_score_is_degenerate() {
        assert_eq!(select_model(0.0, 0.2), ModelKind::NegativeExponential);
    }

    #[test]
    fn undefined_exponential_score_falls_back_to_linear() {
        assert_eq!(select_model(0.0, 0.0), ModelKind::Linear);
        assert_eq!(select_model(5.0, 0.0), ModelKind::Linear);
        assert_eq!(select_model(5.0, f64::NAN), ModelKind::Linear);
    }

    #[test]
    fn ties_go_to_exponential() {
        assert_eq!(select_model(0.2, 0.2), ModelKind::NegativeExponential);
    }

    #[test]
    fn fit_trend_needs_three_observations() {
        let series = SrSeries::new(vec![
            SrObservation {
                date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
                recovered: 1,
                susceptible: 1000,
            },
            SrObservation {
                date: NaiveDate::from_ymd_opt(2020, 3, 2).unwrap(),
                recovered: 2,
                susceptible: 990,
            },
        ])
        .unwrap();
        let err = fit_trend(&series, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientData { .. }));
    }
}
