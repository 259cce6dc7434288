//! Model evaluation for the two S-R trend candidates.
//!
//! The fitter relies on two primitive operations:
//! - evaluate `f(x)` given `(a, b)` (residuals and predictions)
//! - the gradient `∂f/∂(a, b)` at `x` (one Jacobian row)
//!
//! Both act on the log-transformed target: `f(Recovered) ≈ ln(Susceptible)`.

use crate::domain::ModelKind;

/// Evaluate the model at `x`.
pub fn evaluate(model: ModelKind, x: f64, params: &[f64]) -> f64 {
    let (a, b) = (params[0], params[1]);
    match model {
        ModelKind::Linear => a * x + b,
        ModelKind::NegativeExponential => a * (-b * x).exp(),
    }
}

/// Partial derivatives of the model with respect to `(a, b)`.
pub fn gradient(model: ModelKind, x: f64, params: &[f64]) -> [f64; 2] {
    match model {
        ModelKind::Linear => [x, 1.0],
        ModelKind::NegativeExponential => {
            let e = (-params[1] * x).exp();
            [e, -params[0] * x * e]
        }
    }
}

/// Predicted Susceptible count: `trunc(exp(f(x)))`.
///
/// Non-finite or out-of-range predictions (overflow of the exponential) become `0`.
pub fn predict_count(model: ModelKind, x: f64, params: &[f64]) -> u64 {
    let value = evaluate(model, x, params).exp();
    if value.is_finite() && value < u64::MAX as f64 {
        // `as` truncates toward zero.
        value as u64
    } else {
        0
    }
}
