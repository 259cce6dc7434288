//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `½ Σ r_i(p)²` for a residual vector `r` with an analytic Jacobian.
//!
//! Each iteration solves the damped Gauss–Newton step
//!
//! ```text
//! [   J   ] δ = [ -r ]
//! [ √λ·D  ]     [  0 ]
//! ```
//!
//! where `D` holds the column norms of the current Jacobian (Marquardt scaling).
//! The system is solved in the scaled variable `D·δ` with `r` normalized to unit
//! length, and costs are compared through [`stable_norm`], so residuals far beyond
//! `√f64::MAX` still produce usable steps. A step is accepted only if the new
//! residual norm is finite and strictly lower; otherwise the damping `λ` grows
//! and the step is retried.
//!
//! Numerical trouble never becomes an error: the best iterate seen is always
//! returned together with a [`FitStatus`] explaining why the search stopped.

use nalgebra::{DMatrix, DVector};

use crate::domain::FitStatus;
use crate::math::solve_least_squares;

/// Residual/Jacobian provider for [`levenberg_marquardt`].
pub trait LeastSquaresProblem {
    /// Residuals `r_i(p)`, one per observation.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Jacobian `∂r_i/∂p_j` (rows = observations, columns = parameters).
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

#[derive(Debug, Clone)]
pub struct LmOptions {
    /// Maximum number of iterations (accepted or rejected steps).
    pub max_iter: usize,
    /// Relative cost reduction below which an accepted step ends the search.
    pub ftol: f64,
    /// Relative step size below which the search ends.
    pub xtol: f64,
    /// Gradient infinity-norm below which the search ends.
    pub gtol: f64,
    pub initial_damping: f64,
    pub max_damping: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 5000,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            initial_damping: 1e-3,
            max_damping: 1e16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    /// `½‖r‖²` at `params`.
    pub cost: f64,
    pub iterations: usize,
    pub status: FitStatus,
}

/// Run Levenberg–Marquardt from `initial`.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    initial: &DVector<f64>,
    opts: &LmOptions,
) -> LmReport {
    let mut params = initial.clone();
    let mut residuals = problem.residuals(&params);
    let mut rnorm = stable_norm(residuals.as_slice());

    let finish = |params: DVector<f64>, rnorm: f64, iterations: usize, status: FitStatus| LmReport {
        params,
        cost: 0.5 * rnorm * rnorm,
        iterations,
        status,
    };

    if !rnorm.is_finite() {
        return finish(params, rnorm, 0, FitStatus::NonFiniteStart);
    }

    let n = residuals.len();
    let p = params.len();
    let mut jac = problem.jacobian(&params);
    let mut scale = DVector::<f64>::from_element(p, 1.0);
    let mut damping = opts.initial_damping;
    let mut iterations = 0usize;

    while iterations < opts.max_iter {
        iterations += 1;

        if rnorm == 0.0 {
            return finish(params, rnorm, iterations, FitStatus::Converged);
        }

        for j in 0..p {
            let column: Vec<f64> = jac.column(j).iter().copied().collect();
            let col_norm = stable_norm(&column);
            if col_norm.is_finite() && col_norm > 0.0 {
                scale[j] = col_norm;
            }
        }

        // Work on `J·D⁻¹` and `r/‖r‖`: entries stay within [-1, 1] however
        // large the raw residuals are, and the step is mapped back below.
        let mut scaled_jac = jac.clone();
        for j in 0..p {
            scaled_jac.column_mut(j).unscale_mut(scale[j]);
        }
        let unit_residuals = residuals.unscale(rnorm);

        let grad = scaled_jac.transpose() * &unit_residuals;
        if !grad.iter().all(|g| g.is_finite()) {
            return finish(params, rnorm, iterations, FitStatus::Stalled);
        }
        if grad.amax() <= opts.gtol {
            return finish(params, rnorm, iterations, FitStatus::Converged);
        }

        let mut augmented = DMatrix::<f64>::zeros(n + p, p);
        augmented.view_mut((0, 0), (n, p)).copy_from(&scaled_jac);
        let root_damping = damping.sqrt();
        for j in 0..p {
            augmented[(n + j, j)] = root_damping;
        }
        let mut rhs = DVector::<f64>::zeros(n + p);
        rhs.rows_mut(0, n).copy_from(&(-&unit_residuals));

        let Some(scaled_step) = solve_least_squares(&augmented, &rhs) else {
            damping *= 10.0;
            if damping > opts.max_damping {
                return finish(params, rnorm, iterations, FitStatus::Stalled);
            }
            continue;
        };
        let step = DVector::from_iterator(p, (0..p).map(|j| scaled_step[j] * rnorm / scale[j]));

        let step_is_small =
            stable_norm(step.as_slice()) <= opts.xtol * (stable_norm(params.as_slice()) + opts.xtol);
        let candidate = &params + &step;
        let candidate_residuals = problem.residuals(&candidate);
        let candidate_rnorm = stable_norm(candidate_residuals.as_slice());

        if candidate_rnorm.is_finite() && candidate_rnorm < rnorm {
            let ratio = candidate_rnorm / rnorm;
            let reduction = 1.0 - ratio * ratio;
            params = candidate;
            residuals = candidate_residuals;
            rnorm = candidate_rnorm;
            damping = (damping / 3.0).max(1e-15);

            if reduction <= opts.ftol || step_is_small {
                return finish(params, rnorm, iterations, FitStatus::Converged);
            }
            jac = problem.jacobian(&params);
        } else {
            if step_is_small {
                return finish(params, rnorm, iterations, FitStatus::Converged);
            }
            damping *= 10.0;
            if damping > opts.max_damping {
                return finish(params, rnorm, iterations, FitStatus::Stalled);
            }
        }
    }

    finish(params, rnorm, iterations, FitStatus::MaxIterations)
}

/// Euclidean norm that does not overflow for entries near `f64::MAX`.
///
/// Any non-finite entry makes the norm infinite.
pub fn stable_norm(values: &[f64]) -> f64 {
    let mut max = 0.0_f64;
    for &v in values {
        if !v.is_finite() {
            return f64::INFINITY;
        }
        max = max.max(v.abs());
    }
    if max == 0.0 {
        return 0.0;
    }
    max * values.iter().map(|v| (v / max).powi(2)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `y = a·exp(-b·x)` on fixed samples.
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpDecay {
        fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.x.len(),
                self.x
                    .iter()
                    .zip(&self.y)
                    .map(|(&x, &y)| p[0] * (-p[1] * x).exp() - y),
            )
        }

        fn jacobian(&self, p: &DVector<f64>) -> DMatrix<f64> {
            let mut j = DMatrix::zeros(self.x.len(), 2);
            for (i, &x) in self.x.iter().enumerate() {
                let e = (-p[1] * x).exp();
                j[(i, 0)] = e;
                j[(i, 1)] = -p[0] * x * e;
            }
            j
        }
    }

    fn exp_problem() -> ExpDecay {
        let x: Vec<f64> = (0..=10).map(f64::from).collect();
        let y = x.iter().map(|&x| 2.0 * (-0.5 * x).exp()).collect();
        ExpDecay { x, y }
    }

    #[test]
    fn recovers_exponential_parameters() {
        let problem = exp_problem();
        let report = levenberg_marquardt(
            &problem,
            &DVector::from_row_slice(&[1.0, 0.1]),
            &LmOptions::default(),
        );
        assert_eq!(report.status, FitStatus::Converged);
        assert!((report.params[0] - 2.0).abs() < 1e-6, "a={}", report.params[0]);
        assert!((report.params[1] - 0.5).abs() < 1e-6, "b={}", report.params[1]);
        assert!(report.cost < 1e-12);
    }

    #[test]
    fn iteration_cap_returns_best_iterate() {
        let problem = exp_problem();
        let start = DVector::from_row_slice(&[1.0, 0.1]);
        let start_cost = 0.5 * stable_norm(problem.residuals(&start).as_slice()).powi(2);
        let opts = LmOptions {
            max_iter: 1,
            ..LmOptions::default()
        };
        let report = levenberg_marquardt(&problem, &start, &opts);
        assert_eq!(report.iterations, 1);
        assert!(report.cost <= start_cost);
        assert_ne!(report.status, FitStatus::NonFiniteStart);
    }

    #[test]
    fn non_finite_start_is_reported() {
        let problem = ExpDecay {
            x: vec![0.0, 1000.0, 2000.0],
            y: vec![1.0, 1.0, 1.0],
        };
        let report = levenberg_marquardt(
            &problem,
            &DVector::from_row_slice(&[1.0, -1.0]),
            &LmOptions::default(),
        );
        assert_eq!(report.status, FitStatus::NonFiniteStart);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn huge_residuals_still_take_steps() {
        // `exp(-b·x)` reaches ~1e166 at the start, so `Σ r²` overflows.
        let x: Vec<f64> = (0..40).map(|i| f64::from(i) * 7_000.0).collect();
        let y = x.iter().map(|&x| 18.65 * (-2e-7 * x).exp()).collect();
        let problem = ExpDecay { x, y };
        let start = DVector::from_row_slice(&[18.65, -0.0014]);
        assert!(stable_norm(problem.residuals(&start).as_slice()).is_finite());

        let report = levenberg_marquardt(&problem, &start, &LmOptions::default());
        assert_ne!(report.status, FitStatus::NonFiniteStart);
        assert!(report.iterations > 1);
        assert!(report.cost.is_finite(), "cost={}", report.cost);
        assert_ne!(report.params, start);
    }

    #[test]
    fn stable_norm_avoids_overflow() {
        assert_eq!(stable_norm(&[3.0, 4.0]), 5.0);
        assert_eq!(stable_norm(&[]), 0.0);
        let big = stable_norm(&[3e200, 4e200]);
        assert!((big / 5e200 - 1.0).abs() < 1e-12);
        assert_eq!(stable_norm(&[1.0, f64::NAN]), f64::INFINITY);
    }
}
