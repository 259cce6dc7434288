//! Dense linear least squares.
//!
//! Two callers need `argmin ‖X β − y‖`:
//! - every Levenberg–Marquardt step, on the stacked system `[J·D⁻¹; √λ·I]`
//! - the log-linear start of the exponential fit, on `[1, −x]` against `ln y`
//!
//! Both are tall with two columns, so a thin SVD is cheap and copes with
//! columns that are almost parallel.

use nalgebra::{DMatrix, DVector};

/// Singular values below these cut-offs are dropped, tightest first.
const SINGULAR_CUTOFFS: [f64; 3] = [1e-10, 1e-8, 1e-6];

/// Least squares solution of `x · β ≈ y`.
///
/// `None` for non-finite input or when no cut-off yields a finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let finite = |m: &[f64]| m.iter().all(|v| v.is_finite());
    if !finite(x.as_slice()) || !finite(y.as_slice()) {
        return None;
    }

    let svd = x.clone().svd(true, true);
    SINGULAR_CUTOFFS
        .iter()
        .filter_map(|&cutoff| svd.solve(y, cutoff).ok())
        .find(|beta| finite(beta.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_log_linear_coefficients() {
        // ln y = 3 - 0.5 x, design columns [1, -x]
        let xs = [0.0, 1.0, 2.0, 4.0];
        let design = DMatrix::from_fn(xs.len(), 2, |i, j| if j == 0 { 1.0 } else { -xs[i] });
        let target = DVector::from_iterator(xs.len(), xs.iter().map(|x| 3.0 - 0.5 * x));

        let beta = solve_least_squares(&design, &target).unwrap();
        assert!((beta[0] - 3.0).abs() < 1e-10, "c={}", beta[0]);
        assert!((beta[1] - 0.5).abs() < 1e-10, "b={}", beta[1]);
    }

    #[test]
    fn damped_rows_shrink_the_solution() {
        // [1; √λ] β = [1; 0] gives β = 1 / (1 + λ)
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 0.0]);
        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, f64::INFINITY]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }
}
