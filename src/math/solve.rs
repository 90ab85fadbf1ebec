//! Linear solves for the damped normal equations.
//!
//! Every Levenberg–Marquardt step solves a small symmetric system
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! Implementation choices:
//! - Try Cholesky first: the damped matrix is symmetric positive definite
//!   whenever `J` has full column rank, and Cholesky is the cheapest solve.
//! - Fall back to SVD when Cholesky fails (rank-deficient Jacobian, e.g. a
//!   Gaussian whose width collapsed so one column is all zeros).
//!   (Nalgebra's `QR::solve` is intended for square systems and would also
//!   work here, but SVD degrades more gracefully on near-singular input.)

use nalgebra::{DMatrix, DVector};

/// Solve the square system `a · x = b`, preferring Cholesky.
///
/// Returns `None` if no finite solution is found.
pub fn solve_damped(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    solve_least_squares(a, b)
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
