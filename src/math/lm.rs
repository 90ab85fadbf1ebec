//! Bounded Levenberg–Marquardt for small nonlinear least-squares problems.
//!
//! Minimizes `Σ (y_i - f(x_i; p))²` over the parameter vector `p` for a model
//! supplied through [`ResidualModel`]. The model provides its value and
//! analytic gradient at one sample; the optimizer assembles the Jacobian.
//!
//! Every call is bounded: at most `max_iterations` accepted-or-rejected outer
//! iterations, and the damping factor is capped so the inner retry loop always
//! terminates.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::solve_damped;

/// Damping above this means no descent direction was found.
const MAX_LAMBDA: f64 = 1e16;
const MIN_LAMBDA: f64 = 1e-12;
/// Floor for diagonal scaling so flat directions still get damped.
const DIAG_FLOOR: f64 = 1e-12;

/// A model `f(x; p)` with an analytic gradient in `p`.
pub trait ResidualModel: Sync {
    fn n_params(&self) -> usize;

    fn eval(&self, x: f64, params: &[f64]) -> f64;

    /// Write `∂f/∂p_j` at `x` into `out` (length `n_params`).
    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]);
}

/// Optimizer tolerances and limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Stop when an accepted step reduces the cost by less than this fraction.
    pub ftol: f64,
    /// Stop when the step is this small relative to the parameter norm.
    pub xtol: f64,
    /// Stop when the gradient's largest component falls below this.
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_lambda: 1e-3,
        }
    }
}

impl LmOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("lm.max_iterations must be >= 1".into());
        }
        for (name, v) in [
            ("ftol", self.ftol),
            ("xtol", self.xtol),
            ("gtol", self.gtol),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(format!("lm.{name} must be finite and >= 0, got {v}"));
            }
        }
        if !(self.initial_lambda.is_finite() && self.initial_lambda > 0.0) {
            return Err(format!(
                "lm.initial_lambda must be finite and > 0, got {}",
                self.initial_lambda
            ));
        }
        Ok(())
    }
}

/// A converged optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct LmReport {
    pub params: Vec<f64>,
    /// Final sum of squared residuals.
    pub cost: f64,
    pub iterations: usize,
}

/// Why the optimizer gave up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LmError {
    #[error("{samples} sample(s) cannot determine {params} parameter(s)")]
    Underdetermined { samples: usize, params: usize },

    #[error("non-finite model value or residual")]
    NonFinite,

    #[error("no descent direction found after {iterations} iteration(s)")]
    Stalled { iterations: usize },

    #[error("did not converge within {iterations} iteration(s)")]
    MaxIterations { iterations: usize },
}

/// Fit `model` to `(x, y)` starting from `initial`.
pub fn levenberg_marquardt<M: ResidualModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    initial: &[f64],
    opts: &LmOptions,
) -> Result<LmReport, LmError> {
    let n = x.len().min(y.len());
    let m = model.n_params();
    if n < m {
        return Err(LmError::Underdetermined {
            samples: n,
            params: m,
        });
    }
    if initial.len() != m || initial.iter().any(|v| !v.is_finite()) {
        return Err(LmError::NonFinite);
    }

    let mut p = DVector::from_column_slice(initial);
    let mut r = residuals(model, x, y, p.as_slice());
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(LmError::NonFinite);
    }

    let mut lambda = opts.initial_lambda;
    let mut jac = DMatrix::<f64>::zeros(n, m);
    let mut row = vec![0.0; m];

    for iter in 0..opts.max_iterations {
        if cost == 0.0 {
            return Ok(report(p, cost, iter));
        }

        fill_jacobian(model, x, p.as_slice(), &mut jac, &mut row);
        let jtj = jac.tr_mul(&jac);
        let g = jac.tr_mul(&r);
        if !g.iter().all(|v| v.is_finite()) {
            return Err(LmError::NonFinite);
        }
        if g.amax() <= opts.gtol {
            return Ok(report(p, cost, iter));
        }

        // Inner loop: raise damping until a step lowers the cost.
        loop {
            let mut a = jtj.clone();
            for j in 0..m {
                a[(j, j)] += lambda * jtj[(j, j)].max(DIAG_FLOOR);
            }

            let Some(delta) = solve_damped(&a, &g) else {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    return Err(LmError::Stalled { iterations: iter + 1 });
                }
                continue;
            };

            if delta.norm() <= opts.xtol * (p.norm() + opts.xtol) {
                return Ok(report(p, cost, iter + 1));
            }

            let p_new = &p + &delta;
            let r_new = residuals(model, x, y, p_new.as_slice());
            let cost_new = r_new.norm_squared();

            if cost_new.is_finite() && cost_new < cost {
                let reduction = (cost - cost_new) / cost;
                p = p_new;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / 10.0).max(MIN_LAMBDA);
                if reduction <= opts.ftol {
                    return Ok(report(p, cost, iter + 1));
                }
                break;
            }

            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                return Err(LmError::Stalled { iterations: iter + 1 });
            }
        }
    }

    Err(LmError::MaxIterations {
        iterations: opts.max_iterations,
    })
}

fn residuals<M: ResidualModel>(model: &M, x: &[f64], y: &[f64], p: &[f64]) -> DVector<f64> {
    DVector::from_iterator(
        x.len().min(y.len()),
        x.iter().zip(y.iter()).map(|(&xi, &yi)| yi - model.eval(xi, p)),
    )
}

fn fill_jacobian<M: ResidualModel>(model: &M, x: &[f64], p: &[f64], jac: &mut DMatrix<f64>, row: &mut [f64]) {
    for (i, &xi) in x.iter().take(jac.nrows()).enumerate() {
        model.gradient(xi, p, row);
        for (j, &v) in row.iter().enumerate() {
            jac[(i, j)] = v;
        }
    }
}

fn report(p: DVector<f64>, cost: f64, iterations: usize) -> LmReport {
    LmReport {
        params: p.iter().copied().collect(),
        cost,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `f(x) = a + b·x`, linear so LM must land on the OLS answer.
    struct Line;

    impl ResidualModel for Line {
        fn n_params(&self) -> usize {
            2
        }

        fn eval(&self, x: f64, p: &[f64]) -> f64 {
            p[0] + p[1] * x
        }

        fn gradient(&self, x: f64, _p: &[f64], out: &mut [f64]) {
            out[0] = 1.0;
            out[1] = x;
        }
    }

    /// `f(x) = a·exp(b·x)`.
    struct Exponential;

    impl ResidualModel for Exponential {
        fn n_params(&self) -> usize {
            2
        }

        fn eval(&self, x: f64, p: &[f64]) -> f64 {
            p[0] * (p[1] * x).exp()
        }

        fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
            let e = (p[1] * x).exp();
            out[0] = e;
            out[1] = p[0] * x * e;
        }
    }

    #[test]
    fn recovers_linear_model() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();
        let fit = levenberg_marquardt(&Line, &x, &y, &[0.0, 0.0], &LmOptions::default()).unwrap();
        assert!((fit.params[0] - 2.0).abs() < 1e-8);
        assert!((fit.params[1] - 3.0).abs() < 1e-8);
        assert!(fit.cost < 1e-12);
    }

    #[test]
    fn recovers_exponential_from_offset_guess() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.5 * (0.8 * v).exp()).collect();
        let fit = levenberg_marquardt(&Exponential, &x, &y, &[1.0, 0.3], &LmOptions::default()).unwrap();
        assert!((fit.params[0] - 1.5).abs() < 1e-6);
        assert!((fit.params[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn rejects_underdetermined_problem() {
        let err = levenberg_marquardt(&Line, &[1.0], &[2.0], &[0.0, 0.0], &LmOptions::default()).unwrap_err();
        assert_eq!(err, LmError::Underdetermined { samples: 1, params: 2 });
    }

    #[test]
    fn rejects_non_finite_start() {
        let err = levenberg_marquardt(&Line, &[1.0, 2.0], &[2.0, 3.0], &[f64::NAN, 0.0], &LmOptions::default())
            .unwrap_err();
        assert_eq!(err, LmError::NonFinite);
    }

    #[test]
    fn iteration_cap_is_enforced() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.5 * (0.8 * v).exp()).collect();
        let opts = LmOptions {
            max_iterations: 1,
            ..LmOptions::default()
        };
        let err = levenberg_marquardt(&Exponential, &x, &y, &[0.1, -1.0], &opts).unwrap_err();
        assert_eq!(err, LmError::MaxIterations { iterations: 1 });
    }

    #[test]
    fn options_validation() {
        assert!(LmOptions::default().validate().is_ok());
        let bad = LmOptions {
            max_iterations: 0,
            ..LmOptions::default()
        };
        assert!(bad.validate().is_err());
        let bad = LmOptions {
            initial_lambda: 0.0,
            ..LmOptions::default()
        };
        assert!(bad.validate().is_err());
    }
}
