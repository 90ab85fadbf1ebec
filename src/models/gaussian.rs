//! Gaussian model evaluation.
//!
//! The fitters rely on two primitive operations:
//! - evaluate `f(p)` for given parameters (for residuals/plots)
//! - fill the gradient row `∂f/∂(amplitude, center, width)` (for the Jacobian)
//!
//! These are implemented here for one component and for a sum of components.
//! Parameter vectors are flat `[amplitude, center, width]` triples, one per
//! component, only at the optimizer boundary; everything else works with
//! `GaussianParams`.

use crate::domain::GaussianParams;
use crate::math::ResidualModel;

/// `amplitude * exp(-(x - center)^2 / (2 * width^2))`.
pub fn gaussian(x: f64, amplitude: f64, center: f64, width: f64) -> f64 {
    let z = (x - center) / width;
    amplitude * (-0.5 * z * z).exp()
}

/// Fill `[∂f/∂amplitude, ∂f/∂center, ∂f/∂width]` at `x`.
///
/// # Panics
/// Panics if `out` has fewer than 3 elements.
pub fn fill_gradient(x: f64, amplitude: f64, center: f64, width: f64, out: &mut [f64]) {
    let d = x - center;
    let w2 = width * width;
    let e = (-0.5 * d * d / w2).exp();
    out[0] = e;
    out[1] = amplitude * e * d / w2;
    out[2] = amplitude * e * d * d / (w2 * width);
}

/// Sum of several components at `x`.
pub fn predict_sum(x: f64, components: &[GaussianParams]) -> f64 {
    components.iter().map(|g| g.eval(x)).sum()
}

/// One Gaussian component (3 parameters).
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleGaussian;

impl ResidualModel for SingleGaussian {
    fn n_params(&self) -> usize {
        3
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        gaussian(x, p[0], p[1], p[2])
    }

    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        fill_gradient(x, p[0], p[1], p[2], out);
    }
}

/// Sum of `components` Gaussians (`3 * components` parameters).
#[derive(Debug, Clone, Copy)]
pub struct GaussianSum {
    pub components: usize,
}

impl ResidualModel for GaussianSum {
    fn n_params(&self) -> usize {
        3 * self.components
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        p.chunks_exact(3).map(|c| gaussian(x, c[0], c[1], c[2])).sum()
    }

    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        for (c, o) in p.chunks_exact(3).zip(out.chunks_exact_mut(3)) {
            fill_gradient(x, c[0], c[1], c[2], o);
        }
    }
}
