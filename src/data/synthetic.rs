//! Synthetic drift traces: a sum of Gaussians plus Gaussian noise.
//!
//! Used by the `demo` command and by tests that need realistic, reproducible
//! input without shipping data files.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{GaussianParams, Trace};
use crate::error::AppError;
use crate::math::linspace;
use crate::models::predict_sum;

/// Shape of a synthetic trace.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub components: Vec<GaussianParams>,
    pub x_min: f64,
    pub x_max: f64,
    pub samples: usize,
    /// Standard deviation of additive noise (0 = noise-free).
    pub noise_sd: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct SyntheticTrace {
    pub trace: Trace,
    /// The components the trace was generated from.
    pub truth: Vec<GaussianParams>,
}

/// Three-peak drift spectrum: two overlapping early peaks and a broader late one.
pub fn demo_spec(seed: u64, noise_sd: f64) -> SyntheticSpec {
    SyntheticSpec {
        components: vec![
            GaussianParams::new(100.0, 12.0, 0.6),
            GaussianParams::new(60.0, 14.5, 0.7),
            GaussianParams::new(35.0, 30.0, 1.1),
        ],
        x_min: 0.0,
        x_max: 50.0,
        samples: 501,
        noise_sd,
        seed,
    }
}

pub fn generate_trace(spec: &SyntheticSpec) -> Result<SyntheticTrace, AppError> {
    if spec.samples < 2 {
        return Err(AppError::new(2, "Synthetic trace needs at least 2 samples."));
    }
    if !(spec.x_min.is_finite() && spec.x_max.is_finite() && spec.x_max > spec.x_min) {
        return Err(AppError::new(2, "Invalid position range for synthetic trace."));
    }
    if !(spec.noise_sd.is_finite() && spec.noise_sd >= 0.0) {
        return Err(AppError::new(2, "Noise standard deviation must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(synthetic_seed(spec));
    let normal = Normal::new(0.0, spec.noise_sd)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let positions = linspace(spec.x_min, spec.x_max, spec.samples);
    let intensities: Vec<f64> = positions
        .iter()
        .map(|&p| predict_sum(p, &spec.components) + normal.sample(&mut rng))
        .collect();

    let trace = Trace::new(positions, intensities)
        .map_err(|e| AppError::new(4, format!("Synthetic trace is invalid: {e}")))?;

    Ok(SyntheticTrace {
        trace,
        truth: spec.components.clone(),
    })
}

fn synthetic_seed(spec: &SyntheticSpec) -> u64 {
    let mut hasher = DefaultHasher::new();
    spec.seed.hash(&mut hasher);
    spec.samples.hash(&mut hasher);
    spec.x_min.to_bits().hash(&mut hasher);
    spec.x_max.to_bits().hash(&mut hasher);
    spec.noise_sd.to_bits().hash(&mut hasher);
    for g in &spec.components {
        g.amplitude.to_bits().hash(&mut hasher);
        g.center.to_bits().hash(&mut hasher);
        g.width.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}
