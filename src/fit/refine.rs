//! Joint refinement of all successful peaks over the full trace.
//!
//! Per-peak fits only see their own window, so overlapping peaks bias each
//! other. Refinement seeds one sum-of-Gaussians model with every successful
//! per-peak result and fits it against the whole trace in a single pass.

use tracing::{debug, warn};

use crate::domain::{GaussianParams, JointRefinement, PeakFit, Trace};
use crate::math::{LmOptions, levenberg_marquardt, r_squared};
use crate::models::{GaussianSum, predict_sum};

/// Refit every successful peak in `peaks` jointly.
///
/// Returns `None` (with a warning) when there is nothing to refine, the
/// optimizer does not converge, or any refined width is not positive.
pub fn refine_joint(trace: &Trace, peaks: &[PeakFit], grid: &[f64], lm: &LmOptions) -> Option<JointRefinement> {
    let seeds: Vec<(usize, GaussianParams)> = peaks
        .iter()
        .filter_map(|p| p.params().map(|params| (p.index, params)))
        .collect();
    if seeds.is_empty() {
        return None;
    }

    let model = GaussianSum {
        components: seeds.len(),
    };
    let initial: Vec<f64> = seeds.iter().flat_map(|(_, g)| g.to_array()).collect();

    let report = match levenberg_marquardt(&model, trace.positions(), trace.intensities(), &initial, lm) {
        Ok(report) => report,
        Err(err) => {
            warn!(components = seeds.len(), error = %err, "joint refinement discarded");
            return None;
        }
    };

    let refined: Vec<GaussianParams> = report.params.chunks_exact(3).map(GaussianParams::from_slice).collect();
    if let Some(bad) = refined.iter().position(|g| !g.is_valid()) {
        warn!(peak = seeds[bad].0, "joint refinement produced a degenerate component");
        return None;
    }

    let predicted: Vec<f64> = trace
        .positions()
        .iter()
        .map(|&p| predict_sum(p, &refined))
        .collect();
    let r2 = r_squared(trace.intensities(), &predicted);
    debug!(iterations = report.iterations, r_squared = r2, "joint refinement converged");

    Some(JointRefinement {
        peaks: seeds.iter().map(|(i, _)| *i).zip(refined.iter().copied()).collect(),
        r_squared: r2,
        curve: grid.iter().map(|&p| predict_sum(p, &refined)).collect(),
    })
}
