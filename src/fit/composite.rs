//! Multi-peak coordination: anchor first, then the rest.
//!
//! Candidates are processed in the order supplied:
//!
//! 1. Fit candidates sequentially, each seeded with `anchor_width_seed`, until
//!    one succeeds. That peak is the anchor.
//! 2. Fit every later candidate with a width guess propagated from a reference
//!    width: the anchor's (independent, so optionally on the rayon pool) or the
//!    most recent successful peak's (sequential).
//! 3. Sum the successful components on a shared grid over the trace range.
//!
//! Failed peaks stay in the report; they never abort the call.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{
    CompositeModel, CurveGrid, DeconvConfig, GaussianParams, PeakCandidate, PeakFit, Trace, WidthReference,
};
use crate::error::DeconvError;
use crate::fit::fitter::{FitterOptions, fit_peak};
use crate::fit::propagation::propagate_width;
use crate::fit::refine::refine_joint;
use crate::fit::window::extract_window;
use crate::math::{linspace, r_squared};
use crate::models::predict_sum;

/// Shared, read-only inputs for every per-peak fit of one composite call.
struct FitContext<'a> {
    trace: &'a Trace,
    config: &'a DeconvConfig,
    opts: FitterOptions,
    deadline: Option<Instant>,
}

/// Fit every candidate and assemble the composite model.
///
/// Fails only on malformed input: no candidates, a non-finite candidate
/// position, or an invalid configuration.
#[tracing::instrument(level = "debug", skip_all, fields(samples = trace.len(), candidates = candidates.len()))]
pub fn fit_composite(
    trace: &Trace,
    candidates: &[PeakCandidate],
    config: &DeconvConfig,
) -> Result<CompositeModel, DeconvError> {
    config.validate()?;
    if candidates.is_empty() {
        return Err(DeconvError::NoCandidates);
    }
    if let Some(index) = candidates.iter().position(|c| !c.position.is_finite()) {
        return Err(DeconvError::NonFiniteCandidate { index });
    }

    let started = Instant::now();
    let ctx = FitContext {
        trace,
        config,
        opts: FitterOptions::from(config),
        deadline: config
            .time_budget_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms)),
    };

    let mut peaks: Vec<PeakFit> = Vec::with_capacity(candidates.len());

    // Phase 1: find the anchor.
    let mut anchor: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let fit = ctx.fit_candidate(index, candidate, config.anchor_width_seed);
        let width = fit.params().map(|p| p.width);
        peaks.push(fit);
        if let Some(width) = width {
            anchor = Some((index, width));
            break;
        }
    }

    // Phase 2: everything after the anchor.
    if let Some((anchor_index, anchor_width)) = anchor {
        let rest = anchor_index + 1..candidates.len();
        match config.width_reference {
            WidthReference::Anchor => {
                let fit_one = |index: usize| {
                    let guess = width_guess(anchor_width, index - anchor_index);
                    ctx.fit_candidate(index, &candidates[index], guess)
                };
                if config.parallel {
                    let fitted: Vec<PeakFit> = rest.into_par_iter().map(fit_one).collect();
                    peaks.extend(fitted);
                } else {
                    peaks.extend(rest.map(fit_one));
                }
            }
            WidthReference::Previous => {
                let (mut ref_index, mut ref_width) = (anchor_index, anchor_width);
                for index in rest {
                    let guess = width_guess(ref_width, index - ref_index);
                    let fit = ctx.fit_candidate(index, &candidates[index], guess);
                    if let Some(params) = fit.params() {
                        ref_index = index;
                        ref_width = params.width;
                    }
                    peaks.push(fit);
                }
            }
        }
    }

    let components: Vec<GaussianParams> = peaks.iter().filter_map(PeakFit::params).collect();
    let composite = composite_grid(trace, &components, config.grid_points);

    let global_r_squared = (!components.is_empty()).then(|| {
        let predicted: Vec<f64> = trace
            .positions()
            .iter()
            .map(|&p| predict_sum(p, &components))
            .collect();
        r_squared(trace.intensities(), &predicted)
    });

    let refinement = if config.refine_joint && !components.is_empty() {
        refine_joint(trace, &peaks, &composite.position, &config.lm)
    } else {
        None
    };

    let model = CompositeModel {
        peaks,
        composite,
        global_r_squared,
        refinement,
    };
    info!(
        candidates = candidates.len(),
        fitted = model.fitted_count(),
        failed = model.failed_count(),
        global_r_squared = ?model.global_r_squared,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "composite fit complete"
    );
    Ok(model)
}

impl FitContext<'_> {
    fn fit_candidate(&self, index: usize, candidate: &PeakCandidate, width_guess: f64) -> PeakFit {
        let window = extract_window(self.trace, candidate.position, self.config.window);
        let guess = GaussianParams::new(
            window.max_intensity().unwrap_or(0.0),
            candidate.position,
            width_guess,
        );

        let mut rng = StdRng::seed_from_u64(peak_seed(self.config.seed, index));
        let outcome = fit_peak(
            &window.positions,
            &window.intensities,
            &guess,
            &self.opts,
            &mut rng,
            self.deadline,
        );

        if let Some(failure) = outcome.failure() {
            warn!(peak = index, position = candidate.position, reason = %failure, "peak skipped");
        }

        PeakFit {
            index,
            candidate: *candidate,
            window_samples: window.len(),
            width_guess,
            outcome,
        }
    }
}

fn width_guess(reference_width: f64, distance: usize) -> f64 {
    propagate_width(reference_width, distance).unwrap_or(reference_width)
}

/// Per-peak RNG seed, independent of scheduling order.
fn peak_seed(seed: u64, index: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    index.hash(&mut hasher);
    hasher.finish()
}

fn composite_grid(trace: &Trace, components: &[GaussianParams], grid_points: usize) -> CurveGrid {
    let (lo, hi) = trace.position_range();
    let points = if hi > lo { grid_points } else { 1 };
    let position = linspace(lo, hi, points);
    let intensity = position.iter().map(|&p| predict_sum(p, components)).collect();
    CurveGrid { position, intensity }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PeakFailure, WindowMode};
    use approx::assert_relative_eq;

    fn two_peak_trace() -> Trace {
        let a = GaussianParams::new(10.0, 20.0, 4.0);
        let b = GaussianParams::new(6.0, 80.0, 6.0);
        let x: Vec<f64> = (0..=100).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|&p| a.eval(p) + b.eval(p)).collect();
        Trace::new(x, y).unwrap()
    }

    fn noisy_three_peak_trace() -> Trace {
        let comps = [
            GaussianParams::new(8.0, 25.0, 3.0),
            GaussianParams::new(5.0, 50.0, 4.0),
            GaussianParams::new(7.0, 75.0, 3.5),
        ];
        let x: Vec<f64> = (0..=200).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &p)| predict_sum(p, &comps) + 0.1 * ((i * 7919 % 17) as f64 / 8.0 - 1.0))
            .collect();
        Trace::new(x, y).unwrap()
    }

    fn user(positions: &[f64]) -> Vec<PeakCandidate> {
        positions.iter().copied().map(PeakCandidate::user).collect()
    }

    #[test]
    fn recovers_two_separated_peaks() {
        let trace = two_peak_trace();
        let model = fit_composite(&trace, &user(&[20.0, 80.0]), &DeconvConfig::default()).unwrap();

        assert_eq!(model.peaks.len(), 2);
        assert_eq!(model.fitted_count(), 2);
        let a = model.peaks[0].params().unwrap();
        let b = model.peaks[1].params().unwrap();
        assert_relative_eq!(a.center, 20.0, max_relative = 0.01);
        assert_relative_eq!(a.width, 4.0, max_relative = 0.01);
        assert_relative_eq!(b.center, 80.0, max_relative = 0.01);
        assert_relative_eq!(b.width, 6.0, max_relative = 0.01);
        assert!(model.global_r_squared.unwrap() > 0.999);

        assert_eq!(model.composite.position.len(), 1000);
        assert_eq!(model.composite.position.first(), Some(&0.0));
        assert_eq!(model.composite.position.last(), Some(&100.0));
        assert!(model.refinement.is_none());
    }

    #[test]
    fn later_peaks_start_from_propagated_width() {
        let trace = two_peak_trace();
        let model = fit_composite(&trace, &user(&[20.0, 80.0]), &DeconvConfig::default()).unwrap();
        let anchor_width = model.peaks[0].params().unwrap().width;
        assert_eq!(model.peaks[0].width_guess, 1.0);
        assert_relative_eq!(model.peaks[1].width_guess, anchor_width * 1.1);
    }

    #[test]
    fn failed_first_candidate_moves_the_anchor() {
        let trace = two_peak_trace();
        let config = DeconvConfig {
            window: WindowMode::Fixed { radius: 10.0 },
            ..DeconvConfig::default()
        };
        let model = fit_composite(&trace, &user(&[500.0, 20.0, 80.0]), &config).unwrap();

        assert_eq!(model.peaks.len(), 3);
        assert_eq!(
            model.peaks[0].outcome.failure(),
            Some(PeakFailure::InsufficientData { samples: 0 })
        );
        assert_eq!(model.peaks[0].window_samples, 0);
        assert_eq!(model.peaks[1].width_guess, config.anchor_width_seed);

        let anchor_width = model.peaks[1].params().unwrap().width;
        assert_relative_eq!(model.peaks[2].width_guess, anchor_width * 1.1);
        assert_eq!(model.fitted_count(), 2);
        assert_eq!(model.failed_count(), 1);
        assert_eq!(model.components().count(), 2);
    }

    #[test]
    fn previous_reference_follows_last_success() {
        let trace = noisy_three_peak_trace();
        let config = DeconvConfig {
            width_reference: WidthReference::Previous,
            ..DeconvConfig::default()
        };
        let model = fit_composite(&trace, &user(&[25.0, 50.0, 75.0]), &config).unwrap();
        assert_eq!(model.fitted_count(), 3);
        let middle_width = model.peaks[1].params().unwrap().width;
        assert_relative_eq!(model.peaks[2].width_guess, middle_width * 1.1);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let trace = noisy_three_peak_trace();
        let candidates = user(&[25.0, 50.0, 75.0]);
        let parallel = fit_composite(&trace, &candidates, &DeconvConfig::default()).unwrap();
        let sequential = fit_composite(
            &trace,
            &candidates,
            &DeconvConfig {
                parallel: false,
                ..DeconvConfig::default()
            },
        )
        .unwrap();
        assert_eq!(parallel, sequential);

        let again = fit_composite(&trace, &candidates, &DeconvConfig::default()).unwrap();
        assert_eq!(parallel, again);
    }

    #[test]
    fn zero_budget_skips_every_peak() {
        let trace = two_peak_trace();
        let config = DeconvConfig {
            time_budget_ms: Some(0),
            ..DeconvConfig::default()
        };
        let model = fit_composite(&trace, &user(&[20.0, 80.0]), &config).unwrap();
        assert_eq!(model.fitted_count(), 0);
        assert!(
            model
                .peaks
                .iter()
                .all(|p| p.outcome.failure() == Some(PeakFailure::BudgetExhausted))
        );
        assert_eq!(model.global_r_squared, None);
        assert!(model.composite.intensity.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn oversized_index_window_covers_whole_trace() {
        let trace = two_peak_trace();
        let config = DeconvConfig {
            window: WindowMode::Index { samples: usize::MAX },
            ..DeconvConfig::default()
        };
        assert!(config.validate().is_ok());
        let model = fit_composite(&trace, &user(&[50.0]), &config).unwrap();
        assert_eq!(model.peaks[0].window_samples, trace.len());
    }

    #[test]
    fn single_sample_trace_gives_one_point_grid() {
        let trace = Trace::new(vec![3.0], vec![1.0]).unwrap();
        let model = fit_composite(&trace, &user(&[3.0]), &DeconvConfig::default()).unwrap();
        assert_eq!(
            model.peaks[0].outcome.failure(),
            Some(PeakFailure::InsufficientData { samples: 1 })
        );
        assert_eq!(model.composite.position, vec![3.0]);
    }

    #[test]
    fn malformed_requests_are_errors() {
        let trace = two_peak_trace();
        assert_eq!(
            fit_composite(&trace, &[], &DeconvConfig::default()),
            Err(DeconvError::NoCandidates)
        );
        assert_eq!(
            fit_composite(&trace, &user(&[20.0, f64::NAN]), &DeconvConfig::default()),
            Err(DeconvError::NonFiniteCandidate { index: 1 })
        );
        let config = DeconvConfig {
            attempts_per_peak: 0,
            ..DeconvConfig::default()
        };
        assert!(matches!(
            fit_composite(&trace, &user(&[20.0]), &config),
            Err(DeconvError::InvalidConfig(_))
        ));
    }

    #[test]
    fn peak_seeds_differ_by_index() {
        assert_ne!(peak_seed(42, 0), peak_seed(42, 1));
        assert_eq!(peak_seed(42, 3), peak_seed(42, 3));
    }
}
