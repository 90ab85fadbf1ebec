//! Single-peak Gaussian fitting with randomized restarts.
//!
//! Given:
//! - window positions `x_i` and intensities `y_i`
//! - an initial guess (amplitude, center, width)
//! - an attempt budget
//!
//! we run Levenberg–Marquardt from several starting points:
//! - attempt 0 starts from the supplied guess
//! - later attempts start from a randomized guess around the window's scale
//!
//! and return the converged attempt with the highest R² over the window.
//! Attempts that fail to converge, or converge to a non-positive width, are
//! discarded rather than scored.

use std::time::Instant;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::debug;

use crate::domain::{CenterSeeding, DeconvConfig, FitOutcome, FittedPeak, GaussianParams, PeakFailure};
use crate::math::{LmError, LmOptions, levenberg_marquardt, r_squared, std_dev};
use crate::models::SingleGaussian;

/// Fewer samples than parameters leaves the Gaussian underdetermined.
pub const MIN_FIT_SAMPLES: usize = 3;

/// Randomized amplitude guess, as a multiple of the window's max intensity.
const AMPLITUDE_SPREAD: (f64, f64) = (0.8, 1.2);
/// Randomized width guess, as a multiple of the std-dev of window positions.
const WIDTH_SPREAD: (f64, f64) = (0.1, 2.0);

/// Options for a single-peak fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitterOptions {
    pub attempts: usize,
    pub center_seeding: CenterSeeding,
    pub lm: LmOptions,
}

impl Default for FitterOptions {
    fn default() -> Self {
        Self {
            attempts: 10,
            center_seeding: CenterSeeding::Fixed,
            lm: LmOptions::default(),
        }
    }
}

impl From<&DeconvConfig> for FitterOptions {
    fn from(config: &DeconvConfig) -> Self {
        Self {
            attempts: config.attempts_per_peak,
            center_seeding: config.center_seeding,
            lm: config.lm,
        }
    }
}

/// Why one attempt produced no usable fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Optimizer(#[from] LmError),

    #[error("degenerate result (amplitude={}, center={}, width={})", .0.amplitude, .0.center, .0.width)]
    Degenerate(GaussianParams),

    #[error("R² is not finite")]
    Unscorable,
}

/// A converged, scored attempt.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoredAttempt {
    pub params: GaussianParams,
    pub r_squared: f64,
    pub fitted_curve: Vec<f64>,
}

/// Outcome of a bounded retry loop.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RetrySummary {
    /// `(attempt index, attempt)` with the highest R².
    pub best: Option<(usize, ScoredAttempt)>,
    pub run: usize,
    pub converged: usize,
}

/// Run up to `attempts` attempts, keeping the highest-R² success.
///
/// Stops early only when `deadline` passes; ties keep the earlier attempt.
pub(crate) fn best_of_attempts<F>(attempts: usize, deadline: Option<Instant>, mut attempt: F) -> RetrySummary
where
    F: FnMut(usize) -> Result<ScoredAttempt, AttemptFailure>,
{
    let mut summary = RetrySummary {
        best: None,
        run: 0,
        converged: 0,
    };

    for k in 0..attempts {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!(attempt = k, "time budget reached, skipping remaining attempts");
            break;
        }
        summary.run += 1;

        match attempt(k) {
            Ok(scored) => {
                debug!(attempt = k, r_squared = scored.r_squared, "attempt converged");
                summary.converged += 1;
                let better = summary
                    .best
                    .as_ref()
                    .is_none_or(|(_, best)| scored.r_squared > best.r_squared);
                if better {
                    summary.best = Some((k, scored));
                }
            }
            Err(err) => debug!(attempt = k, error = %err, "attempt discarded"),
        }
    }

    summary
}

/// Fit one Gaussian to `(positions, intensities)`.
///
/// Never fails as a call: too few samples, no converged attempt, or an expired
/// deadline all come back as `FitOutcome::Failed`.
pub fn fit_peak<R: Rng + ?Sized>(
    positions: &[f64],
    intensities: &[f64],
    guess: &GaussianParams,
    opts: &FitterOptions,
    rng: &mut R,
    deadline: Option<Instant>,
) -> FitOutcome {
    let n = positions.len().min(intensities.len());
    if n < MIN_FIT_SAMPLES {
        return FitOutcome::failed(PeakFailure::InsufficientData { samples: n });
    }
    let positions = &positions[..n];
    let intensities = &intensities[..n];

    let scale = WindowScale::of(positions, intensities);

    let summary = best_of_attempts(opts.attempts, deadline, |k| {
        let start = if k == 0 {
            *guess
        } else {
            scale.randomized_guess(&mut *rng, guess, opts.center_seeding)
        };
        run_attempt(positions, intensities, &start, &opts.lm)
    });

    match summary.best {
        Some((best_attempt, best)) => FitOutcome::Fitted(FittedPeak {
            params: best.params,
            r_squared: best.r_squared,
            window_positions: positions.to_vec(),
            fitted_curve: best.fitted_curve,
            best_attempt,
            attempts_run: summary.run,
            attempts_converged: summary.converged,
        }),
        None if summary.run == 0 => FitOutcome::failed(PeakFailure::BudgetExhausted),
        None => FitOutcome::failed(PeakFailure::NonConvergence {
            attempts: summary.run,
        }),
    }
}

/// Seeded convenience wrapper around [`fit_peak`] with default optimizer options.
pub fn fit_gaussian(
    positions: &[f64],
    intensities: &[f64],
    guess: &GaussianParams,
    attempts: usize,
    seed: u64,
) -> FitOutcome {
    let opts = FitterOptions {
        attempts,
        ..FitterOptions::default()
    };
    let mut rng = StdRng::seed_from_u64(seed);
    fit_peak(positions, intensities, guess, &opts, &mut rng, None)
}

fn run_attempt(
    positions: &[f64],
    intensities: &[f64],
    start: &GaussianParams,
    lm: &LmOptions,
) -> Result<ScoredAttempt, AttemptFailure> {
    let fit = levenberg_marquardt(&SingleGaussian, positions, intensities, &start.to_array(), lm)?;
    let params = GaussianParams::from_slice(&fit.params);
    if !params.is_valid() {
        return Err(AttemptFailure::Degenerate(params));
    }

    let fitted_curve: Vec<f64> = positions.iter().map(|&p| params.eval(p)).collect();
    let r2 = r_squared(intensities, &fitted_curve);
    if !r2.is_finite() {
        return Err(AttemptFailure::Unscorable);
    }

    Ok(ScoredAttempt {
        params,
        r_squared: r2,
        fitted_curve,
    })
}

/// Scale of a window, used to draw randomized starting points.
struct WindowScale {
    max_intensity: f64,
    lo: f64,
    hi: f64,
    position_sd: f64,
}

impl WindowScale {
    fn of(positions: &[f64], intensities: &[f64]) -> Self {
        let (lo, hi) = positions
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Self {
            max_intensity: intensities.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            lo,
            hi,
            position_sd: std_dev(positions).unwrap_or(0.0),
        }
    }

    fn randomized_guess<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        guess: &GaussianParams,
        seeding: CenterSeeding,
    ) -> GaussianParams {
        let amplitude = rng.gen_range(AMPLITUDE_SPREAD.0..=AMPLITUDE_SPREAD.1) * self.max_intensity;
        let center = match seeding {
            CenterSeeding::Fixed => guess.center,
            CenterSeeding::Uniform if self.hi > self.lo => rng.gen_range(self.lo..=self.hi),
            CenterSeeding::Uniform => self.lo,
        };
        let width = if self.position_sd > 0.0 {
            rng.gen_range(WIDTH_SPREAD.0..=WIDTH_SPREAD.1) * self.position_sd
        } else {
            guess.width
        };
        GaussianParams::new(amplitude, center, width)
    }
}
