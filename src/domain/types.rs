//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DeconvError;
use crate::math::LmOptions;

/// `2 * sqrt(2 * ln 2)`: converts a Gaussian sigma to its full width at half maximum.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// A 1-D intensity trace (e.g. a drift-time spectrum).
///
/// Positions are finite and sorted ascending; intensities are finite. The
/// engine only ever borrows a trace, it never mutates one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TraceColumns")]
pub struct Trace {
    positions: Vec<f64>,
    intensities: Vec<f64>,
}

/// Unchecked serialized form; deserializing goes through [`Trace::new`].
#[derive(Deserialize)]
struct TraceColumns {
    positions: Vec<f64>,
    intensities: Vec<f64>,
}

impl TryFrom<TraceColumns> for Trace {
    type Error = DeconvError;

    fn try_from(columns: TraceColumns) -> Result<Self, Self::Error> {
        Trace::new(columns.positions, columns.intensities)
    }
}

impl Trace {
    /// Build a trace from two equal-length columns.
    pub fn new(positions: Vec<f64>, intensities: Vec<f64>) -> Result<Self, DeconvError> {
        if positions.len() != intensities.len() {
            return Err(DeconvError::LengthMismatch {
                positions: positions.len(),
                intensities: intensities.len(),
            });
        }
        if positions.is_empty() {
            return Err(DeconvError::EmptyTrace);
        }
        for (index, (p, y)) in positions.iter().zip(intensities.iter()).enumerate() {
            if !(p.is_finite() && y.is_finite()) {
                return Err(DeconvError::NonFiniteSample { index });
            }
        }
        if let Some(index) = positions.windows(2).position(|w| w[1] < w[0]) {
            return Err(DeconvError::UnsortedPositions { index: index + 1 });
        }
        Ok(Self {
            positions,
            intensities,
        })
    }

    /// Build a trace from `(position, intensity)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, DeconvError> {
        let (positions, intensities) = pairs.iter().copied().unzip();
        Self::new(positions, intensities)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always false for a constructed trace.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// `(min, max)` position. Positions are sorted so this is first/last.
    pub fn position_range(&self) -> (f64, f64) {
        (self.positions[0], self.positions[self.positions.len() - 1])
    }

    pub fn max_intensity(&self) -> f64 {
        self.intensities
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Where a peak candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CandidateOrigin {
    /// Local maximum found by the peak detector.
    Detected { index: usize, intensity: f64 },
    /// Supplied literally by the caller.
    User,
    /// Evenly spaced seed over the trace range.
    Evenly,
}

/// A hypothesised peak center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakCandidate {
    pub position: f64,
    pub origin: CandidateOrigin,
}

impl PeakCandidate {
    pub fn user(position: f64) -> Self {
        Self {
            position,
            origin: CandidateOrigin::User,
        }
    }
}

/// One Gaussian component: `amplitude * exp(-(p - center)^2 / (2 * width^2))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    pub amplitude: f64,
    pub center: f64,
    pub width: f64,
}

impl GaussianParams {
    pub fn new(amplitude: f64, center: f64, width: f64) -> Self {
        Self {
            amplitude,
            center,
            width,
        }
    }

    pub fn eval(&self, position: f64) -> f64 {
        crate::models::gaussian(position, self.amplitude, self.center, self.width)
    }

    /// Accepted fits need finite parameters and a strictly positive width.
    pub fn is_valid(&self) -> bool {
        self.amplitude.is_finite() && self.center.is_finite() && self.width.is_finite() && self.width > 0.0
    }

    pub fn fwhm(&self) -> f64 {
        FWHM_PER_SIGMA * self.width
    }

    /// Integrated area under the component.
    pub fn area(&self) -> f64 {
        self.amplitude * self.width * (2.0 * std::f64::consts::PI).sqrt()
    }

    pub(crate) fn to_array(self) -> [f64; 3] {
        [self.amplitude, self.center, self.width]
    }

    pub(crate) fn from_slice(p: &[f64]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

/// Why a peak ended up with `succeeded = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum PeakFailure {
    #[error("insufficient data: {samples} sample(s) in fitting window, need at least 3")]
    InsufficientData { samples: usize },

    #[error("no converged fit after {attempts} attempt(s)")]
    NonConvergence { attempts: usize },

    #[error("time budget exhausted before any attempt ran")]
    BudgetExhausted,
}

/// A successful single-peak fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPeak {
    pub params: GaussianParams,
    /// R² over the fitting window only.
    pub r_squared: f64,
    /// Window positions the fit was scored on.
    pub window_positions: Vec<f64>,
    /// Model evaluated at `window_positions`.
    pub fitted_curve: Vec<f64>,
    /// Attempt index (0-based) that produced the best R².
    pub best_attempt: usize,
    pub attempts_run: usize,
    pub attempts_converged: usize,
}

/// Explicit success/failure of a single-peak fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FitOutcome {
    Fitted(FittedPeak),
    Failed { failure: PeakFailure },
}

impl FitOutcome {
    pub fn failed(failure: PeakFailure) -> Self {
        FitOutcome::Failed { failure }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, FitOutcome::Fitted(_))
    }

    pub fn fitted(&self) -> Option<&FittedPeak> {
        match self {
            FitOutcome::Fitted(peak) => Some(peak),
            FitOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<PeakFailure> {
        match self {
            FitOutcome::Fitted(_) => None,
            FitOutcome::Failed { failure } => Some(*failure),
        }
    }
}

/// Per-candidate report inside a composite fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakFit {
    /// Position of the candidate in the supplied list.
    pub index: usize,
    pub candidate: PeakCandidate,
    pub window_samples: usize,
    /// Width used for the seeded (first) attempt.
    pub width_guess: f64,
    pub outcome: FitOutcome,
}

impl PeakFit {
    pub fn succeeded(&self) -> bool {
        self.outcome.succeeded()
    }

    pub fn params(&self) -> Option<GaussianParams> {
        self.outcome.fitted().map(|f| f.params)
    }

    pub fn r_squared(&self) -> Option<f64> {
        self.outcome.fitted().map(|f| f.r_squared)
    }
}

/// A curve sampled on a shared position grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGrid {
    pub position: Vec<f64>,
    pub intensity: Vec<f64>,
}

/// Result of refitting all successful peaks jointly over the full trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointRefinement {
    /// `(candidate index, refined params)` for every peak that took part.
    pub peaks: Vec<(usize, GaussianParams)>,
    /// R² of the summed refined model over the full trace.
    pub r_squared: f64,
    /// Summed refined model on the composite grid.
    pub curve: Vec<f64>,
}

/// Output of a composite fit: per-peak reports plus the summed reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeModel {
    /// One entry per candidate, in candidate order.
    pub peaks: Vec<PeakFit>,
    /// Sum of all successful components on a fine grid over the trace range.
    pub composite: CurveGrid,
    /// R² of the summed per-peak model over the full trace.
    pub global_r_squared: Option<f64>,
    pub refinement: Option<JointRefinement>,
}

impl CompositeModel {
    pub fn fitted_count(&self) -> usize {
        self.peaks.iter().filter(|p| p.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.peaks.len() - self.fitted_count()
    }

    /// Successful components in candidate order.
    pub fn components(&self) -> impl Iterator<Item = GaussianParams> + '_ {
        self.peaks.iter().filter_map(PeakFit::params)
    }
}

/// Portable JSON form of a composite fit, reloadable for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    /// Source trace, when the fit came from a file.
    pub input: Option<String>,
    pub config: DeconvConfig,
    pub model: CompositeModel,
}

/// Which samples are used to fit one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum WindowMode {
    /// `position ∈ [c - f·|c|, c + f·|c|]`.
    Fraction { fraction: f64 },
    /// `position ∈ [c - r, c + r]`.
    Fixed { radius: f64 },
    /// Closest sample to `c` plus `samples` neighbours on each side by index.
    Index { samples: usize },
    /// Every sample of the trace.
    Full,
}

impl Default for WindowMode {
    fn default() -> Self {
        WindowMode::Index { samples: 10 }
    }
}

impl fmt::Display for WindowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowMode::Fraction { fraction } => write!(f, "fraction:{fraction}"),
            WindowMode::Fixed { radius } => write!(f, "fixed:{radius}"),
            WindowMode::Index { samples } => write!(f, "index:{samples}"),
            WindowMode::Full => write!(f, "full"),
        }
    }
}

/// Parses the CLI form: `index:10`, `fixed:2.5`, `fraction:0.05`, `full`.
impl FromStr for WindowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("full") {
            return Ok(WindowMode::Full);
        }
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <kind>:<value> or 'full', got '{s}'"))?;
        let bad = |e: &dyn fmt::Display| format!("invalid window value '{value}': {e}");
        match kind.to_ascii_lowercase().as_str() {
            "index" => Ok(WindowMode::Index {
                samples: value.parse().map_err(|e| bad(&e))?,
            }),
            "fixed" => Ok(WindowMode::Fixed {
                radius: value.parse().map_err(|e| bad(&e))?,
            }),
            "fraction" => Ok(WindowMode::Fraction {
                fraction: value.parse().map_err(|e| bad(&e))?,
            }),
            other => Err(format!("unknown window kind '{other}' (index, fixed, fraction, full)")),
        }
    }
}

/// How randomized restarts place the initial center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CenterSeeding {
    /// Keep the supplied center (seeded fit).
    #[default]
    Fixed,
    /// Draw uniformly over the window's position range (blind search).
    Uniform,
}

/// Which fitted width later peaks propagate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WidthReference {
    /// The anchor (first successful) peak. Allows parallel fitting.
    #[default]
    Anchor,
    /// The most recent successful peak. Sequential.
    Previous,
}

/// Configuration of one composite fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeconvConfig {
    pub window: WindowMode,
    pub attempts_per_peak: usize,
    pub center_seeding: CenterSeeding,
    /// Width guess for peaks fit before any width is known.
    pub anchor_width_seed: f64,
    pub width_reference: WidthReference,
    /// Base seed for randomized restarts.
    pub seed: u64,
    /// Points in the composite reconstruction grid.
    pub grid_points: usize,
    /// Fit post-anchor peaks on the rayon pool.
    pub parallel: bool,
    /// Wall-clock budget for the whole composite fit.
    pub time_budget_ms: Option<u64>,
    /// Refit all successful peaks jointly over the full trace.
    pub refine_joint: bool,
    pub lm: LmOptions,
}

impl Default for DeconvConfig {
    fn default() -> Self {
        Self {
            window: WindowMode::default(),
            attempts_per_peak: 10,
            center_seeding: CenterSeeding::default(),
            anchor_width_seed: 1.0,
            width_reference: WidthReference::default(),
            seed: 42,
            grid_points: 1000,
            parallel: true,
            time_budget_ms: None,
            refine_joint: false,
            lm: LmOptions::default(),
        }
    }
}

impl DeconvConfig {
    pub fn validate(&self) -> Result<(), DeconvError> {
        let invalid = |msg: String| Err(DeconvError::InvalidConfig(msg));

        if self.attempts_per_peak == 0 {
            return invalid("attempts_per_peak must be >= 1".into());
        }
        if self.grid_points == 0 {
            return invalid("grid_points must be >= 1".into());
        }
        if !(self.anchor_width_seed.is_finite() && self.anchor_width_seed > 0.0) {
            return invalid(format!(
                "anchor_width_seed must be finite and > 0, got {}",
                self.anchor_width_seed
            ));
        }
        match self.window {
            WindowMode::Fraction { fraction } if !(fraction.is_finite() && fraction >= 0.0) => {
                return invalid(format!("window fraction must be finite and >= 0, got {fraction}"));
            }
            WindowMode::Fixed { radius } if !(radius.is_finite() && radius >= 0.0) => {
                return invalid(format!("window radius must be finite and >= 0, got {radius}"));
            }
            WindowMode::Index { samples: 0 } => {
                return invalid("index window needs at least 1 sample per side".into());
            }
            _ => {}
        }
        self.lm.validate().map_err(DeconvError::InvalidConfig)
    }
}

/// Configuration of the peak detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub window_radius: usize,
    pub threshold_fraction: f64,
    /// Collapse detections closer than this (position units).
    pub min_separation: Option<f64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_radius: 5,
            threshold_fraction: 0.1,
            min_separation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn trace_rejects_malformed_input() {
        assert_eq!(Trace::new(vec![], vec![]), Err(DeconvError::EmptyTrace));
        assert_eq!(
            Trace::new(vec![1.0, 2.0], vec![1.0]),
            Err(DeconvError::LengthMismatch {
                positions: 2,
                intensities: 1
            })
        );
        assert_eq!(
            Trace::new(vec![1.0, f64::NAN], vec![1.0, 2.0]),
            Err(DeconvError::NonFiniteSample { index: 1 })
        );
        assert_eq!(
            Trace::new(vec![1.0, 3.0, 2.0], vec![1.0, 2.0, 3.0]),
            Err(DeconvError::UnsortedPositions { index: 2 })
        );
    }

    #[test]
    fn deserialized_trace_is_validated() {
        let trace: Trace = serde_json::from_str(r#"{"positions":[1.0,2.0],"intensities":[5.0,6.0]}"#).unwrap();
        assert_eq!(trace.len(), 2);

        assert!(serde_json::from_str::<Trace>(r#"{"positions":[],"intensities":[]}"#).is_err());
        assert!(serde_json::from_str::<Trace>(r#"{"positions":[2.0,1.0],"intensities":[5.0,6.0]}"#).is_err());
    }

    #[test]
    fn trace_accessors() {
        let trace = Trace::from_pairs(&[(1.0, 4.0), (2.0, 9.0), (3.0, 1.0)]).unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.position_range(), (1.0, 3.0));
        assert_eq!(trace.max_intensity(), 9.0);
    }

    #[test]
    fn gaussian_derived_quantities() {
        let g = GaussianParams::new(10.0, 50.0, 5.0);
        assert_relative_eq!(g.eval(50.0), 10.0);
        assert_relative_eq!(g.fwhm(), 11.774100225, epsilon = 1e-8);
        assert_relative_eq!(g.area(), 10.0 * 5.0 * (2.0 * std::f64::consts::PI).sqrt());
        assert!(g.is_valid());
        assert!(!GaussianParams::new(1.0, 0.0, 0.0).is_valid());
        assert!(!GaussianParams::new(1.0, 0.0, -2.0).is_valid());
    }

    #[test]
    fn window_mode_parses_cli_syntax() {
        assert_eq!("index:10".parse::<WindowMode>(), Ok(WindowMode::Index { samples: 10 }));
        assert_eq!("fixed:2.5".parse::<WindowMode>(), Ok(WindowMode::Fixed { radius: 2.5 }));
        assert_eq!(
            "fraction:0.05".parse::<WindowMode>(),
            Ok(WindowMode::Fraction { fraction: 0.05 })
        );
        assert_eq!("FULL".parse::<WindowMode>(), Ok(WindowMode::Full));
        assert!("index".parse::<WindowMode>().is_err());
        assert!("radius:3".parse::<WindowMode>().is_err());
        assert!("index:abc".parse::<WindowMode>().is_err());
    }

    #[test]
    fn config_validation() {
        assert!(DeconvConfig::default().validate().is_ok());

        let mut config = DeconvConfig::default();
        config.attempts_per_peak = 0;
        assert!(matches!(config.validate(), Err(DeconvError::InvalidConfig(_))));

        let mut config = DeconvConfig::default();
        config.window = WindowMode::Index { samples: 0 };
        assert!(config.validate().is_err());

        let mut config = DeconvConfig::default();
        config.window = WindowMode::Fixed { radius: -1.0 };
        assert!(config.validate().is_err());

        let mut config = DeconvConfig::default();
        config.anchor_width_seed = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_deserializes_partial_json() {
        let config: DeconvConfig =
            serde_json::from_str(r#"{"attempts_per_peak": 3, "window": {"mode": "fixed", "radius": 4.0}}"#)
                .unwrap();
        assert_eq!(config.attempts_per_peak, 3);
        assert_eq!(config.window, WindowMode::Fixed { radius: 4.0 });
        assert_eq!(config.seed, DeconvConfig::default().seed);
    }
}
