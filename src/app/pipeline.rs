//! Shared "fit pipeline" logic used by the `fit` and `demo` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! trace -> candidates (user / evenly / detected) -> composite fit
//!
//! The commands can then focus on where the trace comes from and on presentation.

use tracing::{debug, info};

use crate::domain::{CompositeModel, DeconvConfig, DetectorConfig, PeakCandidate, Trace};
use crate::error::AppError;
use crate::fit::fit_composite;
use crate::peaks::{dedup_candidates, detect, evenly_spaced_candidates};

/// Where peak centers come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateSource {
    Explicit(Vec<f64>),
    Evenly(usize),
    Detect(DetectorConfig),
}

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub candidates: Vec<PeakCandidate>,
    pub model: CompositeModel,
}

/// Detect candidates, optionally collapsing near-duplicates.
pub fn detect_candidates(trace: &Trace, detector: &DetectorConfig) -> Result<Vec<PeakCandidate>, AppError> {
    let found = detect(trace, detector.window_radius, detector.threshold_fraction)?;
    let candidates = match detector.min_separation {
        Some(sep) => dedup_candidates(&found, sep),
        None => found,
    };
    debug!(
        detected = candidates.len(),
        radius = detector.window_radius,
        threshold = detector.threshold_fraction,
        "peak detection"
    );
    Ok(candidates)
}

pub fn select_candidates(trace: &Trace, source: &CandidateSource) -> Result<Vec<PeakCandidate>, AppError> {
    let candidates = match source {
        CandidateSource::Explicit(centers) => centers.iter().copied().map(PeakCandidate::user).collect(),
        CandidateSource::Evenly(n) => evenly_spaced_candidates(trace, *n),
        CandidateSource::Detect(detector) => {
            let found = detect_candidates(trace, detector)?;
            if found.is_empty() {
                return Err(AppError::new(
                    3,
                    "No peak candidates detected; lower --threshold or --detect-radius, or pass --peaks.",
                ));
            }
            found
        }
    };
    Ok(candidates)
}

/// Execute the full pipeline and return the computed outputs.
pub fn run_fit(trace: &Trace, source: &CandidateSource, config: &DeconvConfig) -> Result<RunOutput, AppError> {
    let candidates = select_candidates(trace, source)?;
    info!(candidates = candidates.len(), samples = trace.len(), "fitting trace");
    let model = fit_composite(trace, &candidates, config)?;
    Ok(RunOutput { candidates, model })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{demo_spec, generate_trace};

    #[test]
    fn detected_candidates_feed_the_fit() {
        let data = generate_trace(&demo_spec(3, 0.0)).unwrap();
        let source = CandidateSource::Detect(DetectorConfig::default());
        let out = run_fit(&data.trace, &source, &DeconvConfig::default()).unwrap();
        assert_eq!(out.candidates.len(), 3);
        assert_eq!(out.model.peaks.len(), 3);
        assert_eq!(out.model.fitted_count(), 3);
    }

    #[test]
    fn nothing_detected_is_exit_code_3() {
        let trace = Trace::new((0..20).map(f64::from).collect(), vec![1.0; 20]).unwrap();
        let detector = DetectorConfig {
            window_radius: 50,
            ..DetectorConfig::default()
        };
        let err = select_candidates(&trace, &CandidateSource::Detect(detector)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn explicit_and_evenly_sources() {
        let trace = Trace::new((0..=10).map(f64::from).collect(), vec![0.0; 11]).unwrap();
        let explicit = select_candidates(&trace, &CandidateSource::Explicit(vec![2.0, 7.5])).unwrap();
        assert_eq!(explicit, vec![PeakCandidate::user(2.0), PeakCandidate::user(7.5)]);
        let evenly = select_candidates(&trace, &CandidateSource::Evenly(2)).unwrap();
        assert_eq!(evenly.len(), 2);
        assert_eq!(evenly[1].position, 10.0);
    }
}
