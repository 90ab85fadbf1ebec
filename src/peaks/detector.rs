//! Peak candidate detection and seeding helpers.
//!
//! `detect` is a plain sliding-window maximum filter: an interior sample is a
//! candidate when it is the maximum of its closed window and clears a threshold
//! relative to the trace maximum. Plateaus produce one candidate per qualifying
//! index; `dedup_candidates` collapses them when the caller wants that.

use crate::domain::{CandidateOrigin, PeakCandidate, Trace};
use crate::error::DeconvError;
use crate::math::linspace;

/// Local maxima over `[i - window_radius, i + window_radius]` that reach
/// `threshold_fraction * max(intensity)`, in ascending position order.
///
/// The first and last `window_radius` samples are never candidates; a radius of
/// half the trace length or more therefore yields an empty list.
pub fn detect(
    trace: &Trace,
    window_radius: usize,
    threshold_fraction: f64,
) -> Result<Vec<PeakCandidate>, DeconvError> {
    if window_radius == 0 {
        return Err(DeconvError::InvalidConfig("detector window_radius must be >= 1".into()));
    }
    if !(threshold_fraction.is_finite() && (0.0..=1.0).contains(&threshold_fraction)) {
        return Err(DeconvError::InvalidConfig(format!(
            "detector threshold_fraction must be in [0, 1], got {threshold_fraction}"
        )));
    }

    let y = trace.intensities();
    let x = trace.positions();
    let n = y.len();
    let threshold = threshold_fraction * trace.max_intensity();

    let mut out = Vec::new();
    for i in window_radius..n.saturating_sub(window_radius) {
        let window = &y[i - window_radius..=i + window_radius];
        let local_max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if y[i] == local_max && y[i] >= threshold {
            out.push(PeakCandidate {
                position: x[i],
                origin: CandidateOrigin::Detected {
                    index: i,
                    intensity: y[i],
                },
            });
        }
    }

    Ok(out)
}

/// Collapse runs of candidates whose neighbours are within `min_separation`.
///
/// Input is expected in ascending position order (as `detect` returns it). Each
/// run keeps its most intense member; among equally intense members (a plateau)
/// the middle one is kept. Candidates without a known intensity rank below
/// detected ones.
pub fn dedup_candidates(candidates: &[PeakCandidate], min_separation: f64) -> Vec<PeakCandidate> {
    let mut out = Vec::new();
    let mut run: Vec<PeakCandidate> = Vec::new();

    for &c in candidates {
        if let Some(last) = run.last() {
            if (c.position - last.position).abs() > min_separation {
                out.push(pick_representative(&run));
                run.clear();
            }
        }
        run.push(c);
    }
    if !run.is_empty() {
        out.push(pick_representative(&run));
    }
    out
}

fn pick_representative(run: &[PeakCandidate]) -> PeakCandidate {
    let best = run
        .iter()
        .map(candidate_intensity)
        .fold(f64::NEG_INFINITY, f64::max);
    let tied: Vec<&PeakCandidate> = run
        .iter()
        .filter(|c| candidate_intensity(c) == best)
        .collect();
    *tied[tied.len() / 2]
}

fn candidate_intensity(c: &PeakCandidate) -> f64 {
    match c.origin {
        CandidateOrigin::Detected { intensity, .. } => intensity,
        CandidateOrigin::User | CandidateOrigin::Evenly => f64::NEG_INFINITY,
    }
}

/// `n` candidates evenly spaced over the trace's position range.
///
/// A single candidate sits at the midpoint of the range.
pub fn evenly_spaced_candidates(trace: &Trace, n: usize) -> Vec<PeakCandidate> {
    let (lo, hi) = trace.position_range();
    let positions = if n == 1 {
        vec![0.5 * (lo + hi)]
    } else {
        linspace(lo, hi, n)
    };
    positions
        .into_iter()
        .map(|position| PeakCandidate {
            position,
            origin: CandidateOrigin::Evenly,
        })
        .collect()
}
