//! Width propagation between neighbouring peaks.
//!
//! Peaks from the same series tend to have similar, slowly varying widths. Later
//! peaks therefore start from the reference peak's fitted width, grown by 10%
//! per step away from it and capped at 1.5x. The value only seeds the first
//! fitting attempt; the optimizer is free to move away from it.

/// Growth of the width guess per peak of distance from the reference.
const GROWTH_PER_PEAK: f64 = 0.1;
/// Upper bound on the guess relative to the reference width.
const MAX_WIDTH_RATIO: f64 = 1.5;

/// Width guess for the peak `peak_index` steps after the reference peak.
///
/// `peak_index == 0` is the reference itself and gets no bound (`None`).
pub fn propagate_width(anchor_width: f64, peak_index: usize) -> Option<f64> {
    if peak_index == 0 {
        return None;
    }
    let grown = anchor_width * (1.0 + GROWTH_PER_PEAK * peak_index as f64);
    Some(grown.min(anchor_width * MAX_WIDTH_RATIO))
}
