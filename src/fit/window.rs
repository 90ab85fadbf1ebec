//! Fitting windows.
//!
//! Each candidate is fitted on a subset of the trace selected by a
//! [`WindowMode`]. Windows are copies; the trace is never modified.
//!
//! Position-based modes rely on the trace being sorted, so the bounds are found
//! with binary search rather than a scan.

use crate::domain::{Trace, WindowMode};

/// Samples selected around one candidate center.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Window {
    pub positions: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn max_intensity(&self) -> Option<f64> {
        self.intensities.iter().copied().reduce(f64::max)
    }

    fn from_range(trace: &Trace, start: usize, end: usize) -> Self {
        if start >= end {
            return Self::default();
        }
        Self {
            positions: trace.positions()[start..end].to_vec(),
            intensities: trace.intensities()[start..end].to_vec(),
        }
    }
}

/// Select the samples used to fit a peak centred at `center`.
pub fn extract_window(trace: &Trace, center: f64, mode: WindowMode) -> Window {
    match mode {
        WindowMode::Fraction { fraction } => {
            let radius = fraction * center.abs();
            position_window(trace, center - radius, center + radius)
        }
        WindowMode::Fixed { radius } => position_window(trace, center - radius, center + radius),
        WindowMode::Index { samples } => {
            let nearest = nearest_index(trace.positions(), center);
            let start = nearest.saturating_sub(samples);
            let end = nearest.saturating_add(samples).saturating_add(1).min(trace.len());
            Window::from_range(trace, start, end)
        }
        WindowMode::Full => Window::from_range(trace, 0, trace.len()),
    }
}

/// Samples with `lo <= position <= hi`.
fn position_window(trace: &Trace, lo: f64, hi: f64) -> Window {
    let x = trace.positions();
    let start = x.partition_point(|&p| p < lo);
    let end = x.partition_point(|&p| p <= hi);
    Window::from_range(trace, start, end)
}

/// Index of the sample closest to `target`; ties go to the lower index.
fn nearest_index(sorted: &[f64], target: f64) -> usize {
    let i = sorted.partition_point(|&p| p < target);
    if i == 0 {
        return 0;
    }
    if i == sorted.len() {
        return sorted.len() - 1;
    }
    if (target - sorted[i - 1]) <= (sorted[i] - target) {
        i - 1
    } else {
        i
    }
}
