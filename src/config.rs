//! Run configuration: JSON file first, command-line flags on top.
//!
//! ```json
//! {
//!   "fit": { "window": { "mode": "fixed", "radius": 2.5 }, "attempts_per_peak": 20 },
//!   "detector": { "window_radius": 8, "threshold_fraction": 0.05 }
//! }
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::{DetectorArgs, FittingArgs};
use crate::domain::{DeconvConfig, DetectorConfig};
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub fit: DeconvConfig,
    pub detector: DetectorConfig,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| AppError::new(2, format!("Invalid config '{}': {e}", path.display())))
    }

    /// Load `path` if given, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Overlay explicitly set fitting flags.
    pub fn apply_fitting(&mut self, args: &FittingArgs) {
        let fit = &mut self.fit;
        if let Some(window) = args.window {
            fit.window = window;
        }
        if let Some(attempts) = args.attempts {
            fit.attempts_per_peak = attempts;
        }
        if let Some(seed) = args.seed {
            fit.seed = seed;
        }
        if let Some(width_ref) = args.width_ref {
            fit.width_reference = width_ref;
        }
        if let Some(seeding) = args.center_seeding {
            fit.center_seeding = seeding;
        }
        if let Some(width) = args.anchor_width {
            fit.anchor_width_seed = width;
        }
        if let Some(points) = args.grid_points {
            fit.grid_points = points;
        }
        if args.budget_ms.is_some() {
            fit.time_budget_ms = args.budget_ms;
        }
        fit.refine_joint |= args.refine;
        if args.sequential {
            fit.parallel = false;
        }
    }

    /// Overlay explicitly set detector flags.
    pub fn apply_detector(&mut self, args: &DetectorArgs) {
        if let Some(radius) = args.detect_radius {
            self.detector.window_radius = radius;
        }
        if let Some(threshold) = args.threshold {
            self.detector.threshold_fraction = threshold;
        }
        if args.min_separation.is_some() {
            self.detector.min_separation = args.min_separation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{WidthReference, WindowMode};

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RunConfig = serde_json::from_str(
            r#"{ "fit": { "window": { "mode": "fixed", "radius": 2.5 }, "attempts_per_peak": 20 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.fit.window, WindowMode::Fixed { radius: 2.5 });
        assert_eq!(cfg.fit.attempts_per_peak, 20);
        assert_eq!(cfg.fit.seed, 42);
        assert_eq!(cfg.detector, DetectorConfig::default());
    }

    #[test]
    fn flags_override_file_values() {
        let mut cfg = RunConfig::default();
        cfg.fit.attempts_per_peak = 20;
        cfg.apply_fitting(&FittingArgs {
            attempts: Some(3),
            width_ref: Some(WidthReference::Previous),
            sequential: true,
            ..FittingArgs::default()
        });
        cfg.apply_detector(&DetectorArgs {
            threshold: Some(0.25),
            ..DetectorArgs::default()
        });
        assert_eq!(cfg.fit.attempts_per_peak, 3);
        assert_eq!(cfg.fit.width_reference, WidthReference::Previous);
        assert!(!cfg.fit.parallel);
        assert!(!cfg.fit.refine_joint);
        assert_eq!(cfg.detector.threshold_fraction, 0.25);
        assert_eq!(cfg.detector.window_radius, 5);
    }

    #[test]
    fn missing_file_is_exit_code_2() {
        let err = RunConfig::load(Some(Path::new("/nonexistent/deconv.json"))).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
