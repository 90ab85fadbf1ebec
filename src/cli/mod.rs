//! Command-line parsing for the drift-trace deconvolution tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{CenterSeeding, WidthReference, WindowMode};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "deconv", version, about = "Multi-peak Gaussian deconvolution of drift traces")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit Gaussian peaks to a trace CSV, print the report, and optionally plot/export.
    Fit(FitArgs),
    /// List detected peak candidates only (useful for choosing `--peaks`).
    Detect(DetectArgs),
    /// Fit a synthetic three-peak drift spectrum.
    Demo(DemoArgs),
    /// Plot a previously exported model JSON.
    Plot(PlotArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Trace CSV (`x,y` columns, or the first two columns).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub fitting: FittingArgs,

    #[command(flatten)]
    pub detector: DetectorArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct DetectArgs {
    /// Trace CSV (`x,y` columns, or the first two columns).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// JSON config file (only its `detector` section is used here).
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub detector: DetectorArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Standard deviation of the additive noise.
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,

    /// Also write the generated trace to CSV.
    #[arg(long, value_name = "CSV")]
    pub write_trace: Option<PathBuf>,

    #[command(flatten)]
    pub fitting: FittingArgs,

    #[command(flatten)]
    pub detector: DetectorArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Options for plotting a saved model.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Model JSON file produced by `deconv fit --export-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Candidate selection and fitting options.
///
/// Unset options fall back to the config file, then to built-in defaults.
#[derive(Debug, Args, Clone, Default)]
pub struct FittingArgs {
    /// Comma-separated peak centers (skips detection).
    #[arg(long, value_delimiter = ',', conflicts_with = "evenly")]
    pub peaks: Option<Vec<f64>>,

    /// Seed N evenly spaced centers over the trace range (skips detection).
    #[arg(long, value_name = "N")]
    pub evenly: Option<usize>,

    /// Fitting window: index:N, fixed:R, fraction:F or full.
    #[arg(long)]
    pub window: Option<WindowMode>,

    /// Randomized attempts per peak.
    #[arg(long)]
    pub attempts: Option<usize>,

    /// Base seed for randomized restarts (and the demo trace).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Width the later peaks' guesses propagate from.
    #[arg(long, value_enum)]
    pub width_ref: Option<WidthReference>,

    /// How randomized attempts place the initial center.
    #[arg(long, value_enum)]
    pub center_seeding: Option<CenterSeeding>,

    /// Width guess for the first peak.
    #[arg(long)]
    pub anchor_width: Option<f64>,

    /// Points in the composite reconstruction grid.
    #[arg(long)]
    pub grid_points: Option<usize>,

    /// Refit all successful peaks jointly over the full trace.
    #[arg(long)]
    pub refine: bool,

    /// Wall-clock budget for the whole fit, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub budget_ms: Option<u64>,

    /// Fit peaks on the calling thread only.
    #[arg(long)]
    pub sequential: bool,

    /// JSON config file (`fit` and `detector` sections).
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,
}

/// Peak detector options.
#[derive(Debug, Args, Clone, Default)]
pub struct DetectorArgs {
    /// Half-width (in samples) of the local-maximum window.
    #[arg(long, value_name = "SAMPLES")]
    pub detect_radius: Option<usize>,

    /// Minimum peak height as a fraction of the trace maximum.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Collapse detections closer than this (position units).
    #[arg(long)]
    pub min_separation: Option<f64>,
}

/// Report, plot and export options.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Export per-peak results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the full model (config + peaks + composite grid) to JSON.
    #[arg(long = "export-model", value_name = "JSON")]
    pub export_model: Option<PathBuf>,

    /// Render an ASCII plot in the terminal.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Exit with code 4 when no peak could be fitted.
    #[arg(long)]
    pub require_fit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_flags() {
        let cli = Cli::try_parse_from([
            "deconv",
            "fit",
            "--input",
            "trace.csv",
            "--peaks",
            "12.5,30",
            "--window",
            "fixed:2.5",
            "--width-ref",
            "previous",
            "--refine",
            "--sequential",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.fitting.peaks, Some(vec![12.5, 30.0]));
        assert_eq!(args.fitting.window, Some(WindowMode::Fixed { radius: 2.5 }));
        assert_eq!(args.fitting.width_ref, Some(WidthReference::Previous));
        assert!(args.fitting.refine && args.fitting.sequential);
        assert!(!args.output.plot);
    }

    #[test]
    fn peaks_and_evenly_conflict() {
        let res = Cli::try_parse_from(["deconv", "fit", "-i", "t.csv", "--peaks", "1", "--evenly", "3"]);
        assert!(res.is_err());
    }

    #[test]
    fn bad_window_is_rejected() {
        let res = Cli::try_parse_from(["deconv", "fit", "-i", "t.csv", "--window", "wide"]);
        assert!(res.is_err());
    }
}
