//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the trace (CSV or synthetic)
//! - resolves configuration (file, then flags)
//! - runs the composite fit
//! - prints reports/plots
//! - writes optional exports

use std::path::Path;

use clap::Parser;
use tracing::warn;

use crate::cli::{Command, DemoArgs, DetectArgs, DetectorArgs, FitArgs, FittingArgs, OutputArgs, PlotArgs};
use crate::config::RunConfig;
use crate::domain::Trace;
use crate::error::AppError;

pub mod pipeline;

use pipeline::CandidateSource;

/// Entry point for the `deconv` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Detect(args) => handle_detect(args),
        Command::Demo(args) => handle_demo(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let ingest = crate::io::load_trace(&args.input)?;
    for err in &ingest.row_errors {
        warn!(line = err.line, "skipped row: {}", err.message);
    }
    if ingest.resorted {
        warn!("input rows were not sorted by position; sorted before fitting");
    }

    let config = resolve_config(&args.fitting, &args.detector)?;
    fit_and_report(&ingest.trace, Some(&args.input), &args.fitting, config, &args.output)
}

fn handle_detect(args: DetectArgs) -> Result<(), AppError> {
    let ingest = crate::io::load_trace(&args.input)?;
    let mut config = RunConfig::load(args.config.as_deref())?;
    config.apply_detector(&args.detector);

    let candidates = pipeline::detect_candidates(&ingest.trace, &config.detector)?;
    print!("{}", crate::report::format_candidates(&candidates));
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = resolve_config(&args.fitting, &args.detector)?;
    let spec = crate::data::demo_spec(config.fit.seed, args.noise);
    let data = crate::data::generate_trace(&spec)?;

    if let Some(path) = &args.write_trace {
        crate::io::write_trace_csv(path, &data.trace)?;
    }

    println!("Synthetic truth:");
    for (i, g) in data.truth.iter().enumerate() {
        println!(
            "  #{i} A={:.4} c={:.4} w={:.4} fwhm={:.4}",
            g.amplitude,
            g.center,
            g.width,
            g.fwhm()
        );
    }
    println!();

    fit_and_report(&data.trace, None, &args.fitting, config, &args.output)
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let file = crate::io::read_model_json(&args.model)?;
    let plot = crate::plot::render_ascii_plot(None, &file.model, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn resolve_config(fitting: &FittingArgs, detector: &DetectorArgs) -> Result<RunConfig, AppError> {
    let mut config = RunConfig::load(fitting.config.as_deref())?;
    config.apply_fitting(fitting);
    config.apply_detector(detector);
    config.fit.validate()?;
    Ok(config)
}

fn candidate_source(fitting: &FittingArgs, config: &RunConfig) -> CandidateSource {
    match (&fitting.peaks, fitting.evenly) {
        (Some(peaks), _) => CandidateSource::Explicit(peaks.clone()),
        (None, Some(n)) => CandidateSource::Evenly(n),
        (None, None) => CandidateSource::Detect(config.detector),
    }
}

fn fit_and_report(
    trace: &Trace,
    input: Option<&Path>,
    fitting: &FittingArgs,
    config: RunConfig,
    output: &OutputArgs,
) -> Result<(), AppError> {
    let source = candidate_source(fitting, &config);
    let run = pipeline::run_fit(trace, &source, &config.fit)?;

    let source_label = input.map(|p| p.display().to_string());
    println!(
        "{}",
        crate::report::format_summary(&run.model, &config.fit, source_label.as_deref())
    );

    if output.plot {
        let plot = crate::plot::render_ascii_plot(Some(trace), &run.model, output.width, output.height);
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &output.export {
        crate::io::write_peaks_csv(path, &run.model)?;
    }
    if let Some(path) = &output.export_model {
        let file = crate::io::model_file(input, &config.fit, &run.model);
        crate::io::write_model_json(path, &file)?;
    }

    if output.require_fit && run.model.fitted_count() == 0 {
        return Err(AppError::new(4, "No peak could be fitted (--require-fit)."));
    }
    Ok(())
}
