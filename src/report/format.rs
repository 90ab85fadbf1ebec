//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{CandidateOrigin, CompositeModel, DeconvConfig, FitOutcome, PeakCandidate};

/// Format the full run summary: settings, per-peak table, warnings, global fit.
pub fn format_summary(model: &CompositeModel, config: &DeconvConfig, source: Option<&str>) -> String {
    let mut out = String::new();

    out.push_str("=== deconv - multi-peak Gaussian fit ===\n");
    if let Some(source) = source {
        out.push_str(&format!("Input: {source}\n"));
    }
    out.push_str(&format!(
        "Window: {} | attempts/peak: {} | width ref: {:?} | seed: {}\n",
        config.window, config.attempts_per_peak, config.width_reference, config.seed
    ));
    out.push_str(&format!(
        "Peaks: {} candidate(s), {} fitted, {} skipped\n\n",
        model.peaks.len(),
        model.fitted_count(),
        model.failed_count()
    ));

    out.push_str(&format_peak_table(model));

    let warnings: Vec<String> = model
        .peaks
        .iter()
        .filter_map(|p| match &p.outcome {
            FitOutcome::Failed { failure } => Some(format!(
                "warning: peak #{} at {:.4} skipped: {failure}",
                p.index, p.candidate.position
            )),
            FitOutcome::Fitted(_) => None,
        })
        .collect();
    if !warnings.is_empty() {
        out.push('\n');
        for w in warnings {
            out.push_str(&w);
            out.push('\n');
        }
    }

    out.push('\n');
    match model.global_r_squared {
        Some(r2) => out.push_str(&format!("Global R² (full trace): {r2:.5}\n")),
        None => out.push_str("Global R² (full trace): n/a (no peak fitted)\n"),
    }
    if let Some(refined) = &model.refinement {
        out.push_str(&format!(
            "Joint refinement: R²={:.5} over {} peak(s)\n",
            refined.r_squared,
            refined.peaks.len()
        ));
        for (index, g) in &refined.peaks {
            out.push_str(&format!(
                "  #{index:<3} A={:.4} c={:.4} w={:.4} fwhm={:.4}\n",
                g.amplitude,
                g.center,
                g.width,
                g.fwhm()
            ));
        }
    }

    out
}

fn format_peak_table(model: &CompositeModel) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>4} {:>10} {:>10} {:>10} {:>10} {:>10} {:>12} {:>8} {:>6} {:<8}\n",
            "#", "seed", "amplitude", "center", "width", "fwhm", "area", "r2", "n", "status"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<4} {:-<10} {:-<10} {:-<10} {:-<10} {:-<10} {:-<12} {:-<8} {:-<6} {:-<8}\n",
            "", "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for p in &model.peaks {
        let line = match &p.outcome {
            FitOutcome::Fitted(fit) => {
                let g = fit.params;
                format!(
                    "{:>4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>12.4} {:>8.5} {:>6} {:<8}",
                    p.index,
                    p.candidate.position,
                    g.amplitude,
                    g.center,
                    g.width,
                    g.fwhm(),
                    g.area(),
                    fit.r_squared,
                    p.window_samples,
                    "ok"
                )
            }
            FitOutcome::Failed { .. } => format!(
                "{:>4} {:>10.4} {:>10} {:>10} {:>10} {:>10} {:>12} {:>8} {:>6} {:<8}",
                p.index, p.candidate.position, "-", "-", "-", "-", "-", "-", p.window_samples, "skipped"
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Format a candidate list (the `detect` command).
pub fn format_candidates(candidates: &[PeakCandidate]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} candidate(s)\n", candidates.len()));
    for (i, c) in candidates.iter().enumerate() {
        let detail = match c.origin {
            CandidateOrigin::Detected { index, intensity } => format!("sample {index}, intensity {intensity:.4}"),
            CandidateOrigin::User => "user".to_string(),
            CandidateOrigin::Evenly => "evenly spaced".to_string(),
        };
        out.push_str(&format!("{i:>4}  {:>12.4}  ({detail})\n", c.position));
    }
    out
}
