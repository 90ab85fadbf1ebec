//! Export per-peak results to CSV.
//!
//! One row per candidate, failures included, so the export lines up with the
//! candidate list the caller supplied.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{CandidateOrigin, CompositeModel, FitOutcome, Trace};
use crate::error::AppError;

const HEADER: &str = "index,candidate,origin,status,reason,amplitude,center,width,fwhm,area,r_squared,\
window_samples,width_guess,best_attempt,attempts_run,attempts_converged";

/// Write per-peak results to a CSV file.
pub fn write_peaks_csv(path: &Path, model: &CompositeModel) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_peaks(&mut out, model)?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

/// Write per-peak rows to any sink.
pub fn write_peaks<W: Write>(out: &mut W, model: &CompositeModel) -> Result<(), AppError> {
    let row_err = |e: std::io::Error| AppError::new(2, format!("Failed to write export CSV row: {e}"));

    writeln!(out, "{HEADER}").map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for peak in &model.peaks {
        let origin = match peak.candidate.origin {
            CandidateOrigin::Detected { .. } => "detected",
            CandidateOrigin::User => "user",
            CandidateOrigin::Evenly => "evenly",
        };
        let prefix = format!("{},{:.6},{}", peak.index, peak.candidate.position, origin);
        let suffix = format!("{},{:.6}", peak.window_samples, peak.width_guess);

        match &peak.outcome {
            FitOutcome::Fitted(fit) => {
                let g = fit.params;
                writeln!(
                    out,
                    "{prefix},fitted,,{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{suffix},{},{},{}",
                    g.amplitude,
                    g.center,
                    g.width,
                    g.fwhm(),
                    g.area(),
                    fit.r_squared,
                    fit.best_attempt,
                    fit.attempts_run,
                    fit.attempts_converged,
                )
                .map_err(row_err)?;
            }
            FitOutcome::Failed { failure } => {
                // Quote the reason: messages may contain commas.
                writeln!(out, "{prefix},failed,\"{failure}\",,,,,,,{suffix},,,").map_err(row_err)?;
            }
        }
    }

    Ok(())
}

/// Write a trace as `x,y` CSV (readable by `io::ingest::load_trace`).
pub fn write_trace_csv(path: &Path, trace: &Trace) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create trace CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let row_err = |e: std::io::Error| AppError::new(2, format!("Failed to write trace CSV: {e}"));

    writeln!(out, "x,y").map_err(row_err)?;
    for (x, y) in trace.positions().iter().zip(trace.intensities()) {
        writeln!(out, "{x},{y}").map_err(row_err)?;
    }
    out.flush().map_err(row_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurveGrid, FittedPeak, GaussianParams, PeakCandidate, PeakFailure, PeakFit};

    fn model() -> CompositeModel {
        let fitted = PeakFit {
            index: 0,
            candidate: PeakCandidate::user(10.0),
            window_samples: 21,
            width_guess: 1.0,
            outcome: FitOutcome::Fitted(FittedPeak {
                params: GaussianParams::new(5.0, 10.1, 2.0),
                r_squared: 0.99,
                window_positions: vec![],
                fitted_curve: vec![],
                best_attempt: 2,
                attempts_run: 10,
                attempts_converged: 9,
            }),
        };
        let failed = PeakFit {
            index: 1,
            candidate: PeakCandidate::user(99.0),
            window_samples: 1,
            width_guess: 2.2,
            outcome: FitOutcome::failed(PeakFailure::InsufficientData { samples: 1 }),
        };
        CompositeModel {
            peaks: vec![fitted, failed],
            composite: CurveGrid {
                position: vec![],
                intensity: vec![],
            },
            global_r_squared: None,
            refinement: None,
        }
    }

    #[test]
    fn one_row_per_candidate_with_matching_columns() {
        let mut buf = Vec::new();
        write_peaks(&mut buf, &model()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let width = reader.headers().unwrap().len();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == width));

        assert_eq!(&rows[0][3], "fitted");
        assert_eq!(&rows[0][6], "10.100000");
        assert_eq!(&rows[1][3], "failed");
        assert!(rows[1][4].starts_with("insufficient data"));
        assert_eq!(&rows[1][11], "1");
    }

    #[test]
    fn trace_csv_reads_back_exactly() {
        let trace = Trace::new(vec![0.1, 0.2, 0.35], vec![1.0 / 3.0, 2.5, -0.0625]).unwrap();
        let path = std::env::temp_dir().join(format!("deconv-trace-{}.csv", std::process::id()));
        write_trace_csv(&path, &trace).unwrap();
        let back = crate::io::ingest::load_trace(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back.trace, trace);
    }
}
