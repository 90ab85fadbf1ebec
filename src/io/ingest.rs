//! CSV ingest for drift traces.
//!
//! Input is a delimited file with at least two numeric columns:
//! - a header row is optional and auto-detected
//! - columns named `x` and `y` are used when present, else the first two
//! - rows with missing or non-numeric values are skipped and reported
//! - rows are sorted by position before the `Trace` is built

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Trace;
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: validated trace + row diagnostics.
#[derive(Debug, Clone)]
pub struct IngestedTrace {
    pub trace: Trace,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Whether the rows arrived out of position order.
    pub resorted: bool,
}

/// Load a trace from a CSV file on disk.
pub fn load_trace(path: &Path) -> Result<IngestedTrace, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_trace(file)
}

/// Load a trace from any CSV source.
pub fn read_trace<R: Read>(source: R) -> Result<IngestedTrace, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut columns = (0usize, 1usize);
    let mut pairs: Vec<(f64, f64)> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                rows_read += 1;
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        if idx == 0 && looks_like_header(&record) {
            columns = resolve_columns(&record);
            continue;
        }
        rows_read += 1;

        match parse_pair(&record, columns) {
            Ok(pair) => pairs.push(pair),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if pairs.is_empty() {
        return Err(AppError::new(3, "No valid (x, y) rows found in CSV."));
    }

    let resorted = !pairs.windows(2).all(|w| w[0].0 <= w[1].0);
    if resorted {
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    let trace = Trace::from_pairs(&pairs).map_err(|e| AppError::new(3, format!("Invalid trace: {e}")))?;

    Ok(IngestedTrace {
        trace,
        row_errors,
        rows_read,
        resorted,
    })
}

fn looks_like_header(record: &StringRecord) -> bool {
    record.iter().take(2).any(|field| parse_f64(field).is_none())
}

/// `(x, y)` column indices for a header row.
fn resolve_columns(headers: &StringRecord) -> (usize, usize) {
    let map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();
    match (map.get("x"), map.get("y")) {
        (Some(&x), Some(&y)) => (x, y),
        _ => (0, 1),
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_pair(record: &StringRecord, (xi, yi): (usize, usize)) -> Result<(f64, f64), String> {
    let get = |idx: usize, name: &str| -> Result<f64, String> {
        let raw = record
            .get(idx)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Missing `{name}` value."))?;
        parse_f64(raw).ok_or_else(|| format!("Invalid `{name}` value '{raw}'."))
    };
    Ok((get(xi, "x")?, get(yi, "y")?))
}

fn parse_f64(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
