//! Read/write model JSON files.
//!
//! A model file is the portable representation of one composite fit:
//! - the configuration it was produced with
//! - every per-peak report (failures included)
//! - the composite grid, so plots need no refitting
//!
//! The schema is defined by `domain::ModelFile`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::Utc;

use crate::domain::{CompositeModel, DeconvConfig, ModelFile};
use crate::error::AppError;

/// Wrap a fit with run metadata.
pub fn model_file(input: Option<&Path>, config: &DeconvConfig, model: &CompositeModel) -> ModelFile {
    ModelFile {
        tool: "deconv".to_string(),
        created_at: Utc::now(),
        input: input.map(|p| p.display().to_string()),
        config: config.clone(),
        model: model.clone(),
    }
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, file: &ModelFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(out), file)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let input = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(input)).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PeakCandidate, Trace};
    use crate::fit::fit_composite;

    #[test]
    fn model_file_survives_disk() {
        let x: Vec<f64> = (0..=60).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|&p| 5.0 * (-0.5 * ((p - 30.0) / 4.0).powi(2)).exp()).collect();
        let trace = Trace::new(x, y).unwrap();
        let config = DeconvConfig {
            grid_points: 50,
            ..DeconvConfig::default()
        };
        let model = fit_composite(&trace, &[PeakCandidate::user(30.0), PeakCandidate::user(500.0)], &config).unwrap();
        let file = model_file(None, &config, &model);

        let path = std::env::temp_dir().join(format!("deconv-model-{}.json", std::process::id()));
        write_model_json(&path, &file).unwrap();
        let back = read_model_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back.tool, "deconv");
        assert_eq!(back.config, config);
        assert_eq!(back.model.peaks.len(), 2);
        assert_eq!(back.model.fitted_count(), 1);
        assert_eq!(back.model.peaks[1].outcome, model.peaks[1].outcome);
        assert_eq!(back.model.composite.position.len(), 50);
    }

    #[test]
    fn missing_file_is_exit_code_2() {
        let err = read_model_json(Path::new("/nonexistent/deconv/model.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
