//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the input trace and peak candidates (`Trace`, `PeakCandidate`)
//! - fit outputs (`GaussianParams`, `FitOutcome`, `PeakFit`, `CompositeModel`)
//! - run configuration (`DeconvConfig`, `DetectorConfig`, `WindowMode`)

pub mod types;

pub use types::*;
