//! `ims-deconv` library crate.
//!
//! Multi-peak Gaussian deconvolution of 1-D drift traces. The binary (`deconv`)
//! is a thin wrapper around this library so that:
//!
//! - the fitting engine is testable without spawning processes
//! - the engine (`peaks`, `fit`) has no I/O and can be embedded elsewhere
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod peaks;
pub mod plot;
pub mod report;
