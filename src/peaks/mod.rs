//! Peak candidate detection.

pub mod detector;

pub use detector::*;
