//! Input data sources other than files.

pub mod synthetic;

pub use synthetic::*;
