//! Mathematical utilities: nonlinear least squares, linear solves, statistics.

pub mod lm;
pub mod solve;
pub mod stats;

pub use lm::*;
pub use solve::*;
pub use stats::*;
