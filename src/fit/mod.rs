//! Peak fitting.
//!
//! - `window`: which samples a peak is fitted on
//! - `fitter`: one Gaussian per window, best of several restarts
//! - `propagation`: width guesses for peaks after the anchor
//! - `composite`: the multi-peak entry point
//! - `refine`: optional joint refit over the whole trace

pub mod composite;
pub mod fitter;
pub mod propagation;
pub mod refine;
pub mod window;

pub use composite::*;
pub use fitter::*;
pub use propagation::*;
pub use refine::*;
pub use window::*;
