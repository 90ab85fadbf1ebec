//! Peak model implementations.
//!
//! Models are implemented as small, pure functions so that fitting/search code can
//! stay generic.

pub mod gaussian;

pub use gaussian::*;
