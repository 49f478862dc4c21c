//! Analysis modules.
//!
//! Numeric helpers shared by the runners: pair cleaning, Pearson
//! correlation and least-squares fitting.

pub mod stats;

pub use stats::*;
