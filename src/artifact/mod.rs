//! Plot artifacts.
//!
//! Runners build a [`ScatterPlot`] and hand it to the [`ArtifactEncoder`],
//! which turns it into a size-bounded PNG data URI.

pub mod encoder;
pub mod plot;

pub use encoder::{fidelity_ladder, ArtifactEncoder, DATA_URI_PREFIX, DEFAULT_MAX_BYTES};
pub use plot::{Renderable, ScatterPlot};
