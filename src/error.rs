//! Error types for the analysis core.
//!
//! A runner returns `AnalysisError` only when it cannot produce any answer
//! structure at all. Sub-question failures never reach this type; they are
//! recorded as null answers inside the runner.

use thiserror::Error;

/// Whole-runner failure.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Remote page or dataset could not be fetched.
    #[error("{0}")]
    Fetch(String),

    /// Fetched or uploaded content could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// An attached file could not be loaded as a table.
    #[error("{0}")]
    Load(String),

    /// The remote query engine rejected or failed a query.
    #[error("{0}")]
    Query(String),

    /// A plot could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// No table on the page matched the expected headers.
    #[error("{0}")]
    TableNotFound(String),
}

impl AnalysisError {
    /// Short name used as the `<kind>` prefix of the error answer.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Fetch(_) => "FetchError",
            AnalysisError::Parse(_) => "ParseError",
            AnalysisError::Load(_) => "LoadError",
            AnalysisError::Query(_) => "QueryError",
            AnalysisError::Render(_) => "RenderError",
            AnalysisError::TableNotFound(_) => "TableNotFound",
        }
    }
}

/// Failure while drawing or PNG-encoding a plot.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing failed: {0}")]
    Draw(String),

    #[error("png encoding failed: {0}")]
    Encode(String),

    #[error("invalid plot dimensions {0}x{1}")]
    Dimensions(u32, u32),
}
