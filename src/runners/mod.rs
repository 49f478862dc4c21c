//! Question runners and routing.
//!
//! A [`Runner`] declares whether it can answer a question and, once chosen,
//! produces an [`Answer`]. The [`Dispatcher`] asks runners in declaration
//! order and falls back to the generic tabular runner, which accepts
//! everything.

pub mod generic;
pub mod partitioned;
pub mod wiki;

pub use generic::GenericTabularRunner;
pub use partitioned::PartitionedDatasetRunner;
pub use wiki::WikiTableRunner;

use crate::analysis::{linear_fit, LinearFit};
use crate::artifact::{ArtifactEncoder, ScatterPlot};
use crate::budget::TimeBudget;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::models::{Answer, FileSet, Question};
use crate::sources::{default_engine, HttpHtmlSource};
use crate::table::FileTableLoader;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// One analysis capability.
pub trait Runner: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Cheap, side-effect-free acceptance test.
    fn can_handle(&self, question: &Question) -> bool;

    /// Answer the question. Sub-question failures become null answers; an
    /// `Err` means no answer structure could be produced at all.
    fn run(
        &self,
        question: &Question,
        files: &FileSet,
        budget: &TimeBudget,
    ) -> Result<Answer, AnalysisError>;
}

/// First-match router over an ordered runner list with a mandatory fallback.
pub struct Dispatcher {
    runners: Vec<Box<dyn Runner>>,
    fallback: Box<dyn Runner>,
}

impl Dispatcher {
    /// `runners` are tried in order; `fallback` is chosen when none accepts.
    pub fn new(runners: Vec<Box<dyn Runner>>, fallback: Box<dyn Runner>) -> Self {
        Self { runners, fallback }
    }

    /// Wikipedia table, partitioned dataset, then generic tabular fallback.
    pub fn standard(config: &Config) -> Result<Self, AnalysisError> {
        let encoder = ArtifactEncoder::from(&config.artifact);
        let source = HttpHtmlSource::new(config.sources.http_timeout_seconds)?;

        let runners: Vec<Box<dyn Runner>> = vec![
            Box::new(WikiTableRunner::new(
                Box::new(source),
                config.sources.wiki_url.clone(),
                encoder,
            )),
            Box::new(PartitionedDatasetRunner::new(
                default_engine(),
                partitioned::DatasetLocation::from(&config.sources),
                encoder,
            )),
        ];

        Ok(Self::new(
            runners,
            Box::new(GenericTabularRunner::new(Box::new(FileTableLoader), encoder)),
        ))
    }

    /// Pick the first runner that accepts `question`. A predicate that
    /// panics counts as a refusal.
    pub fn select(&self, question: &Question) -> &dyn Runner {
        for runner in &self.runners {
            let accepted =
                catch_unwind(AssertUnwindSafe(|| runner.can_handle(question))).unwrap_or_else(
                    |_| {
                        warn!("Runner {} panicked in can_handle; skipping", runner.name());
                        false
                    },
                );
            if accepted {
                debug!("Runner {} accepted the question", runner.name());
                return runner.as_ref();
            }
        }
        debug!("No dataset runner matched; using {}", self.fallback.name());
        self.fallback.as_ref()
    }

    /// Runner names in evaluation order, fallback last.
    pub fn runner_names(&self) -> Vec<&'static str> {
        self.runners
            .iter()
            .map(|r| r.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }
}

/// JSON number, or null for non-finite values.
pub(crate) fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Scatter `points` with a dotted least-squares line and encode it.
/// Returns the fit alongside the data URI; a rendering failure yields a
/// `None` URI and is logged.
pub(crate) fn scatter_with_fit(
    encoder: &ArtifactEncoder,
    points: Vec<(f64, f64)>,
    x_label: &str,
    y_label: &str,
    title: Option<&str>,
) -> (Option<LinearFit>, Option<String>) {
    let fit = linear_fit(&points);
    let mut plot = ScatterPlot::new(points)
        .with_fit(fit)
        .with_labels(x_label, y_label);
    if let Some(title) = title {
        plot = plot.with_title(title);
    }

    match encoder.encode(plot) {
        Ok(uri) => (fit, Some(uri)),
        Err(e) => {
            warn!("Failed to render {} vs {}: {}", y_label, x_label, e);
            (fit, None)
        }
    }
}
