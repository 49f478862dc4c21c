//! Fallback runner for any attached CSV or Parquet file.
//!
//! Understands two phrasings, `correlation between <a> and <b>` and
//! `scatter[plot] of <a> and <b>`, and always describes the table's columns
//! and shape.

use super::{number, scatter_with_fit, Runner};
use crate::analysis::{pearson, valid_pairs};
use crate::artifact::ArtifactEncoder;
use crate::budget::TimeBudget;
use crate::error::AnalysisError;
use crate::models::{Answer, FileSet, Question};
use crate::table::{Table, TableFormat, TableLoader};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Summary returned when nothing tabular is attached.
pub const NO_DATA_SUMMARY: &str =
    "No tabular data attached. Provide a CSV or Parquet for generic analysis.";

fn correlation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"correlation\s+between\s+([a-z0-9_]+)\s+and\s+([a-z0-9_]+)")
            .expect("valid correlation regex")
    })
}

fn scatter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"scatter(?:plot)?\s+of\s+([a-z0-9_]+)\s+and\s+([a-z0-9_]+)")
            .expect("valid scatter regex")
    })
}

/// Column pair named by `pattern` in the lower-cased question.
fn column_pair(pattern: &Regex, task: &str) -> Option<(String, String)> {
    let caps = pattern.captures(task)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Generic analysis over the first tabular attachment.
pub struct GenericTabularRunner {
    loader: Box<dyn TableLoader>,
    encoder: ArtifactEncoder,
}

impl GenericTabularRunner {
    pub fn new(loader: Box<dyn TableLoader>, encoder: ArtifactEncoder) -> Self {
        Self { loader, encoder }
    }

    /// Load the first attachment with a tabular extension.
    fn load_first_table(&self, files: &FileSet) -> Result<Option<Table>, AnalysisError> {
        for file in files.iter() {
            if let Some(format) = TableFormat::from_file_name(&file.name) {
                info!("Loading {} as {:?}", file.name, format);
                return self.loader.load(&file.bytes, format).map(Some);
            }
        }
        Ok(None)
    }

    fn numeric_pairs(table: &Table, a: &str, b: &str) -> Option<Vec<(f64, f64)>> {
        let x = table.column(a)?;
        let y = table.column(b)?;
        Some(valid_pairs(&x.numbers(), &y.numbers()))
    }
}

impl Runner for GenericTabularRunner {
    fn name(&self) -> &'static str {
        "generic-tabular"
    }

    fn can_handle(&self, _question: &Question) -> bool {
        true
    }

    fn run(
        &self,
        question: &Question,
        files: &FileSet,
        budget: &TimeBudget,
    ) -> Result<Answer, AnalysisError> {
        let Some(table) = self.load_first_table(files)? else {
            debug!("No tabular attachment among {} files", files.len());
            let mut out = Map::new();
            out.insert("summary".to_string(), Value::from(NO_DATA_SUMMARY));
            return Ok(Answer::Labeled(out));
        };

        let task = question.lowercase();
        let mut out = Map::new();

        if let Some((a, b)) = column_pair(correlation_pattern(), &task) {
            if !budget.remaining_ok() {
                warn!("Budget spent; skipping correlation of {} and {}", a, b);
            } else if let Some(pairs) = Self::numeric_pairs(&table, &a, &b) {
                let r = pearson(&pairs);
                debug!("correlation({}, {}) over {} pairs = {:?}", a, b, pairs.len(), r);
                out.insert(
                    "correlation".to_string(),
                    r.map(number).unwrap_or(Value::Null),
                );
            } else {
                debug!("Correlation columns {} / {} not in table", a, b);
            }
        }

        if let Some((a, b)) = column_pair(scatter_pattern(), &task) {
            if !budget.remaining_ok() {
                warn!("Budget spent; skipping scatter of {} and {}", a, b);
            } else if let Some(pairs) = Self::numeric_pairs(&table, &a, &b) {
                let (_, uri) = scatter_with_fit(&self.encoder, pairs, &a, &b, None);
                out.insert("plot".to_string(), uri.map(Value::from).unwrap_or(Value::Null));
            } else {
                debug!("Scatter columns {} / {} not in table", a, b);
            }
        }

        out.insert(
            "columns".to_string(),
            Value::from(table.column_names()),
        );
        out.insert(
            "shape".to_string(),
            Value::from(table.shape().to_vec()),
        );

        Ok(Answer::Labeled(out))
    }
}
