//! Indian high court judgements runner.
//!
//! Queries the partitioned Parquet metadata through a [`QueryEngine`] and
//! answers three labeled questions. Each query is independent: a failure
//! leaves its answers null and the rest still run.

use super::{number, scatter_with_fit, Runner};
use crate::analysis::round_to;
use crate::artifact::ArtifactEncoder;
use crate::budget::TimeBudget;
use crate::config::SourcesConfig;
use crate::error::AnalysisError;
use crate::models::{Answer, FileSet, Question};
use crate::sources::QueryEngine;
use crate::table::{Datum, Table};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const TOP_COURT_QUESTION: &str = "Which high court disposed the most cases from 2019 - 2022?";
pub const DELAY_SLOPE_QUESTION: &str =
    "What's the regression slope of the date_of_registration - decision_date by year in the court=33_10?";
pub const DELAY_PLOT_QUESTION: &str = "Plot the year and # of days of delay from the above question as a scatterplot with a regression line. Encode as a base64 data URI under 100,000 characters";

const DAY_FIRST_FORMATS: [&str; 3] = ["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y"];
const ISO_FORMAT: &str = "%Y-%m-%d";

/// Where the partitioned metadata lives.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetLocation {
    pub root: String,
    pub region: String,
    pub delay_court: String,
}

impl From<&SourcesConfig> for DatasetLocation {
    fn from(sources: &SourcesConfig) -> Self {
        Self {
            root: sources.dataset_root.clone(),
            region: sources.dataset_region.clone(),
            delay_court: sources.delay_court.clone(),
        }
    }
}

impl DatasetLocation {
    /// `read_parquet` glob restricted to one court partition (`*` for all).
    pub fn glob(&self, court: &str) -> String {
        format!(
            "{}/year=*/court={}/bench=*/metadata.parquet?s3_region={}",
            self.root.trim_end_matches('/'),
            court,
            self.region
        )
    }

    fn top_court_sql(&self) -> String {
        format!(
            "SELECT court, COUNT(*) AS n \
             FROM read_parquet('{}') \
             WHERE year BETWEEN 2019 AND 2022 \
             GROUP BY court \
             ORDER BY n DESC \
             LIMIT 1",
            self.glob("*")
        )
    }

    fn delay_sql(&self) -> String {
        format!(
            "SELECT date_of_registration, decision_date, year \
             FROM read_parquet('{}')",
            self.glob(&self.delay_court)
        )
    }
}

/// Parse a date cell. Timestamps are cut to their date part; `day_first`
/// tries `dd-mm-yyyy` style layouts before ISO.
fn parse_date(datum: &Datum, day_first: bool) -> Option<NaiveDate> {
    let text = match datum {
        Datum::Date(d) => return Some(*d),
        Datum::Text(s) => s.trim(),
        _ => return None,
    };
    let date_part = text.split(['T', ' ']).next().unwrap_or(text);

    let iso = NaiveDate::parse_from_str(date_part, ISO_FORMAT).ok();
    let day_first_match = || {
        DAY_FIRST_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(date_part, f).ok())
    };

    if day_first {
        day_first_match().or(iso)
    } else {
        iso.or_else(day_first_match)
    }
}

fn parse_year(datum: &Datum) -> Option<f64> {
    datum.to_number().filter(|y| y.fract() == 0.0)
}

/// `(year, delay_days)` for every row whose dates and year all parse.
fn delay_by_year(table: &Table) -> Result<Vec<(f64, f64)>, AnalysisError> {
    let column = |name: &str| {
        table
            .column(name)
            .ok_or_else(|| AnalysisError::Parse(format!("missing column '{}'", name)))
    };
    let registered = column("date_of_registration")?;
    let decided = column("decision_date")?;
    let year = column("year")?;

    let points: Vec<(f64, f64)> = registered
        .values
        .iter()
        .zip(&decided.values)
        .zip(&year.values)
        .filter_map(|((reg, dec), y)| {
            let reg = parse_date(reg, true)?;
            let dec = parse_date(dec, false)?;
            let y = parse_year(y)?;
            Some((y, (dec - reg).num_days() as f64))
        })
        .collect();

    debug!(
        "{} of {} rows have usable dates",
        points.len(),
        table.row_count()
    );
    Ok(points)
}

/// Runner for the partitioned Indian high court metadata.
pub struct PartitionedDatasetRunner {
    engine: Box<dyn QueryEngine>,
    location: DatasetLocation,
    encoder: ArtifactEncoder,
}

impl PartitionedDatasetRunner {
    pub fn new(
        engine: Box<dyn QueryEngine>,
        location: DatasetLocation,
        encoder: ArtifactEncoder,
    ) -> Self {
        Self {
            engine,
            location,
            encoder,
        }
    }

    fn top_court(&self) -> Result<Option<String>, AnalysisError> {
        let table = self.engine.query(&self.location.top_court_sql())?;
        Ok(table.value(0, "court").and_then(Datum::as_text))
    }

    fn answer_delay(&self, answer: &mut Answer, budget: &TimeBudget) -> Result<(), AnalysisError> {
        let table = self.engine.query(&self.location.delay_sql())?;
        let points = delay_by_year(&table)?;

        if points.is_empty() {
            warn!("No rows with usable dates for court={}", self.location.delay_court);
            return Ok(());
        }
        if !budget.remaining_ok() {
            warn!("Budget spent; skipping delay regression");
            return Ok(());
        }

        let title = format!("Delay vs Year (court={})", self.location.delay_court);
        let (fit, uri) = scatter_with_fit(
            &self.encoder,
            points,
            "Year",
            "Delay (days)",
            Some(&title),
        );

        if let Some(fit) = fit {
            answer.set(DELAY_SLOPE_QUESTION, number(round_to(fit.slope, 6)));
        }
        if let Some(uri) = uri {
            answer.set(DELAY_PLOT_QUESTION, Value::from(uri));
        }
        Ok(())
    }
}

impl Runner for PartitionedDatasetRunner {
    fn name(&self) -> &'static str {
        "partitioned-dataset"
    }

    fn can_handle(&self, question: &Question) -> bool {
        let task = question.lowercase();
        task.contains("indian high court judgement dataset") || task.contains("ecourts")
    }

    fn run(
        &self,
        _question: &Question,
        _files: &FileSet,
        budget: &TimeBudget,
    ) -> Result<Answer, AnalysisError> {
        let mut answer = Answer::labeled_nulls(&[
            TOP_COURT_QUESTION,
            DELAY_SLOPE_QUESTION,
            DELAY_PLOT_QUESTION,
        ]);

        if !budget.remaining_ok() {
            warn!("Budget spent before querying the judgement dataset");
            return Ok(answer);
        }
        info!("Querying top court from {}", self.location.glob("*"));
        match self.top_court() {
            Ok(Some(court)) => answer.set(TOP_COURT_QUESTION, Value::from(court)),
            Ok(None) => debug!("Top court query returned no rows"),
            Err(e) => warn!("Top court query failed: {}", e),
        }

        if !budget.remaining_ok() {
            warn!("Budget spent before the delay query");
            return Ok(answer);
        }
        info!("Querying delays for court={}", self.location.delay_court);
        if let Err(e) = self.answer_delay(&mut answer, budget) {
            warn!("Delay regression failed: {}", e);
        }

        Ok(answer)
    }
}
