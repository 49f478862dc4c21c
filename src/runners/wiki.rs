//! Highest-grossing films runner.
//!
//! Scrapes the Wikipedia list of highest-grossing films and answers four
//! fixed questions positionally: the count of $2bn films released before
//! 2000, the earliest film over $1.5bn, the Rank/Peak correlation and a
//! Rank vs Peak scatter plot.

use super::{number, scatter_with_fit, Runner};
use crate::analysis::{pearson, round_to, valid_pairs};
use crate::artifact::ArtifactEncoder;
use crate::budget::TimeBudget;
use crate::error::AnalysisError;
use crate::models::{Answer, FileSet, Question};
use crate::sources::HtmlSource;
use crate::table::html::parse_tables;
use crate::table::{Datum, Table};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const TWO_BILLION: f64 = 2_000_000_000.0;
const ONE_POINT_FIVE_BILLION: f64 = 1_500_000_000.0;
const ANSWER_COUNT: usize = 4;

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{4}").expect("valid year regex"))
}

/// Dollar amount in a cell such as `$2,923,706,026`.
fn parse_money(datum: &Datum) -> Option<f64> {
    match datum {
        Datum::Text(s) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse::<f64>().ok()
        }
        other => other.to_number(),
    }
}

/// First four-digit run in a cell.
fn parse_year(datum: &Datum) -> Option<f64> {
    match datum {
        Datum::Int(y) => Some(*y as f64),
        other => {
            let text = other.as_text()?;
            year_pattern().find(&text)?.as_str().parse::<f64>().ok()
        }
    }
}

/// First column whose header contains any of `keywords`, parsed with
/// `parse`; all missing when no header matches.
fn numeric_column(
    table: &Table,
    keywords: &[&str],
    parse: fn(&Datum) -> Option<f64>,
) -> Vec<Option<f64>> {
    match keywords.iter().find_map(|k| table.column_containing(k)) {
        Some(c) => c.values.iter().map(parse).collect(),
        None => vec![None; table.row_count()],
    }
}

/// The films table reduced to the columns the questions need.
#[derive(Debug, Default)]
struct Films {
    rank: Vec<Option<f64>>,
    peak: Vec<Option<f64>>,
    title: Vec<Option<String>>,
    year: Vec<Option<f64>>,
    gross: Vec<Option<f64>>,
}

impl Films {
    /// Map headers by keyword: the first header containing each keyword
    /// becomes that canonical column.
    fn from_table(table: &Table) -> Self {
        Self {
            rank: numeric_column(table, &["rank"], Datum::to_number),
            peak: numeric_column(table, &["peak"], Datum::to_number),
            year: numeric_column(table, &["year", "release"], parse_year),
            gross: numeric_column(table, &["worldwide", "gross"], parse_money),
            title: match table.column_containing("title") {
                Some(c) => c.values.iter().map(Datum::as_text).collect(),
                None => vec![None; table.row_count()],
            },
        }
    }

    fn billion_films_before_2000(&self) -> usize {
        self.gross
            .iter()
            .zip(&self.year)
            .filter(|(g, y)| matches!((g, y), (Some(g), Some(y)) if *g >= TWO_BILLION && *y < 2000.0))
            .count()
    }

    /// Earliest release over $1.5bn; ties go to the larger gross, unknown
    /// years sort last.
    fn earliest_over_one_point_five(&self) -> Option<String> {
        let mut over: Vec<usize> = (0..self.gross.len())
            .filter(|&i| matches!(self.gross[i], Some(g) if g > ONE_POINT_FIVE_BILLION))
            .collect();

        over.sort_by(|&a, &b| {
            let by_year = match (self.year[a], self.year[b]) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_year.then_with(|| {
                self.gross[b]
                    .partial_cmp(&self.gross[a])
                    .unwrap_or(Ordering::Equal)
            })
        });

        over.first().and_then(|&i| self.title[i].clone())
    }

    fn rank_peak_pairs(&self) -> Vec<(f64, f64)> {
        valid_pairs(&self.rank, &self.peak)
    }
}

/// Runner for the Wikipedia highest-grossing films list.
pub struct WikiTableRunner {
    source: Box<dyn HtmlSource>,
    url: String,
    encoder: ArtifactEncoder,
}

impl WikiTableRunner {
    pub fn new(source: Box<dyn HtmlSource>, url: String, encoder: ArtifactEncoder) -> Self {
        Self {
            source,
            url,
            encoder,
        }
    }

    /// First table whose headers mention both rank and peak.
    fn find_films_table(tables: Vec<Table>) -> Option<Table> {
        tables.into_iter().find(|t| {
            t.column_containing("rank").is_some() && t.column_containing("peak").is_some()
        })
    }
}

impl Runner for WikiTableRunner {
    fn name(&self) -> &'static str {
        "wiki-table"
    }

    fn can_handle(&self, question: &Question) -> bool {
        let task = question.lowercase();
        task.contains("highest grossing") && task.contains("wikipedia")
    }

    fn run(
        &self,
        _question: &Question,
        _files: &FileSet,
        budget: &TimeBudget,
    ) -> Result<Answer, AnalysisError> {
        let mut answers = vec![Value::Null; ANSWER_COUNT];

        if !budget.remaining_ok() {
            warn!("Budget spent before fetching {}", self.url);
            return Ok(Answer::Positional(answers));
        }

        info!("Fetching films table from {}", self.url);
        let html = self.source.fetch(&self.url)?;
        let tables = parse_tables(&html)?;
        debug!("Page has {} tables", tables.len());

        let table = Self::find_films_table(tables).ok_or_else(|| {
            AnalysisError::TableNotFound("Could not find the main table on Wikipedia page.".into())
        })?;
        let films = Films::from_table(&table);

        if budget.remaining_ok() {
            answers[0] = Value::from(films.billion_films_before_2000());
        }

        if budget.remaining_ok() {
            answers[1] = films
                .earliest_over_one_point_five()
                .map(Value::from)
                .unwrap_or(Value::Null);
        }

        let pairs = films.rank_peak_pairs();

        if budget.remaining_ok() {
            answers[2] = pearson(&pairs)
                .map(|r| number(round_to(r, 6)))
                .unwrap_or(Value::Null);
        }

        if budget.remaining_ok() {
            let (_, uri) =
                scatter_with_fit(&self.encoder, pairs, "Rank", "Peak", Some("Rank vs Peak"));
            answers[3] = uri.map(Value::from).unwrap_or(Value::Null);
        } else {
            warn!("Budget spent; skipping Rank vs Peak plot");
        }

        Ok(Answer::Positional(answers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::DATA_URI_PREFIX;
    use serde_json::json;
    use std::time::Duration;

    const PAGE: &str = r#"<html><body>
<table class="wikitable"><tr><th>Other</th></tr><tr><td>x</td></tr></table>
<table class="wikitable sortable">
<tr><th>Rank</th><th>Peak</th><th>Title</th><th>Worldwide gross</th><th>Year</th><th>Ref</th></tr>
<tr><td>1</td><td>1</td><th>Avatar</th><td>$2,923,706,026</td><td>2009</td><td>[1]</td></tr>
<tr><td>2</td><td>1</td><th>Avengers: Endgame</th><td>$2,797,501,328</td><td>2019</td><td>[2]</td></tr>
<tr><td>3</td><td>1</td><th>Titanic</th><td>$2,257,844,554</td><td>1997</td><td>[3]</td></tr>
<tr><td>4</td><td>3</td><th>Star Wars: The Force Awakens</th><td>$2,068,223,624</td><td>2015</td><td>[4]</td></tr>
<tr><td>5</td><td>4</td><th>Jurassic World</th><td>$1,671,537,444</td><td>2015</td><td>[5]</td></tr>
<tr><td>6</td><td>5</td><th>The Avengers</th><td>$1,518,815,515</td><td>2012</td><td>[6]</td></tr>
</table></body></html>"#;

    struct StaticPage(&'static str);

    impl HtmlSource for StaticPage {
        fn fetch(&self, _url: &str) -> Result<String, AnalysisError> {
            Ok(self.0.to_string())
        }
    }

    struct Offline;

    impl HtmlSource for Offline {
        fn fetch(&self, url: &str) -> Result<String, AnalysisError> {
            Err(AnalysisError::Fetch(format!("Cannot connect to {}", url)))
        }
    }

    fn runner(source: Box<dyn HtmlSource>) -> WikiTableRunner {
        WikiTableRunner::new(source, "https://example.org/films".into(), ArtifactEncoder::default())
    }

    #[test]
    fn test_can_handle() {
        let r = runner(Box::new(Offline));
        assert!(r.can_handle(&Question::new(
            "Scrape the list of highest grossing films from Wikipedia."
        )));
        assert!(!r.can_handle(&Question::new("highest grossing films")));
        assert!(!r.can_handle(&Question::new("")));
    }

    #[test]
    fn test_answers_all_four_questions() {
        let answer = runner(Box::new(StaticPage(PAGE)))
            .run(&Question::new("q"), &FileSet::new(), &TimeBudget::default())
            .unwrap();
        let Answer::Positional(values) = answer else {
            panic!("expected positional answer");
        };

        assert_eq!(values[0], json!(1));
        assert_eq!(values[1], json!("Titanic"));
        let corr = values[2].as_f64().unwrap();
        assert!(corr > 0.9 && corr <= 1.0);
        assert!(values[3].as_str().unwrap().starts_with(DATA_URI_PREFIX));
    }

    #[test]
    fn test_missing_table_is_runner_failure() {
        let err = runner(Box::new(StaticPage("<table><tr><th>a</th></tr></table>")))
            .run(&Question::new("q"), &FileSet::new(), &TimeBudget::default())
            .unwrap_err();
        assert_eq!(err.kind(), "TableNotFound");
    }

    #[test]
    fn test_fetch_failure_propagates() {
        let err = runner(Box::new(Offline))
            .run(&Question::new("q"), &FileSet::new(), &TimeBudget::default())
            .unwrap_err();
        assert_eq!(err.kind(), "FetchError");
    }

    #[test]
    fn test_spent_budget_returns_nulls_without_fetching() {
        let answer = runner(Box::new(Offline))
            .run(
                &Question::new("q"),
                &FileSet::new(),
                &TimeBudget::new(Duration::ZERO),
            )
            .unwrap();
        assert_eq!(answer.to_json(), json!([null, null, null, null]));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(
            parse_money(&Datum::Text("$2,923,706,026".into())),
            Some(2_923_706_026.0)
        );
        assert_eq!(parse_money(&Datum::Text("n/a".into())), None);
        assert_eq!(parse_year(&Datum::Text("1997 (re-release)".into())), Some(1997.0));
        assert_eq!(parse_year(&Datum::Int(2009)), Some(2009.0));
        assert_eq!(parse_year(&Datum::Null), None);
    }
}
