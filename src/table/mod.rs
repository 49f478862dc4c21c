//! In-memory tables.
//!
//! Every data source (uploaded CSV/Parquet, Wikipedia HTML, remote query
//! results) is normalized into a column-oriented [`Table`] of [`Datum`]
//! values before any runner looks at it.

pub mod html;
pub mod loader;

pub use loader::{FileTableLoader, TableFormat, TableLoader};

use chrono::NaiveDate;
use std::fmt;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Datum {
    /// Infer a datum from a raw text field: empty is null, then integer,
    /// then float, otherwise text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Datum::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Datum::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Datum::Float(f);
        }
        Datum::Text(raw.to_string())
    }

    /// Numeric coercion: numbers and numeric text map to `f64`, everything
    /// else (including NaN) is missing.
    pub fn to_number(&self) -> Option<f64> {
        let value = match self {
            Datum::Int(i) => *i as f64,
            Datum::Float(f) => *f,
            Datum::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Datum::Text(s) => s.trim().parse::<f64>().ok()?,
            Datum::Null | Datum::Date(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Text view; dates and numbers are formatted.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Datum::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, ""),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Int(i) => write!(f, "{}", i),
            Datum::Float(v) => write!(f, "{}", v),
            Datum::Text(s) => write!(f, "{}", s),
            Datum::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Datum>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Datum>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Coerced numeric view of the column.
    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.values.iter().map(Datum::to_number).collect()
    }
}

/// Column-oriented table. All columns have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Build a table from row-major data. Short rows are padded with nulls,
    /// extra cells are dropped.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Datum>>) -> Self {
        let row_count = rows.len();
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(row_count)))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(Datum::Null));
            }
        }

        Self {
            columns,
            rows: row_count,
        }
    }

    /// Build a table from columns, which must share one length.
    pub fn from_columns(columns: Vec<Column>) -> Option<Self> {
        let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if columns.iter().any(|c| c.values.len() != rows) {
            return None;
        }
        Some(Self { columns, rows })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Exact name match first, then case-insensitive.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    /// First column whose lower-cased name contains `needle`.
    pub fn column_containing(&self, needle: &str) -> Option<&Column> {
        let needle = needle.to_lowercase();
        self.columns
            .iter()
            .find(|c| c.name.to_lowercase().contains(&needle))
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `[rows, columns]`.
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.columns.len()]
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Cell at `(row, column name)`.
    pub fn value(&self, row: usize, column: &str) -> Option<&Datum> {
        self.column(column).and_then(|c| c.values.get(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datum_infer() {
        assert_eq!(Datum::infer(""), Datum::Null);
        assert_eq!(Datum::infer(" 42 "), Datum::Int(42));
        assert_eq!(Datum::infer("2.5"), Datum::Float(2.5));
        assert_eq!(Datum::infer("abc"), Datum::Text("abc".to_string()));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Datum::Text(" 7.5".into()).to_number(), Some(7.5));
        assert_eq!(Datum::Text("n/a".into()).to_number(), None);
        assert_eq!(Datum::Float(f64::NAN).to_number(), None);
        assert_eq!(Datum::Null.to_number(), None);
        assert_eq!(Datum::Int(3).to_number(), Some(3.0));
    }

    #[test]
    fn test_table_from_rows_pads_short_rows() {
        let table = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![Datum::Int(1)], vec![Datum::Int(2), Datum::Int(3), Datum::Int(9)]],
        );
        assert_eq!(table.shape(), [2, 2]);
        assert_eq!(table.value(0, "b"), Some(&Datum::Null));
        assert_eq!(table.value(1, "b"), Some(&Datum::Int(3)));
    }

    #[test]
    fn test_column_lookup() {
        let table = Table::from_rows(
            vec!["Rank".into(), "Worldwide gross".into()],
            vec![vec![Datum::Int(1), Datum::Text("$1".into())]],
        );
        assert!(table.column("rank").is_some());
        assert_eq!(
            table.column_containing("gross").map(|c| c.name.as_str()),
            Some("Worldwide gross")
        );
        assert!(table.column("peak").is_none());
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let ragged = vec![
            Column::new("a", vec![Datum::Int(1)]),
            Column::new("b", vec![]),
        ];
        assert!(Table::from_columns(ragged).is_none());
    }
}
