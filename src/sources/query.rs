//! SQL query engine over remote partitioned Parquet.
//!
//! With the `duckdb` feature the engine is an in-memory DuckDB with the
//! `httpfs` and `parquet` extensions loaded, which can `read_parquet` an
//! object-store glob directly. Without it, every query reports the engine as
//! unavailable and the dependent answers stay null.

use crate::error::AnalysisError;
use crate::table::Table;

/// Runs a SQL query and returns the result as a table.
pub trait QueryEngine: Send + Sync {
    fn query(&self, sql: &str) -> Result<Table, AnalysisError>;
}

/// Engine used when no query backend is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEngine;

impl QueryEngine for UnavailableEngine {
    fn query(&self, _sql: &str) -> Result<Table, AnalysisError> {
        Err(AnalysisError::Query(
            "no query engine available (build with --features duckdb)".to_string(),
        ))
    }
}

/// The best engine this build supports.
#[cfg(feature = "duckdb")]
pub fn default_engine() -> Box<dyn QueryEngine> {
    Box::new(duck::DuckDbEngine)
}

/// The best engine this build supports.
#[cfg(not(feature = "duckdb"))]
pub fn default_engine() -> Box<dyn QueryEngine> {
    tracing::debug!("Built without duckdb; remote dataset queries are disabled");
    Box::new(UnavailableEngine)
}

#[cfg(feature = "duckdb")]
pub mod duck {
    use super::QueryEngine;
    use crate::error::AnalysisError;
    use crate::table::loader::{days_since_epoch, micros_to_date};
    use crate::table::{Datum, Table};
    use duckdb::types::{TimeUnit, Value};
    use duckdb::Connection;
    use tracing::debug;

    const SETUP: &str = "INSTALL httpfs; LOAD httpfs; INSTALL parquet; LOAD parquet;";

    /// DuckDB engine; opens a fresh in-memory connection per query.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DuckDbEngine;

    fn query_err(e: duckdb::Error) -> AnalysisError {
        AnalysisError::Query(e.to_string())
    }

    impl QueryEngine for DuckDbEngine {
        fn query(&self, sql: &str) -> Result<Table, AnalysisError> {
            let conn = Connection::open_in_memory().map_err(query_err)?;
            conn.execute_batch(SETUP).map_err(query_err)?;

            debug!("Running query: {}", sql.trim());
            let mut stmt = conn.prepare(sql).map_err(query_err)?;
            let mut data = Vec::new();
            {
                let mut rows = stmt.query([]).map_err(query_err)?;
                while let Some(row) = rows.next().map_err(query_err)? {
                    let width = row.as_ref().column_count();
                    let mut cells = Vec::with_capacity(width);
                    for i in 0..width {
                        let value: Value = row.get(i).map_err(query_err)?;
                        cells.push(value_to_datum(value));
                    }
                    data.push(cells);
                }
            }
            let names = stmt.column_names();

            Ok(Table::from_rows(names, data))
        }
    }

    fn value_to_datum(value: Value) -> Datum {
        match value {
            Value::Null => Datum::Null,
            Value::Boolean(b) => Datum::Bool(b),
            Value::TinyInt(v) => Datum::Int(i64::from(v)),
            Value::SmallInt(v) => Datum::Int(i64::from(v)),
            Value::Int(v) => Datum::Int(i64::from(v)),
            Value::BigInt(v) => Datum::Int(v),
            Value::HugeInt(v) => i64::try_from(v)
                .map(Datum::Int)
                .unwrap_or(Datum::Float(v as f64)),
            Value::UTinyInt(v) => Datum::Int(i64::from(v)),
            Value::USmallInt(v) => Datum::Int(i64::from(v)),
            Value::UInt(v) => Datum::Int(i64::from(v)),
            Value::UBigInt(v) => i64::try_from(v)
                .map(Datum::Int)
                .unwrap_or(Datum::Float(v as f64)),
            Value::Float(v) => Datum::Float(f64::from(v)),
            Value::Double(v) => Datum::Float(v),
            Value::Text(s) => Datum::Text(s),
            Value::Date32(days) => days_since_epoch(days)
                .map(Datum::Date)
                .unwrap_or(Datum::Null),
            Value::Timestamp(unit, v) => micros_to_date(timestamp_micros(unit, v))
                .map(Datum::Date)
                .unwrap_or(Datum::Null),
            other => Datum::Text(format!("{:?}", other)),
        }
    }

    fn timestamp_micros(unit: TimeUnit, value: i64) -> i64 {
        match unit {
            TimeUnit::Second => value.saturating_mul(1_000_000),
            TimeUnit::Millisecond => value.saturating_mul(1_000),
            TimeUnit::Microsecond => value,
            TimeUnit::Nanosecond => value.div_euclid(1_000),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;

        #[test]
        fn test_timestamp_becomes_date() {
            let expected = Datum::Date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap());
            assert_eq!(
                value_to_datum(Value::Timestamp(TimeUnit::Second, 1_614_902_399)),
                expected
            );
            assert_eq!(
                value_to_datum(Value::Timestamp(
                    TimeUnit::Microsecond,
                    1_614_902_399_000_000
                )),
                expected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_engine_reports_query_error() {
        let err = UnavailableEngine.query("SELECT 1").unwrap_err();
        assert_eq!(err.kind(), "QueryError");
    }
}
