//! Loading uploaded files into tables.
//!
//! Delimited text goes through the `csv` crate and columnar files through
//! the `parquet` record reader.

use super::{Column, Datum, Table};
use crate::error::AnalysisError;
use bytes::Bytes;
use chrono::NaiveDate;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use tracing::debug;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Declared format of an attached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    /// Format implied by the file name's extension, if tabular.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".csv") {
            Some(TableFormat::Csv)
        } else if lower.ends_with(".parquet") {
            Some(TableFormat::Parquet)
        } else {
            None
        }
    }
}

/// Turns raw bytes of a declared format into a table.
pub trait TableLoader: Send + Sync {
    fn load(&self, bytes: &[u8], format: TableFormat) -> Result<Table, AnalysisError>;
}

/// Loader backed by the `csv` and `parquet` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTableLoader;

impl TableLoader for FileTableLoader {
    fn load(&self, bytes: &[u8], format: TableFormat) -> Result<Table, AnalysisError> {
        match format {
            TableFormat::Csv => load_csv(bytes),
            TableFormat::Parquet => load_parquet(bytes),
        }
    }
}

/// Parse comma-separated text with a header row.
pub fn load_csv(bytes: &[u8]) -> Result<Table, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AnalysisError::Load(format!("Failed to read CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(AnalysisError::Load("CSV has no columns".to_string()));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            AnalysisError::Load(format!("Failed to read CSV row {}: {}", index + 1, e))
        })?;
        rows.push(record.iter().map(Datum::infer).collect());
    }

    debug!("Loaded CSV with {} rows, {} columns", rows.len(), headers.len());
    Ok(Table::from_rows(headers, rows))
}

/// Read every row of a Parquet file into memory.
pub fn load_parquet(bytes: &[u8]) -> Result<Table, AnalysisError> {
    let reader = SerializedFileReader::new(Bytes::copy_from_slice(bytes))
        .map_err(|e| AnalysisError::Load(format!("Failed to open Parquet file: {}", e)))?;

    let names: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let mut columns: Vec<Column> = names
        .iter()
        .map(|name| Column::new(name.clone(), Vec::new()))
        .collect();

    let rows = reader
        .get_row_iter(None)
        .map_err(|e| AnalysisError::Load(format!("Failed to read Parquet rows: {}", e)))?;

    for row in rows {
        let row = row.map_err(|e| AnalysisError::Load(format!("Bad Parquet row: {}", e)))?;
        let mut cells = row.get_column_iter();
        for column in columns.iter_mut() {
            let datum = cells
                .next()
                .map(|(_, field)| field_to_datum(field))
                .unwrap_or(Datum::Null);
            column.values.push(datum);
        }
    }

    Table::from_columns(columns)
        .ok_or_else(|| AnalysisError::Load("Parquet columns have unequal lengths".to_string()))
}

fn field_to_datum(field: &Field) -> Datum {
    match field {
        Field::Null => Datum::Null,
        Field::Bool(b) => Datum::Bool(*b),
        Field::Byte(v) => Datum::Int(i64::from(*v)),
        Field::Short(v) => Datum::Int(i64::from(*v)),
        Field::Int(v) => Datum::Int(i64::from(*v)),
        Field::Long(v) => Datum::Int(*v),
        Field::UByte(v) => Datum::Int(i64::from(*v)),
        Field::UShort(v) => Datum::Int(i64::from(*v)),
        Field::UInt(v) => Datum::Int(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v)
            .map(Datum::Int)
            .unwrap_or(Datum::Float(*v as f64)),
        Field::Float(v) => Datum::Float(f64::from(*v)),
        Field::Double(v) => Datum::Float(*v),
        Field::Str(s) => Datum::Text(s.clone()),
        Field::Date(days) => days_since_epoch(*days)
            .map(Datum::Date)
            .unwrap_or(Datum::Null),
        Field::TimestampMillis(ms) => micros_to_date(ms.saturating_mul(1_000))
            .map(Datum::Date)
            .unwrap_or(Datum::Null),
        Field::TimestampMicros(us) => micros_to_date(*us)
            .map(Datum::Date)
            .unwrap_or(Datum::Null),
        other => Datum::Text(other.to_string()),
    }
}

/// Date part of a Unix timestamp in microseconds.
pub(crate) fn micros_to_date(micros: i64) -> Option<NaiveDate> {
    let days = micros.div_euclid(MICROS_PER_DAY);
    i32::try_from(days).ok().and_then(days_since_epoch)
}

pub(crate) fn days_since_epoch(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(TableFormat::from_file_name("DATA.CSV"), Some(TableFormat::Csv));
        assert_eq!(
            TableFormat::from_file_name("x.parquet"),
            Some(TableFormat::Parquet)
        );
        assert_eq!(TableFormat::from_file_name("notes.txt"), None);
    }

    #[test]
    fn test_timestamps_truncate_to_date() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        assert_eq!(micros_to_date(0), day(1970, 1, 1));
        // 2021-03-04T23:59:59.999999
        assert_eq!(micros_to_date(1_614_902_399_999_999), day(2021, 3, 4));
        assert_eq!(micros_to_date(-1), day(1969, 12, 31));
        assert_eq!(micros_to_date(i64::MAX), None);
    }

    #[test]
    fn test_load_csv() {
        let table = load_csv(b"x,y\n1,2\n2,4\n3,6\n").unwrap();
        assert_eq!(table.column_names(), vec!["x", "y"]);
        assert_eq!(table.shape(), [3, 2]);
        assert_eq!(table.value(2, "y"), Some(&Datum::Int(6)));
    }

    #[test]
    fn test_load_csv_mixed_values() {
        let table = load_csv(b"name,score\nann,1.5\nbob,\ncid,n/a\n").unwrap();
        assert_eq!(table.value(0, "score"), Some(&Datum::Float(1.5)));
        assert_eq!(table.value(1, "score"), Some(&Datum::Null));
        assert_eq!(
            table.value(2, "score"),
            Some(&Datum::Text("n/a".to_string()))
        );
    }

    #[test]
    fn test_load_csv_empty_input_fails() {
        assert!(load_csv(b"").is_err());
    }

    #[test]
    fn test_load_parquet_rejects_garbage() {
        let err = FileTableLoader
            .load(b"definitely not parquet", TableFormat::Parquet)
            .unwrap_err();
        assert_eq!(err.kind(), "LoadError");
    }

    #[test]
    fn test_days_since_epoch() {
        assert_eq!(days_since_epoch(0), NaiveDate::from_ymd_opt(1970, 1, 1));
        assert_eq!(days_since_epoch(365), NaiveDate::from_ymd_opt(1971, 1, 1));
    }
}
