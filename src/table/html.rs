//! HTML table extraction.
//!
//! Parses every `<table>` in a document into a [`Table`]. Header cells come
//! from the first row made only of `<th>` cells; `rowspan`/`colspan` are
//! expanded so that each data row lines up with the header.

use super::{Datum, Table};
use crate::error::AnalysisError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Largest span honored, guards against absurd attribute values.
const MAX_SPAN: usize = 64;

fn footnote_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[[^\]]*\]").expect("valid footnote regex"))
}

/// Remove footnote markers such as `[1]` or `[a]` and trim.
pub fn strip_footnotes(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    footnote_pattern()
        .replace_all(&collapsed, "")
        .trim()
        .to_string()
}

/// Parse all tables in `html`. Tables without a header row are skipped.
pub fn parse_tables(html: &str) -> Result<Vec<Table>, AnalysisError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;

    let mut tables = Vec::new();
    for table in document.select(&table_selector) {
        let rows: Vec<ElementRef> = table
            .select(&row_selector)
            .filter(|row| belongs_to(row, &table))
            .collect();
        if let Some(parsed) = parse_rows(&rows) {
            tables.push(parsed);
        }
    }
    Ok(tables)
}

fn selector(css: &str) -> Result<Selector, AnalysisError> {
    Selector::parse(css).map_err(|e| AnalysisError::Parse(format!("bad selector {}: {}", css, e)))
}

/// True when the nearest enclosing `<table>` of `row` is `table`, so nested
/// tables do not leak rows into their parent.
fn belongs_to(row: &ElementRef, table: &ElementRef) -> bool {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
        .map(|el| el.id() == table.id())
        .unwrap_or(false)
}

struct Cell {
    text: String,
    header: bool,
    rowspan: usize,
    colspan: usize,
}

fn row_cells(row: &ElementRef) -> Vec<Cell> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "th" | "td"))
        .map(|el| Cell {
            text: strip_footnotes(&el.text().collect::<String>()),
            header: el.value().name() == "th",
            rowspan: span(el.value().attr("rowspan")),
            colspan: span(el.value().attr("colspan")),
        })
        .collect()
}

fn span(attr: Option<&str>) -> usize {
    attr.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .map(|v| v.min(MAX_SPAN))
        .unwrap_or(1)
}

fn parse_rows(rows: &[ElementRef]) -> Option<Table> {
    let cells: Vec<Vec<Cell>> = rows.iter().map(row_cells).collect();

    let header_index = cells
        .iter()
        .position(|row| !row.is_empty() && row.iter().all(|c| c.header))?;

    let mut headers = Vec::new();
    for cell in &cells[header_index] {
        for _ in 0..cell.colspan {
            headers.push(cell.text.clone());
        }
    }
    let width = headers.len();

    // Pending rowspans: (remaining rows, text) per column.
    let mut carry: Vec<Option<(usize, String)>> = vec![None; width];
    let mut data = Vec::new();

    for row in &cells[header_index + 1..] {
        if row.is_empty() || row.iter().all(|c| c.header) {
            continue;
        }

        let mut values: Vec<Option<String>> = vec![None; width];
        let mut incoming = row.iter();
        let mut col = 0;
        while col < width {
            if let Some((remaining, text)) = carry[col].take() {
                values[col] = Some(text.clone());
                if remaining > 1 {
                    carry[col] = Some((remaining - 1, text));
                }
                col += 1;
                continue;
            }
            let Some(cell) = incoming.next() else {
                break;
            };
            for offset in 0..cell.colspan {
                let target = col + offset;
                if target >= width {
                    break;
                }
                values[target] = Some(cell.text.clone());
                if cell.rowspan > 1 {
                    carry[target] = Some((cell.rowspan - 1, cell.text.clone()));
                }
            }
            col += cell.colspan;
        }

        data.push(
            values
                .into_iter()
                .map(|v| v.map(|t| Datum::infer(&t)).unwrap_or(Datum::Null))
                .collect(),
        );
    }

    Some(Table::from_rows(headers, data))
}
