#![cfg(feature = "excel")]

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::csv::dedupe_headers;
use crate::error::IngestionResult;
use crate::types::{Table, Value};

/// One loaded worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    /// Worksheet name.
    pub sheet: String,
    /// Sheet contents.
    pub table: Table,
}

/// Load a spreadsheet (`.xlsx`, `.xls`, `.ods`, etc.) into one [`Table`] per non-empty sheet.
///
/// Behavior:
/// - Sheets are visited in workbook order; if `first_only` is set, only the first sheet with a
///   header row is returned
/// - The first non-empty row of a sheet is its header row; sheets without one are skipped
/// - Remaining rows are converted cell by cell, then each column's type is unified
pub fn load_workbook_from_path(path: impl AsRef<Path>, first_only: bool) -> IngestionResult<Vec<SheetTable>> {
    let mut workbook = open_workbook_auto(path)?;

    let mut out = Vec::new();
    for sheet in workbook.sheet_names() {
        let range = workbook.worksheet_range(&sheet)?;
        let Some(table) = load_sheet_range(&range) else {
            continue;
        };
        out.push(SheetTable { sheet, table });
        if first_only {
            break;
        }
    }
    Ok(out)
}

fn load_sheet_range(range: &calamine::Range<Data>) -> Option<Table> {
    let mut rows_iter = range.rows().skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));
    let header_cells = dedupe_headers(rows_iter.next()?.iter().map(cell_to_header_string));
    let width = header_cells.len();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row in rows_iter {
        let mut out_row: Vec<Value> = row.iter().take(width).map(convert_cell).collect();
        out_row.resize(width, Value::Null);
        rows.push(out_row);
    }

    Some(Table::from_cells(header_cells, rows))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => (*f as i64).to_string(),
        Data::Empty => "".to_string(),
        other => cell_to_string(other),
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) if !f.is_finite() => Value::Null,
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::Int64(*f as i64),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::Error(_) => Value::Null,
        other => Value::Utf8(cell_to_string(other)),
    }
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => c.to_string(),
    }
}
