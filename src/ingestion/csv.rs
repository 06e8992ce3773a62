//! CSV loading.

use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, Field, Schema, Table, Value};

/// Load a CSV file into an in-memory [`Table`].
///
/// Rules:
///
/// - CSV must have a header row. Repeated header names get a `.1`, `.2`, ... suffix and blank
///   names become `Unnamed: <index>`.
/// - Exactly-empty cells are null; records shorter than the header are padded with nulls.
/// - Column types are inferred from all non-null cells (see [`infer_column_type`]).
pub fn load_csv_from_path(path: impl AsRef<Path>) -> IngestionResult<Table> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    load_csv_from_reader(&mut rdr, &path.display().to_string())
}

/// Load CSV data from an existing CSV reader. `source_name` is only used in error messages.
pub fn load_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    source_name: &str,
) -> IngestionResult<Table> {
    let headers = dedupe_headers(rdr.headers()?.iter());
    let width = headers.len();

    let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() > width {
            return Err(IngestionError::MalformedRow {
                source_name: source_name.to_owned(),
                // 1-based, +1 again because the header is row 1.
                row: row_idx0 + 2,
                expected: width,
                found: record.len(),
            });
        }

        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|raw| (!raw.is_empty()).then(|| raw.to_owned()))
            .collect();
        row.resize(width, None);
        raw_rows.push(row);
    }

    let types: Vec<DataType> = (0..width)
        .map(|col| infer_column_type(raw_rows.iter().filter_map(|r| r[col].as_deref())))
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&types)
                .map(|(raw, t)| match raw {
                    None => Value::Null,
                    Some(raw) => parse_typed_value(*t, raw),
                })
                .collect()
        })
        .collect();

    let fields = headers
        .into_iter()
        .zip(types)
        .map(|(name, t)| Field::new(name, t))
        .collect();
    Ok(Table::new(Schema::new(fields), rows))
}

/// Infer a column type from its non-null raw cells.
///
/// `Bool` if every cell is `true`/`false` (any case), else `Int64` if every cell parses as an
/// integer, else `Float64` if every cell parses as a finite float, else `Utf8`. Numbers may carry
/// surrounding whitespace. A column with no cells is `Utf8`.
pub fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> DataType {
    let mut any = false;
    let (mut all_bool, mut all_int, mut all_float) = (true, true, true);
    for raw in cells {
        any = true;
        let trimmed = raw.trim();
        all_bool &= parse_bool(trimmed).is_some();
        all_int &= trimmed.parse::<i64>().is_ok();
        all_float &= parse_finite_f64(trimmed).is_some();
        if !(all_bool || all_int || all_float) {
            return DataType::Utf8;
        }
    }

    match (any, all_bool, all_int, all_float) {
        (false, ..) => DataType::Utf8,
        (true, true, ..) => DataType::Bool,
        (true, _, true, _) => DataType::Int64,
        (true, _, _, true) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn parse_typed_value(data_type: DataType, raw: String) -> Value {
    let trimmed = raw.trim();
    match data_type {
        DataType::Bool => parse_bool(trimmed).map_or(Value::Null, Value::Bool),
        DataType::Int64 => trimmed.parse::<i64>().map_or(Value::Null, Value::Int64),
        DataType::Float64 => parse_finite_f64(trimmed).map_or(Value::Null, Value::Float64),
        DataType::Utf8 => Value::Utf8(raw),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_finite_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn dedupe_headers<S: AsRef<str>>(raw: impl Iterator<Item = S>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (idx, name) in raw.enumerate() {
        let name = match name.as_ref() {
            "" => format!("Unnamed: {idx}"),
            other => other.to_owned(),
        };
        let mut candidate = name.clone();
        let mut n = 0;
        while out.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{dedupe_headers, infer_column_type};
    use crate::types::DataType;

    #[test]
    fn infers_narrowest_type() {
        assert_eq!(infer_column_type(["1", " 2 ", "-3"].into_iter()), DataType::Int64);
        assert_eq!(infer_column_type(["1", "2.5"].into_iter()), DataType::Float64);
        assert_eq!(infer_column_type(["TRUE", "false"].into_iter()), DataType::Bool);
        assert_eq!(infer_column_type(["1", "abc"].into_iter()), DataType::Utf8);
        assert_eq!(infer_column_type(std::iter::empty()), DataType::Utf8);
    }

    #[test]
    fn nan_and_inf_stay_text() {
        assert_eq!(infer_column_type(["nan"].into_iter()), DataType::Utf8);
        assert_eq!(infer_column_type(["1.5", "inf"].into_iter()), DataType::Utf8);
    }

    #[test]
    fn duplicate_headers_get_suffixes() {
        let out = dedupe_headers(["id", "name", "id", "id", ""].into_iter());
        assert_eq!(out, vec!["id", "name", "id.1", "id.2", "Unnamed: 4"]);
    }
}
