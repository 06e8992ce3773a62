//! Output writer for merged tables.
//!
//! The format is chosen by extension: `.xlsx` (any case) writes a single-sheet workbook, anything
//! else writes CSV. Column order is the table's schema order and there is no index column.

use std::path::Path;

use crate::error::WriteError;
use crate::types::Table;

/// Sheet name used for workbook output.
pub const SHEET_NAME: &str = "Sheet1";

/// Write `table` to `path`, replacing any existing file.
pub fn write_table(table: &Table, path: impl AsRef<Path>) -> Result<(), WriteError> {
    let path = path.as_ref();
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));

    if is_xlsx {
        write_xlsx(table, path)
    } else {
        write_csv(table, path)
    }
}

/// Render `table` as CSV bytes. Nulls are empty fields.
pub fn render_csv(table: &Table) -> Result<Vec<u8>, WriteError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(table.schema.field_names())?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.into_inner().map_err(|e| WriteError::Io(e.into_error()))
}

fn write_csv(table: &Table, path: &Path) -> Result<(), WriteError> {
    // Render fully before touching the destination so a failure leaves no partial file.
    let bytes = render_csv(table)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(feature = "excel")]
fn write_xlsx(table: &Table, path: &Path) -> Result<(), WriteError> {
    use rust_xlsxwriter::Workbook;

    use crate::types::Value;

    const MAX_ROWS: usize = 1_048_576;
    const MAX_COLUMNS: usize = 16_384;

    if table.row_count() + 1 > MAX_ROWS || table.column_count() > MAX_COLUMNS {
        return Err(WriteError::TooLarge {
            message: format!(
                "{} rows x {} columns (limit {} rows incl. header, {} columns)",
                table.row_count(),
                table.column_count(),
                MAX_ROWS,
                MAX_COLUMNS
            ),
        });
    }

    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name(SHEET_NAME)?;

    // Bounds were checked above, so the narrowing casts below cannot truncate.
    for (col, name) in table.schema.field_names().enumerate() {
        ws.write_string(0, col as u16, name)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Null => {}
                Value::Int64(v) => {
                    ws.write_number(r, c, *v as f64)?;
                }
                Value::Float64(v) => {
                    ws.write_number(r, c, *v)?;
                }
                Value::Bool(v) => {
                    ws.write_boolean(r, c, *v)?;
                }
                Value::Utf8(s) => {
                    ws.write_string(r, c, s)?;
                }
            }
        }
    }

    wb.save(path)?;
    Ok(())
}

#[cfg(not(feature = "excel"))]
fn write_xlsx(_table: &Table, path: &Path) -> Result<(), WriteError> {
    Err(WriteError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("cannot write {}: excel support not enabled", path.display()),
    )))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{render_csv, write_table};
    use crate::types::{Table, Value};

    fn tmp_file(name: &str, ext: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("crm-data-sync-{name}-{nanos}.{ext}"))
    }

    fn sample() -> Table {
        Table::from_cells(
            vec!["id".to_string(), "name".to_string(), "score".to_string()],
            vec![
                vec![Value::Int64(1), Value::Utf8("Ada, Countess".to_string()), Value::Float64(3.0)],
                vec![Value::Int64(2), Value::Null, Value::Float64(2.5)],
            ],
        )
    }

    #[test]
    fn csv_has_header_no_index_and_empty_nulls() {
        let text = String::from_utf8(render_csv(&sample()).unwrap()).unwrap();
        assert_eq!(text, "id,name,score\n1,\"Ada, Countess\",3.0\n2,,2.5\n");
    }

    #[test]
    fn non_xlsx_extension_writes_csv() {
        let path = tmp_file("writer", "out");
        write_table(&sample(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("id,name,score\n"));
        let _ = std::fs::remove_file(path);
    }

    #[cfg(feature = "excel")]
    #[test]
    fn uppercase_xlsx_extension_writes_a_workbook() {
        let path = tmp_file("writer-upper", "XLSX");
        write_table(&sample(), &path).unwrap();
        // xlsx files are zip archives.
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        let _ = std::fs::remove_file(path);
    }

    #[cfg(feature = "excel")]
    #[test]
    fn workbook_output_reads_back_as_sheet1() {
        use crate::ingestion::excel::load_workbook_from_path;

        let path = tmp_file("writer", "xlsx");
        write_table(&sample(), &path).unwrap();

        let sheets = load_workbook_from_path(&path, true).unwrap();
        assert_eq!(sheets[0].sheet, "Sheet1");
        assert_eq!(sheets[0].table.column_names(), vec!["id", "name", "score"]);
        assert_eq!(sheets[0].table.rows[1][1], Value::Null);
        let _ = std::fs::remove_file(path);
    }
}
