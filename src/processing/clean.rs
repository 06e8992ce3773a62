//! Fixed cleaning sequence applied to a merged table.
//!
//! The steps run in this order, each producing a [`StageReport`]:
//!
//! 1. [`drop_empty`]: all-null rows, then all-null columns
//! 2. [`drop_duplicates`]: exact duplicate rows, first occurrence kept
//! 3. [`drop_sparse_rows`]: rows with fewer than `floor(0.3 * columns)` non-null cells
//! 4. [`normalize_text`]: trim text cells and turn placeholder strings into nulls
//!
//! Nulls created by step 4 do not feed back into steps 1–3 within the same run.

use std::collections::HashSet;

use crate::ingestion::StageReport;
use crate::types::{DataType, Table, Value, ValueKey};

/// Fraction of the column count a row must fill to survive [`drop_sparse_rows`].
pub const MIN_FILLED_FRACTION: f64 = 0.3;

/// Text cells equal to one of these (after trimming) are replaced with null.
pub const NULL_PLACEHOLDERS: [&str; 4] = ["", "nan", "None", "null"];

/// Run all cleaning steps, returning the cleaned table and one report per step.
pub fn clean(table: Table) -> (Table, Vec<StageReport>) {
    let steps: [(&str, fn(Table) -> Table); 4] = [
        ("drop_empty", drop_empty),
        ("drop_duplicates", drop_duplicates),
        ("drop_sparse_rows", drop_sparse_rows),
        ("normalize_text", normalize_text),
    ];

    let mut reports = Vec::with_capacity(steps.len());
    let mut table = table;
    for (name, step) in steps {
        let (rows_before, columns_before) = (table.row_count(), table.column_count());
        table = step(table);
        reports.push(StageReport {
            stage: name.to_string(),
            rows_before,
            rows_after: table.row_count(),
            columns_before,
            columns_after: table.column_count(),
        });
    }
    (table, reports)
}

/// Drop rows whose cells are all null, then columns whose remaining cells are all null.
///
/// With no rows left every column counts as all-null and is dropped.
pub fn drop_empty(mut table: Table) -> Table {
    table.rows.retain(|row| row.iter().any(|v| !v.is_null()));

    let keep: Vec<usize> = (0..table.column_count())
        .filter(|&col| table.rows.iter().any(|row| !row[col].is_null()))
        .collect();
    if keep.len() == table.column_count() {
        return table;
    }
    table.select_columns(&keep)
}

/// Drop rows equal in every column to an earlier row.
pub fn drop_duplicates(table: Table) -> Table {
    let all: Vec<usize> = (0..table.column_count()).collect();
    drop_duplicates_by(table, &all)
}

/// Drop rows equal to an earlier row on the columns at `subset`.
pub fn drop_duplicates_by(table: Table, subset: &[usize]) -> Table {
    let mut keep = Vec::with_capacity(table.row_count());
    {
        let mut seen: HashSet<Vec<ValueKey<'_>>> = HashSet::with_capacity(table.row_count());
        for row in &table.rows {
            let key: Vec<ValueKey<'_>> = subset.iter().map(|&i| row[i].hash_key()).collect();
            keep.push(seen.insert(key));
        }
    }
    table.retain_by_mask(&keep)
}

/// Drop rows with fewer than `floor(0.3 * column_count)` non-null cells.
///
/// The threshold truncates, so tables with fewer than four columns lose nothing here.
pub fn drop_sparse_rows(table: Table) -> Table {
    let threshold = (MIN_FILLED_FRACTION * table.column_count() as f64).floor() as usize;
    drop_rows_below(table, threshold)
}

/// Drop rows with fewer than `min_non_null` non-null cells.
pub fn drop_rows_below(mut table: Table, min_non_null: usize) -> Table {
    if min_non_null == 0 {
        return table;
    }
    table
        .rows
        .retain(|row| row.iter().filter(|v| !v.is_null()).count() >= min_non_null);
    table
}

/// Trim every text cell of `Utf8` columns and null out [`NULL_PLACEHOLDERS`].
pub fn normalize_text(mut table: Table) -> Table {
    let text_columns: Vec<usize> = table
        .schema
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.data_type == DataType::Utf8)
        .map(|(i, _)| i)
        .collect();

    for row in &mut table.rows {
        for &col in &text_columns {
            let replacement = match &row[col] {
                Value::Utf8(s) => {
                    let trimmed = s.trim();
                    if NULL_PLACEHOLDERS.contains(&trimmed) {
                        Some(Value::Null)
                    } else if trimmed.len() != s.len() {
                        Some(Value::Utf8(trimmed.to_string()))
                    } else {
                        None
                    }
                }
                _ => None,
            };
            if let Some(v) = replacement {
                row[col] = v;
            }
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::{clean, drop_duplicates, drop_empty, drop_sparse_rows, normalize_text};
    use crate::types::{Table, Value};

    fn s(v: &str) -> Value {
        Value::Utf8(v.to_string())
    }

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table::from_cells(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn drop_empty_removes_all_null_rows_then_columns() {
        let t = table(
            &["id", "unused", "name"],
            vec![
                vec![Value::Int64(1), Value::Null, s("a")],
                vec![Value::Null, Value::Null, Value::Null],
                vec![Value::Int64(2), Value::Null, Value::Null],
            ],
        );

        let out = drop_empty(t);

        assert_eq!(out.column_names(), vec!["id", "name"]);
        assert_eq!(out.rows, vec![vec![Value::Int64(1), s("a")], vec![Value::Int64(2), Value::Null]]);
    }

    #[test]
    fn drop_empty_with_no_rows_left_drops_every_column() {
        let t = table(&["a", "b"], vec![vec![Value::Null, Value::Null]]);
        let out = drop_empty(t);
        assert_eq!(out.row_count(), 0);
        assert_eq!(out.column_count(), 0);
    }

    #[test]
    fn drop_duplicates_keeps_first_occurrence() {
        let t = table(
            &["id", "name"],
            vec![
                vec![Value::Int64(1), s("a")],
                vec![Value::Int64(2), s("b")],
                vec![Value::Int64(1), s("a")],
                vec![Value::Int64(1), s("A")],
            ],
        );

        let out = drop_duplicates(t);

        assert_eq!(out.row_count(), 3);
        assert_eq!(out.rows[2], vec![Value::Int64(1), s("A")]);
    }

    #[test]
    fn sparse_threshold_truncates() {
        // 10 columns -> threshold 3.
        let cols: Vec<String> = (0..10).map(|i| format!("c{i}")).collect();
        let mut two = vec![Value::Null; 10];
        two[0] = Value::Int64(1);
        two[1] = Value::Int64(1);
        let mut three = two.clone();
        three[2] = Value::Int64(1);
        let t = Table::from_cells(cols, vec![two, three.clone()]);

        let out = drop_sparse_rows(t);

        assert_eq!(out.rows, vec![three]);
    }

    #[test]
    fn sparse_threshold_of_zero_keeps_everything() {
        // 3 columns -> floor(0.9) = 0.
        let t = table(&["a", "b", "c"], vec![vec![Value::Null, Value::Null, Value::Null]]);
        assert_eq!(drop_sparse_rows(t).row_count(), 1);
    }

    #[test]
    fn normalize_text_trims_and_nulls_placeholders() {
        let t = table(
            &["name", "n"],
            vec![
                vec![s("  Ada "), Value::Int64(1)],
                vec![s("nan"), Value::Int64(2)],
                vec![s(" None"), Value::Int64(3)],
                vec![s("   "), Value::Int64(4)],
                vec![s("NULL"), Value::Int64(5)],
            ],
        );

        let out = normalize_text(t);

        let names: Vec<Value> = out.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(names, vec![s("Ada"), Value::Null, Value::Null, Value::Null, s("NULL")]);
    }

    #[test]
    fn all_null_row_costs_exactly_one_row() {
        let t = table(
            &["id", "name"],
            vec![
                vec![Value::Int64(1), s("a")],
                vec![Value::Null, Value::Null],
                vec![Value::Int64(2), s("b")],
            ],
        );

        let (out, reports) = clean(t);

        assert_eq!(out.row_count(), 2);
        assert_eq!(reports[0].rows_before, 3);
        assert_eq!(reports[0].rows_after, 2);
        assert!(reports[1..].iter().all(|r| r.rows_before == r.rows_after));
    }

    #[test]
    fn placeholder_nulls_do_not_feed_back_into_the_same_run() {
        // Row 2 only becomes all-null during normalize_text, after drop_empty already ran.
        let t = table(&["name"], vec![vec![s("a")], vec![s("null")]]);
        let (out, _) = clean(t);
        assert_eq!(out.rows, vec![vec![s("a")], vec![Value::Null]]);
    }

    #[test]
    fn cleaning_normalized_output_again_changes_nothing() {
        let t = table(
            &["id", "name", "email", "city"],
            vec![
                vec![Value::Int64(1), s("Ada"), s("ada@x.io"), Value::Null],
                vec![Value::Int64(1), s("Ada"), s("ada@x.io"), Value::Null],
                vec![Value::Int64(2), Value::Null, Value::Null, Value::Null],
                vec![Value::Int64(3), s("Linus"), Value::Null, s("Helsinki")],
            ],
        );

        let (once, _) = clean(t);
        let (twice, reports) = clean(once.clone());

        assert_eq!(once, twice);
        assert!(reports.iter().all(|r| r.rows_before == r.rows_after && r.columns_before == r.columns_after));
    }
}
