//! Row filters for [`crate::types::Table`].
//!
//! A [`Filter`] is a named predicate that produces a boolean mask over a table's rows; rows whose
//! mask entry is `true` are kept.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::TransformErrorKind;
use crate::types::{Table, Value};

use super::transform::TransformContext;

/// Default window of the recency filter.
pub const DEFAULT_RECENCY_DAYS: i64 = 365;

/// Largest window `recent:<days>` accepts (about 2700 years).
pub const MAX_RECENCY_DAYS: i64 = 1_000_000;

/// Comparison operator of [`Filter::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl CompareOp {
    /// Operators in the order they must be tried when parsing (two-character ones first).
    pub(crate) const PARSE_ORDER: [(&'static str, CompareOp); 6] = [
        (">=", CompareOp::Ge),
        ("<=", CompareOp::Le),
        ("!=", CompareOp::Ne),
        ("==", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ];

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    fn holds(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Gt => ord == Greater,
            CompareOp::Ge => ord != Less,
            CompareOp::Lt => ord == Less,
            CompareOp::Le => ord != Greater,
            CompareOp::Eq => ord == Equal,
            CompareOp::Ne => ord != Equal,
        }
    }
}

/// Built-in row filters.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Keep rows whose first `*date*` column is within `window_days` of the invocation time.
    ///
    /// Rows whose date does not parse are dropped; tables without a date column pass through.
    Recent { window_days: i64 },
    /// Drop rows where any cell's text contains `test` (case-insensitive).
    NoTestData,
    /// Keep rows where `column <op> value` holds. Numbers compare numerically, anything else as
    /// text; nulls never match.
    Compare {
        column: String,
        op: CompareOp,
        value: String,
    },
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Recent { window_days } if *window_days == DEFAULT_RECENCY_DAYS => f.write_str("recent"),
            Filter::Recent { window_days } => write!(f, "recent:{window_days}"),
            Filter::NoTestData => f.write_str("no-test-data"),
            Filter::Compare { column, op, value } => write!(f, "where:{column}{}{value}", op.symbol()),
        }
    }
}

impl Filter {
    /// Evaluate the filter, returning one entry per row (`true` = keep).
    pub fn mask(&self, table: &Table, ctx: &TransformContext) -> Result<Vec<bool>, TransformErrorKind> {
        match self {
            Filter::Recent { window_days } => {
                let Some(col) = table
                    .schema
                    .field_names()
                    .position(|name| name.to_lowercase().contains("date"))
                else {
                    return Ok(vec![true; table.row_count()]);
                };
                // A window reaching past the earliest representable instant keeps every dated row.
                let cutoff = Duration::try_days(*window_days)
                    .and_then(|window| ctx.now.checked_sub_signed(window))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                Ok(table
                    .rows
                    .iter()
                    .map(|row| parse_date_value(&row[col]).is_some_and(|d| d >= cutoff))
                    .collect())
            }
            Filter::NoTestData => Ok(table
                .rows
                .iter()
                .map(|row| {
                    !row.iter()
                        .any(|v| !v.is_null() && v.to_string().to_lowercase().contains("test"))
                })
                .collect()),
            Filter::Compare { column, op, value } => {
                let col = table.schema.index_of(column).ok_or_else(|| TransformErrorKind::MissingColumn {
                    column: column.clone(),
                    columns: table.column_names(),
                })?;
                let numeric = value.trim().parse::<f64>().ok();
                Ok(table
                    .rows
                    .iter()
                    .map(|row| compare_cell(&row[col], *op, value, numeric))
                    .collect())
            }
        }
    }

    /// Apply the filter, keeping rows whose mask entry is `true`.
    pub fn apply(&self, table: Table, ctx: &TransformContext) -> Result<Table, TransformErrorKind> {
        let mask = self.mask(&table, ctx)?;
        Ok(table.retain_by_mask(&mask))
    }
}

fn compare_cell(cell: &Value, op: CompareOp, text: &str, numeric: Option<f64>) -> bool {
    if cell.is_null() {
        return false;
    }
    match (cell.as_f64(), numeric) {
        (Some(lhs), Some(rhs)) => lhs.partial_cmp(&rhs).is_some_and(|ord| op.holds(ord)),
        _ => op.holds(cell.to_string().as_str().cmp(text)),
    }
}

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a date/time cell. Naive values are taken as UTC; non-text cells never parse.
pub fn parse_date_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Utf8(s) => parse_date(s),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(naive.and_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{parse_date_value, CompareOp, Filter};
    use crate::processing::transform::TransformContext;
    use crate::types::{Table, Value};

    fn s(v: &str) -> Value {
        Value::Utf8(v.to_string())
    }

    fn ctx() -> TransformContext {
        TransformContext {
            now: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn recent_keeps_last_year_and_drops_unparseable() {
        let t = Table::from_cells(
            vec!["id".to_string(), "Signup Date".to_string()],
            vec![
                vec![Value::Int64(1), s("2025-05-01")],
                vec![Value::Int64(2), s("2023-01-01")],
                vec![Value::Int64(3), s("not a date")],
                vec![Value::Int64(4), Value::Null],
                vec![Value::Int64(5), s("06/30/2024 09:15")],
            ],
        );

        let out = Filter::Recent { window_days: 365 }.apply(t, &ctx()).unwrap();

        let ids: Vec<Value> = out.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec![Value::Int64(1), Value::Int64(5)]);
    }

    #[test]
    fn oversized_window_keeps_every_dated_row() {
        let t = Table::from_cells(
            vec!["id".to_string(), "created_date".to_string()],
            vec![
                vec![Value::Int64(1), s("1901-01-01")],
                vec![Value::Int64(2), s("garbage")],
                vec![Value::Int64(3), s("2025-05-31")],
            ],
        );

        for window_days in [100_000_000, i64::MAX] {
            let mask = Filter::Recent { window_days }.mask(&t, &ctx()).unwrap();
            assert_eq!(mask, vec![true, false, true]);
        }
    }

    #[test]
    fn recent_without_date_column_is_noop() {
        let t = Table::from_cells(vec!["id".to_string()], vec![vec![Value::Int64(1)]]);
        let out = Filter::Recent { window_days: 365 }.apply(t.clone(), &ctx()).unwrap();
        assert_eq!(out, t);
    }

    #[test]
    fn no_test_data_matches_any_cell_case_insensitively() {
        let t = Table::from_cells(
            vec!["name".to_string(), "email".to_string()],
            vec![
                vec![s("Ada"), s("ada@x.io")],
                vec![s("Grace"), s("TEST@x.io")],
                vec![s("Contest winner"), Value::Null],
                vec![s("Linus"), Value::Null],
            ],
        );

        let out = Filter::NoTestData.apply(t, &ctx()).unwrap();

        assert_eq!(out.rows, vec![vec![s("Ada"), s("ada@x.io")], vec![s("Linus"), Value::Null]]);
    }

    #[test]
    fn compare_numeric_and_missing_column() {
        let t = Table::from_cells(
            vec!["age".to_string()],
            vec![vec![Value::Int64(17)], vec![Value::Int64(18)], vec![Value::Int64(42)], vec![Value::Null]],
        );
        let f = Filter::Compare {
            column: "age".to_string(),
            op: CompareOp::Gt,
            value: "18".to_string(),
        };
        assert_eq!(f.mask(&t, &ctx()).unwrap(), vec![false, false, true, false]);

        let missing = Filter::Compare {
            column: "salary".to_string(),
            op: CompareOp::Ge,
            value: "1000".to_string(),
        };
        assert!(missing.mask(&t, &ctx()).is_err());
    }

    #[test]
    fn parses_common_date_layouts() {
        assert!(parse_date_value(&s("2024-02-29T10:00:00Z")).is_some());
        assert!(parse_date_value(&s("2024-02-29 10:00:00")).is_some());
        assert!(parse_date_value(&s("2024/02/29")).is_some());
        assert!(parse_date_value(&s("02/29/2024")).is_some());
        assert!(parse_date_value(&s("yesterday")).is_none());
        assert!(parse_date_value(&Value::Int64(20240229)).is_none());
    }
}
