//! Named, ordered transforms applied after cleaning (merge) or before upload.
//!
//! Transforms are usually built from their textual form via [`std::str::FromStr`]:
//!
//! | text | transform |
//! |------|-----------|
//! | `recent` / `recent:<days>` | [`Filter::Recent`] |
//! | `no-test-data` | [`Filter::NoTestData`] |
//! | `where:<column><op><value>` | [`Filter::Compare`] |
//! | `dedupe:<c1,c2,...>` | [`Transform::DropDuplicates`] |
//! | `min-non-null:<n>` | [`Transform::DropSparseRows`] |

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{TransformError, TransformErrorKind};
use crate::ingestion::{PipelineObserver, StageReport};
use crate::types::Table;

use super::clean::{drop_duplicates_by, drop_rows_below};
use super::filter::{CompareOp, Filter, DEFAULT_RECENCY_DAYS, MAX_RECENCY_DAYS};

/// Inputs shared by every transform of one run.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext {
    /// Invocation time; relative filters measure against it.
    pub now: DateTime<Utc>,
}

impl TransformContext {
    /// Context pinned to the current time.
    pub fn now() -> Self {
        Self { now: Utc::now() }
    }
}

impl Default for TransformContext {
    fn default() -> Self {
        Self::now()
    }
}

/// A table-to-table transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Row filter.
    Filter(Filter),
    /// Drop rows equal to an earlier row on `subset` (first occurrence kept).
    DropDuplicates { subset: Vec<String> },
    /// Drop rows with fewer than `min_non_null` non-null cells.
    DropSparseRows { min_non_null: usize },
}

impl Transform {
    /// The name used in logs and errors (the textual form).
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Apply the transform.
    pub fn apply(&self, table: Table, ctx: &TransformContext) -> Result<Table, TransformError> {
        let result = match self {
            Transform::Filter(filter) => filter.apply(table, ctx),
            Transform::DropDuplicates { subset } => subset
                .iter()
                .map(|column| {
                    table.schema.index_of(column).ok_or_else(|| TransformErrorKind::MissingColumn {
                        column: column.clone(),
                        columns: table.column_names(),
                    })
                })
                .collect::<Result<Vec<usize>, _>>()
                .map(|indices| drop_duplicates_by(table, &indices)),
            Transform::DropSparseRows { min_non_null } => Ok(drop_rows_below(table, *min_non_null)),
        };
        result.map_err(|kind| TransformError { name: self.name(), kind })
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Filter(filter) => fmt::Display::fmt(filter, f),
            Transform::DropDuplicates { subset } => write!(f, "dedupe:{}", subset.join(",")),
            Transform::DropSparseRows { min_non_null } => write!(f, "min-non-null:{min_non_null}"),
        }
    }
}

impl From<Filter> for Transform {
    fn from(filter: Filter) -> Self {
        Transform::Filter(filter)
    }
}

impl FromStr for Transform {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        let invalid = |message: String| TransformError {
            name: spec.to_string(),
            kind: TransformErrorKind::InvalidSpec { message },
        };

        let (head, arg) = match spec.split_once(':') {
            Some((head, arg)) => (head, Some(arg)),
            None => (spec, None),
        };

        match (head, arg) {
            ("recent", None) => Ok(Filter::Recent {
                window_days: DEFAULT_RECENCY_DAYS,
            }
            .into()),
            ("recent", Some(days)) => {
                let window_days = days
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|d| (0..=MAX_RECENCY_DAYS).contains(d))
                    .ok_or_else(|| {
                        invalid(format!("expected a day count between 0 and {MAX_RECENCY_DAYS}, got '{days}'"))
                    })?;
                Ok(Filter::Recent { window_days }.into())
            }
            ("no-test-data", None) => Ok(Filter::NoTestData.into()),
            ("where", Some(expr)) => {
                let (column, op, value) = CompareOp::PARSE_ORDER
                    .iter()
                    .find_map(|(symbol, op)| {
                        expr.split_once(symbol)
                            .map(|(column, value)| (column.trim(), *op, value.trim()))
                    })
                    .ok_or_else(|| invalid(format!("no comparison operator in '{expr}'")))?;
                if column.is_empty() {
                    return Err(invalid("missing column name".to_string()));
                }
                Ok(Filter::Compare {
                    column: column.to_string(),
                    op,
                    value: value.to_string(),
                }
                .into())
            }
            ("dedupe", Some(columns)) => {
                let subset: Vec<String> = columns
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
                if subset.is_empty() {
                    return Err(invalid("expected at least one column".to_string()));
                }
                Ok(Transform::DropDuplicates { subset })
            }
            ("min-non-null", Some(n)) => {
                let min_non_null = n
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid(format!("expected a row cell count, got '{n}'")))?;
                Ok(Transform::DropSparseRows { min_non_null })
            }
            _ => Err(invalid(
                "expected one of recent[:days], no-test-data, where:<column><op><value>, dedupe:<columns>, \
                 min-non-null:<n>"
                    .to_string(),
            )),
        }
    }
}

/// Apply `transforms` in order, reporting each stage to `observer`.
///
/// Stops at the first failing transform.
pub fn run_transforms(
    mut table: Table,
    transforms: &[Transform],
    ctx: &TransformContext,
    observer: Option<&dyn PipelineObserver>,
) -> Result<Table, TransformError> {
    for transform in transforms {
        let (rows_before, columns_before) = (table.row_count(), table.column_count());
        table = transform.apply(table, ctx)?;
        if let Some(obs) = observer {
            obs.on_stage(&StageReport {
                stage: transform.name(),
                rows_before,
                rows_after: table.row_count(),
                columns_before,
                columns_after: table.column_count(),
            });
        }
    }
    Ok(table)
}
