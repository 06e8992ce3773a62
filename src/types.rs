//! Core data model types.
//!
//! Every loader produces an in-memory [`Table`]: an ordered list of rows over a [`Schema`] (a list
//! of typed [`Field`]s). Column types are inferred from the data rather than declared up front.

use std::fmt;

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// Combine two column types into one that can hold both.
    ///
    /// Identical types stay as they are, integers widen to floats, and any other mix falls back to
    /// [`DataType::Utf8`].
    pub fn unify(self, other: DataType) -> DataType {
        match (self, other) {
            (a, b) if a == b => a,
            (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => DataType::Float64,
            _ => DataType::Utf8,
        }
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing the shape of a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float. Loaders never produce non-finite floats.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The natural column type of this value, or `None` for null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::Bool(_) => Some(DataType::Bool),
            Value::Utf8(_) => Some(DataType::Utf8),
        }
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Key used for hashing whole rows (floats compare by bit pattern).
    pub(crate) fn hash_key(&self) -> ValueKey<'_> {
        match self {
            Value::Null => ValueKey::Null,
            Value::Int64(v) => ValueKey::Int(*v),
            Value::Float64(v) => ValueKey::Float(v.to_bits()),
            Value::Bool(v) => ValueKey::Bool(*v),
            Value::Utf8(s) => ValueKey::Text(s.as_str()),
        }
    }
}

/// Text form used when writing CSV output and by text-matching filters.
///
/// Nulls render as an empty string; floats without a fractional part keep a trailing `.0`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) if v.fract() == 0.0 && v.abs() < 1e16 => write!(f, "{v:.1}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            Value::Utf8(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey<'a> {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(&'a str),
}

/// In-memory table.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Build a table from column names and typed cells, inferring each column's type.
    ///
    /// Column types are the [`DataType::unify`] of every non-null cell; integer cells in a column
    /// that unifies to `Float64` are widened. A column without any values is `Utf8`.
    pub fn from_cells(columns: Vec<String>, mut rows: Vec<Vec<Value>>) -> Self {
        let mut types: Vec<Option<DataType>> = vec![None; columns.len()];
        for row in &rows {
            for (slot, value) in types.iter_mut().zip(row) {
                if let Some(t) = value.data_type() {
                    *slot = Some(slot.map_or(t, |cur| cur.unify(t)));
                }
            }
        }

        for row in &mut rows {
            for (value, t) in row.iter_mut().zip(&types) {
                widen_if_float(value, t.unwrap_or(DataType::Utf8));
            }
        }

        let fields = columns
            .into_iter()
            .zip(types)
            .map(|(name, t)| Field::new(name, t.unwrap_or(DataType::Utf8)))
            .collect();
        Self::new(Schema::new(fields), rows)
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the table.
    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.schema.field_names().map(str::to_owned).collect()
    }

    /// Keep rows whose entry in `mask` is `true`.
    ///
    /// # Panics
    ///
    /// Panics if `mask` does not have one entry per row.
    pub fn retain_by_mask(mut self, mask: &[bool]) -> Self {
        assert!(
            mask.len() == self.rows.len(),
            "mask length {} does not match row count {}",
            mask.len(),
            self.rows.len()
        );
        let mut keep = mask.iter();
        self.rows.retain(|_| *keep.next().unwrap_or(&false));
        self
    }

    /// Keep only the columns at `indices` (in the given order).
    pub fn select_columns(self, indices: &[usize]) -> Self {
        let fields = indices.iter().map(|&i| self.schema.fields[i].clone()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Self::new(Schema::new(fields), rows)
    }
}

pub(crate) fn widen_if_float(value: &mut Value, column_type: DataType) {
    if column_type == DataType::Float64 {
        if let Value::Int64(v) = value {
            *value = Value::Float64(*v as f64);
        }
    }
}
