//! Concatenation of loaded tables.

use crate::types::{widen_if_float, DataType, Field, Schema, Table, Value};

/// Concatenate `tables` into one.
///
/// The column set is the union of all input columns in first-appearance order; rows keep input
/// order; cells a source does not have are [`Value::Null`]. A column's type is the
/// [`DataType::unify`] of its type in every source that has it. No dedup or cleaning happens here.
pub fn merge_tables<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Table {
    let tables: Vec<&Table> = tables.into_iter().collect();

    let mut fields: Vec<Field> = Vec::new();
    for table in &tables {
        for field in &table.schema.fields {
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => existing.data_type = existing.data_type.unify(field.data_type),
                None => fields.push(field.clone()),
            }
        }
    }
    let schema = Schema::new(fields);
    let types: Vec<DataType> = schema.fields.iter().map(|f| f.data_type).collect();

    let total_rows = tables.iter().map(|t| t.row_count()).sum();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(total_rows);
    for table in &tables {
        // Position of each source column in the merged schema.
        let projection: Vec<usize> = table
            .schema
            .fields
            .iter()
            .filter_map(|f| schema.index_of(&f.name))
            .collect();

        for row in &table.rows {
            let mut out = vec![Value::Null; schema.len()];
            for (value, &dst) in row.iter().zip(&projection) {
                let mut value = value.clone();
                widen_if_float(&mut value, types[dst]);
                out[dst] = value;
            }
            rows.push(out);
        }
    }

    Table::new(schema, rows)
}
