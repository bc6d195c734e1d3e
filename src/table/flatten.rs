//! Flattening of list columns into delimited text columns

use super::{ColumnKind, Table};
use crate::error::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray, ListArray, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Separator placed between the elements of a flattened list
pub const JOINER: &str = ", ";

/// Replace every named list column with its elements joined by [`JOINER`]
///
/// Null and empty lists become `""`, so flattened columns hold no nulls.
/// Null elements inside a list are skipped. Named columns that already hold
/// text, and columns that are not named, pass through unchanged. Row count
/// and row order are preserved, batch by batch.
///
/// # Errors
/// Returns [`Error::Schema`] if a named column is missing or is neither a
/// text nor a text-list column.
pub fn flatten(table: &Table, sequence_columns: &[String]) -> Result<Table> {
    let schema = table.schema();
    let mut flatten_at = Vec::new();

    for name in sequence_columns {
        let (index, field) = schema
            .column_with_name(name)
            .ok_or_else(|| Error::Schema(format!("cannot flatten missing column '{}'", name)))?;
        match ColumnKind::from_data_type(field.data_type()) {
            Some(ColumnKind::TextList) => flatten_at.push(index),
            Some(ColumnKind::Text) => {}
            None => {
                return Err(Error::Schema(format!(
                    "cannot flatten column '{}' of type {}",
                    name,
                    field.data_type()
                )));
            }
        }
    }

    if flatten_at.is_empty() {
        return Ok(table.clone());
    }

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            if flatten_at.contains(&index) {
                Field::new(field.name(), DataType::Utf8, false)
            } else {
                field.as_ref().clone()
            }
        })
        .collect();
    let flat_schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));

    let batches = table
        .batches()
        .iter()
        .map(|batch| {
            let columns: Vec<ArrayRef> = batch
                .columns()
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    if flatten_at.contains(&index) {
                        join_list(column.as_list::<i32>())
                    } else {
                        column.clone()
                    }
                })
                .collect();
            Ok(RecordBatch::try_new(flat_schema.clone(), columns)?)
        })
        .collect::<Result<Vec<_>>>()?;

    Table::new(flat_schema, batches)
}

fn join_list(list: &ListArray) -> ArrayRef {
    let mut builder = StringBuilder::with_capacity(list.len(), list.values().len() * 8);
    for row in 0..list.len() {
        if list.is_null(row) {
            builder.append_value("");
            continue;
        }
        let items = list.value(row);
        let joined = items
            .as_string::<i32>()
            .iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(JOINER);
        builder.append_value(joined);
    }
    Arc::new(builder.finish())
}
