//! Projection of accumulated records onto a declared column list

use super::{ColumnKind, Table};
use crate::config::TableConfig;
use crate::error::{Error, Result};
use crate::types::{Record, RecordSet};
use arrow::array::{ArrayRef, ListBuilder, StringBuilder};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Selects and orders a fixed column subset from a [`RecordSet`]
///
/// A column is stored as [`ColumnKind::TextList`] when it is declared as a
/// sequence column or when any record holds an array under it; every other
/// column is [`ColumnKind::Text`]. Missing fields and JSON nulls become
/// nulls. Scalars found in a list column become one-element lists.
#[derive(Clone, Debug)]
pub struct TableProjector {
    columns: Vec<String>,
    sequence_columns: HashSet<String>,
}

impl TableProjector {
    /// Project onto `columns`, in that order
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            sequence_columns: HashSet::new(),
        }
    }

    /// Force these columns to be list columns even when no record holds an array
    pub fn with_sequence_columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.sequence_columns.extend(columns);
        self
    }

    /// Projector for the configured column set
    pub fn from_config(config: &TableConfig) -> Self {
        Self::new(config.columns.clone()).with_sequence_columns(config.sequence_columns.clone())
    }

    /// Declared columns
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Kind of every declared column for these records
    pub fn infer_kinds(&self, records: &RecordSet) -> Vec<ColumnKind> {
        self.columns
            .iter()
            .map(|column| {
                let holds_array = records
                    .records()
                    .iter()
                    .any(|r| matches!(r.get(column), Some(Value::Array(_))));
                if holds_array || self.sequence_columns.contains(column) {
                    ColumnKind::TextList
                } else {
                    ColumnKind::Text
                }
            })
            .collect()
    }

    /// Build the projected table
    ///
    /// # Errors
    /// Returns [`Error::Schema`] for an empty record set, which has no rows
    /// to anchor a schema on; callers skip projection in that case.
    pub fn project(&self, records: &RecordSet) -> Result<Table> {
        if records.is_empty() {
            return Err(Error::Schema(
                "cannot project an empty record set".to_string(),
            ));
        }

        let kinds = self.infer_kinds(records);
        let fields: Vec<Field> = self
            .columns
            .iter()
            .zip(&kinds)
            .map(|(name, kind)| Field::new(name, kind.data_type(), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let arrays: Vec<ArrayRef> = self
            .columns
            .iter()
            .zip(&kinds)
            .map(|(name, kind)| match kind {
                ColumnKind::Text => text_column(records.records(), name),
                ColumnKind::TextList => list_column(records.records(), name),
            })
            .collect();

        let batch = RecordBatch::try_new(schema, arrays)?;
        Ok(Table::from_batch(batch))
    }
}

/// Text form of a scalar JSON value; strings are taken verbatim, everything
/// else as compact JSON
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_column(records: &[Record], name: &str) -> ArrayRef {
    let mut builder = StringBuilder::new();
    for record in records {
        match record.get(name) {
            None | Some(Value::Null) => builder.append_null(),
            Some(value) => builder.append_value(scalar_text(value)),
        }
    }
    Arc::new(builder.finish())
}

fn list_column(records: &[Record], name: &str) -> ArrayRef {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for record in records {
        match record.get(name) {
            None | Some(Value::Null) => builder.append(false),
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::Null => builder.values().append_null(),
                        other => builder.values().append_value(scalar_text(other)),
                    }
                }
                builder.append(true);
            }
            Some(scalar) => {
                builder.values().append_value(scalar_text(scalar));
                builder.append(true);
            }
        }
    }
    Arc::new(builder.finish())
}
