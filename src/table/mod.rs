//! Columnar tables built on Arrow record batches
//!
//! A [`Table`] is an ordered list of record batches sharing one schema. Row
//! order is the concatenation order of its batches. Every column is either
//! plain text or a list of text values, see [`ColumnKind`].
//!
//! - [`projector`] - records to table
//! - [`flatten`] - list columns to joined text columns
//! - [`filter`] - key-column filter and consolidation into one batch

pub mod filter;
pub mod flatten;
pub mod projector;

pub use filter::{ExportFilter, ExportTable};
pub use flatten::{JOINER, flatten};
pub use projector::TableProjector;

use crate::error::{Error, Result};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Logical type of a table column
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Nullable UTF-8 string
    Text,
    /// Nullable list of nullable UTF-8 strings
    TextList,
}

impl ColumnKind {
    /// Arrow type used to store this kind
    pub fn data_type(self) -> DataType {
        match self {
            ColumnKind::Text => DataType::Utf8,
            ColumnKind::TextList => {
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
            }
        }
    }

    /// Kind stored under an Arrow type, if it is one of ours
    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Utf8 => Some(ColumnKind::Text),
            DataType::List(item) if item.data_type() == &DataType::Utf8 => {
                Some(ColumnKind::TextList)
            }
            _ => None,
        }
    }
}

/// Ordered record batches sharing one schema
#[derive(Clone, Debug)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Assemble a table, checking every batch against `schema`
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        for (index, batch) in batches.iter().enumerate() {
            if batch.schema().fields() != schema.fields() {
                return Err(Error::Schema(format!(
                    "batch {} does not match the table schema",
                    index
                )));
            }
        }
        Ok(Self { schema, batches })
    }

    /// Single-batch table
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    /// Table schema
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Batches in row order
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total row count across batches
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Column names in schema order
    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Kind of the named column, None if absent or not a text/list column
    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        let field = self.schema.field_with_name(name).ok()?;
        ColumnKind::from_data_type(field.data_type())
    }

    /// Names of the list-typed columns, in schema order
    pub fn list_columns(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .filter(|f| ColumnKind::from_data_type(f.data_type()) == Some(ColumnKind::TextList))
            .map(|f| f.name().clone())
            .collect()
    }

    /// Merge all batches into one, preserving row order
    pub fn consolidate(&self) -> Result<RecordBatch> {
        Ok(concat_batches(&self.schema, &self.batches)?)
    }
}

/// Tables are equal when they hold the same columns and the same rows in the
/// same order, however those rows are split into batches.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        if self.schema.fields() != other.schema.fields() {
            return false;
        }
        match (self.consolidate(), other.consolidate()) {
            (Ok(a), Ok(b)) => a.columns() == b.columns(),
            _ => false,
        }
    }
}
