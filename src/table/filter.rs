//! Export filter and consolidation

use super::{ColumnKind, Table};
use crate::error::{Error, Result};
use arrow::array::{AsArray, BooleanArray};
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

/// A filtered table held as exactly one batch
#[derive(Clone, Debug)]
pub struct ExportTable {
    batch: RecordBatch,
    rows_dropped: usize,
}

impl ExportTable {
    /// The single consolidated batch
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Schema of the export
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Rows that survived the filter
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Rows removed by the filter
    pub fn rows_dropped(&self) -> usize {
        self.rows_dropped
    }
}

/// Keeps rows whose key column holds a non-blank value
#[derive(Clone, Debug)]
pub struct ExportFilter {
    key_column: String,
}

impl ExportFilter {
    /// Filter on `key_column`
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
        }
    }

    /// Drop rows whose key is null or only whitespace, then merge the
    /// survivors into one batch in their original order
    ///
    /// # Errors
    /// Returns [`Error::Schema`] if the key column is missing or is not a
    /// text column.
    pub fn filter_and_consolidate(&self, table: &Table) -> Result<ExportTable> {
        let schema = table.schema();
        let (key_index, _) = schema.column_with_name(&self.key_column).ok_or_else(|| {
            Error::Schema(format!("key column '{}' is missing", self.key_column))
        })?;
        if table.column_kind(&self.key_column) != Some(ColumnKind::Text) {
            return Err(Error::Schema(format!(
                "key column '{}' is not a text column",
                self.key_column
            )));
        }

        let filtered = table
            .batches()
            .iter()
            .map(|batch| {
                let keys = batch.column(key_index).as_string::<i32>();
                let keep: BooleanArray = keys
                    .iter()
                    .map(|key| Some(key.is_some_and(|k| !k.trim().is_empty())))
                    .collect();
                Ok(filter_record_batch(batch, &keep)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let batch = concat_batches(&schema, &filtered)?;
        Ok(ExportTable {
            rows_dropped: table.num_rows() - batch.num_rows(),
            batch,
        })
    }
}
