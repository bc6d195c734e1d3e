//! CSV export sink
//!
//! Writes to a temporary file in the same directory as the destination and
//! atomically replaces the destination once every row is flushed. If writing
//! fails part-way, the temporary file is removed and the previous export, if
//! any, stays in place.

use crate::error::{Error, Result, StorageError};
use crate::table::ExportTable;
use arrow::array::{Array, AsArray, StringArray};
use csv::{QuoteStyle, WriterBuilder};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// Serializes an [`ExportTable`] as comma-delimited text with a header row
///
/// Fields containing the delimiter, a quote or a line break are quoted, which
/// covers every value produced by joining list elements with `", "`. Nulls
/// are written as empty fields.
#[derive(Clone, Debug, Default)]
pub struct CsvSink {}

impl CsvSink {
    /// Create a sink
    pub fn new() -> Self {
        Self {}
    }

    /// Write `table` to `path`, replacing any existing file
    ///
    /// Returns the number of data rows written.
    ///
    /// # Errors
    /// Returns [`Error::Schema`] if a column is not a text column (for
    /// example an unflattened list), and [`Error::Storage`] if the file cannot
    /// be written.
    pub fn write(&self, table: &ExportTable, path: &Path) -> Result<usize> {
        let batch = table.batch();
        let schema = batch.schema();

        let columns: Vec<&StringArray> = batch
            .columns()
            .iter()
            .zip(schema.fields())
            .map(|(column, field)| {
                column.as_string_opt::<i32>().ok_or_else(|| {
                    Error::Schema(format!(
                        "column '{}' of type {} cannot be written as text",
                        field.name(),
                        field.data_type()
                    ))
                })
            })
            .collect::<Result<_>>()?;

        let parent_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent_dir).map_err(|e| StorageError::write(path, e))?;

        let temp_file = NamedTempFile::new_in(&parent_dir).map_err(|e| {
            StorageError::write(path, format!("failed to create temporary file: {}", e))
        })?;
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .from_writer(BufWriter::new(temp_file));

        let header: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        writer
            .write_record(&header)
            .map_err(|e| StorageError::write(path, e))?;

        let mut row = Vec::with_capacity(columns.len());
        for index in 0..batch.num_rows() {
            row.clear();
            row.extend(columns.iter().map(|column| {
                if column.is_null(index) {
                    ""
                } else {
                    column.value(index)
                }
            }));
            writer
                .write_record(&row)
                .map_err(|e| StorageError::write(path, e))?;
        }

        let buf_writer = writer.into_inner().map_err(|e| {
            StorageError::write(path, format!("failed to flush CSV writer: {}", e.error()))
        })?;
        let temp_file = buf_writer.into_inner().map_err(|e| {
            StorageError::write(path, format!("failed to flush buffer: {}", e.error()))
        })?;
        temp_file
            .persist(path)
            .map_err(|e| StorageError::write(path, e.error))?;

        info!(path = %path.display(), rows = batch.num_rows(), "Wrote CSV export");
        Ok(batch.num_rows())
    }
}
