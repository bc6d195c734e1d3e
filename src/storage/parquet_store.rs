//! Parquet implementation of [`TableStore`]
//!
//! Layout of a location:
//!
//! ```text
//! <location>/
//!   part-00000.parquet
//!   part-00001.parquet
//!   _SUCCESS
//! ```
//!
//! Shards are written into a staging directory beside the location; the
//! staging directory replaces the location only after every shard and the
//! marker are on disk. The previous location is renamed aside first and put
//! back if the swap fails. Readers refuse locations without the marker.
//!
//! Whatever the location held before is removed, not only earlier shards.

use super::{StoredTable, TableStore};
use crate::error::{Result, StorageError};
use crate::table::Table;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the file that marks a complete checkpoint
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Sharded Parquet table store
#[derive(Clone, Debug)]
pub struct ParquetStore {
    rows_per_shard: usize,
}

impl ParquetStore {
    /// Store splitting tables into shards of at most `rows_per_shard` rows
    pub fn new(rows_per_shard: usize) -> Self {
        Self {
            rows_per_shard: rows_per_shard.max(1),
        }
    }

    fn shard_name(index: usize) -> String {
        format!("part-{:05}.parquet", index)
    }

    fn write_shard(&self, path: &Path, batch: &RecordBatch) -> Result<()> {
        let file = File::create(path).map_err(|e| StorageError::write(path, e))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .map_err(|e| StorageError::write(path, e))?;
        writer
            .write(batch)
            .map_err(|e| StorageError::write(path, e))?;
        writer.close().map_err(|e| StorageError::write(path, e))?;
        Ok(())
    }

    /// Move `staged` to `location`, keeping the previous contents of
    /// `location` aside until the move succeeded and restoring them if not
    fn swap_into_place(staged: &Path, location: &Path, parent: &Path) -> Result<()> {
        let retired = tempfile::Builder::new()
            .prefix(".retired-")
            .tempdir_in(parent)
            .map_err(|e| StorageError::write(location, e))?;
        let previous = retired.path().join("table");
        let replaced = location.exists();
        if replaced {
            std::fs::rename(location, &previous).map_err(|e| StorageError::write(location, e))?;
        }
        if let Err(e) = std::fs::rename(staged, location) {
            if replaced {
                if let Err(restore) = std::fs::rename(&previous, location) {
                    warn!(path = %location.display(), error = %restore, "Could not restore previous table");
                }
            }
            return Err(StorageError::write(location, e).into());
        }
        if let Err(e) = retired.close() {
            warn!(path = %location.display(), error = %e, "Could not remove previous table");
        }
        Ok(())
    }

    fn shard_paths(location: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(location).map_err(|e| StorageError::read(location, e))?;
        let mut shards = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StorageError::read(location, e))?.path();
            let is_shard = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("part-") && n.ends_with(".parquet"));
            if is_shard {
                shards.push(path);
            }
        }
        shards.sort();
        Ok(shards)
    }
}

impl Default for ParquetStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl TableStore for ParquetStore {
    fn write(&self, table: &Table, location: &Path) -> Result<StoredTable> {
        let parent = match location.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| StorageError::write(location, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&parent)
            .map_err(|e| StorageError::write(location, e))?;

        let batch = table.consolidate()?;
        let rows = batch.num_rows();
        let mut shards = 0;
        let mut offset = 0;
        // An empty table still gets one shard so its schema survives
        loop {
            let len = self.rows_per_shard.min(rows - offset);
            let shard_path = staging.path().join(Self::shard_name(shards));
            self.write_shard(&shard_path, &batch.slice(offset, len))?;
            debug!(shard = %shard_path.display(), rows = len, "Wrote shard");
            shards += 1;
            offset += len;
            if offset >= rows {
                break;
            }
        }

        File::create(staging.path().join(SUCCESS_MARKER))
            .map_err(|e| StorageError::write(location, e))?;

        Self::swap_into_place(staging.path(), location, &parent)?;

        info!(path = %location.display(), rows, shards, "Stored table");
        Ok(StoredTable {
            path: location.to_path_buf(),
            rows,
            shards,
        })
    }

    fn read(&self, location: &Path) -> Result<Table> {
        if !location.join(SUCCESS_MARKER).is_file() {
            return Err(StorageError::Incomplete {
                path: location.to_path_buf(),
            }
            .into());
        }

        let shards = Self::shard_paths(location)?;
        let mut schema = None;
        let mut batches = Vec::new();

        for shard in &shards {
            let file = File::open(shard).map_err(|e| StorageError::read(shard, e))?;
            let builder = ParquetRecordBatchReaderBuilder::try_new(file)
                .map_err(|e| StorageError::read(shard, e))?;
            let shard_schema = builder.schema().clone();
            match &schema {
                None => schema = Some(shard_schema),
                Some(expected) if expected.fields() != shard_schema.fields() => {
                    return Err(
                        StorageError::read(shard, "shard schema differs from first shard").into(),
                    );
                }
                Some(_) => {}
            }
            let reader = builder.build().map_err(|e| StorageError::read(shard, e))?;
            for batch in reader {
                batches.push(batch.map_err(|e| StorageError::read(shard, e))?);
            }
        }

        let schema = schema.ok_or_else(|| StorageError::Incomplete {
            path: location.to_path_buf(),
        })?;
        let table = Table::new(schema, batches)?;
        info!(
            path = %location.display(),
            rows = table.num_rows(),
            shards = shards.len(),
            "Loaded table"
        );
        Ok(table)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, StorageError};
    use crate::table::TableProjector;
    use crate::types::RecordSet;
    use serde_json::json;

    fn sample_table(rows: usize) -> Table {
        let records: Vec<_> = (0..rows)
            .map(|i| {
                let value = match i % 3 {
                    0 => json!({"name": format!("n{i}"), "titles": ["A", "B"]}),
                    1 => json!({"name": null, "titles": []}),
                    _ => json!({"name": format!("n{i}"), "culture": "Northmen"}),
                };
                value.as_object().cloned().unwrap()
            })
            .collect();
        TableProjector::new(vec!["name".into(), "culture".into(), "titles".into()])
            .with_sequence_columns(["titles".to_string()])
            .project(&RecordSet::from(records))
            .unwrap()
    }

    #[test]
    fn round_trip_preserves_rows_nulls_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("table");
        let table = sample_table(10);

        let stored = ParquetStore::new(100).write(&table, &location).unwrap();
        let loaded = ParquetStore::new(100).read(&location).unwrap();

        assert_eq!(stored.rows, 10);
        assert_eq!(stored.shards, 1);
        assert_eq!(loaded.num_rows(), 10);
        assert_eq!(loaded, table);
    }

    #[test]
    fn round_trip_is_independent_of_shard_count() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("table");
        let table = sample_table(25);

        let stored = ParquetStore::new(4).write(&table, &location).unwrap();
        assert_eq!(stored.shards, 7);

        let loaded = ParquetStore::default().read(&location).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn write_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("table");
        let store = ParquetStore::new(2);

        store.write(&sample_table(9), &location).unwrap();
        let smaller = sample_table(3);
        let stored = store.write(&smaller, &location).unwrap();

        assert_eq!(stored.shards, 2);
        assert_eq!(ParquetStore::shard_paths(&location).unwrap().len(), 2);
        assert_eq!(store.read(&location).unwrap(), smaller);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "staging directory left behind: {leftovers:?}");
    }

    #[test]
    fn failed_swap_restores_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("table");
        let store = ParquetStore::default();
        let previous = sample_table(4);
        store.write(&previous, &location).unwrap();

        let missing = dir.path().join("never-staged");
        let err = ParquetStore::swap_into_place(&missing, &location, dir.path()).unwrap_err();

        assert!(matches!(err, Error::Storage(StorageError::Write { .. })));
        assert_eq!(store.read(&location).unwrap(), previous);
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1, "retired directory left behind: {entries:?}");
    }

    #[test]
    fn empty_table_keeps_its_schema() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("table");
        let table = sample_table(3);
        let empty = Table::new(table.schema(), Vec::new()).unwrap();

        let stored = ParquetStore::default().write(&empty, &location).unwrap();
        let loaded = ParquetStore::default().read(&location).unwrap();

        assert_eq!(stored.shards, 1);
        assert_eq!(loaded.num_rows(), 0);
        assert_eq!(loaded.column_names(), vec!["name", "culture", "titles"]);
    }

    #[test]
    fn read_without_marker_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("table");
        ParquetStore::default()
            .write(&sample_table(3), &location)
            .unwrap();
        std::fs::remove_file(location.join(SUCCESS_MARKER)).unwrap();

        assert!(matches!(
            ParquetStore::default().read(&location),
            Err(Error::Storage(StorageError::Incomplete { .. }))
        ));
        assert!(matches!(
            ParquetStore::default().read(&dir.path().join("missing")),
            Err(Error::Storage(StorageError::Incomplete { .. }))
        ));
    }
}
