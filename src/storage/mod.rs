//! Durable columnar checkpoint
//!
//! The projected table is written to a [`TableStore`] and read back before
//! export, so a failure in the export steps can be recovered by re-reading the
//! already-written location.

mod parquet_store;

pub use parquet_store::{ParquetStore, SUCCESS_MARKER};

use crate::error::Result;
use crate::table::Table;
use std::path::{Path, PathBuf};

/// Receipt for a completed checkpoint write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredTable {
    /// Location that now holds the table
    pub path: PathBuf,
    /// Rows written
    pub rows: usize,
    /// Physical units written
    pub shards: usize,
}

/// Trait for durable table storage
///
/// `write` replaces whatever `location` held before; `read` must return a
/// table equal to the last one written, whatever its physical layout.
pub trait TableStore: Send + Sync {
    /// Replace the contents of `location` with `table`
    fn write(&self, table: &Table, location: &Path) -> Result<StoredTable>;

    /// Load the table stored at `location`
    fn read(&self, location: &Path) -> Result<Table>;
}
