//! Core types and events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// One entity returned by the remote source
///
/// Field sets are not uniform across records; any field may be missing.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Records accumulated across pages, in fetch order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    /// Create an empty record set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page of records, keeping source order
    pub fn extend(&mut self, page: Vec<Record>) {
        self.records.extend(page);
    }

    /// Number of accumulated records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record has been accumulated
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Accumulated records in fetch order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Remove records whose value under `field` was already seen, keeping
    /// the first occurrence. Records without the field are always kept.
    ///
    /// Returns the number of records removed.
    pub fn dedup_by_field(&mut self, field: &str) -> usize {
        let before = self.records.len();
        let mut seen = HashSet::new();
        self.records.retain(|record| match record.get(field) {
            None | Some(serde_json::Value::Null) => true,
            Some(value) => seen.insert(value.to_string()),
        });
        before - self.records.len()
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

/// Why the acquisition loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The source returned an empty page
    Exhausted,
    /// The accumulated record count reached the configured ceiling
    CeilingReached,
    /// The configured maximum page count was requested without exhausting the source
    PageLimit,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Termination::Exhausted => "source exhausted",
            Termination::CeilingReached => "record ceiling reached",
            Termination::PageLimit => "page limit reached",
        };
        f.write_str(s)
    }
}

/// Summary of one acquisition loop
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    /// Number of page requests that returned successfully
    pub pages_fetched: u32,
    /// Records kept after optional deduplication
    pub records: usize,
    /// Records removed by deduplication
    pub duplicates_dropped: usize,
    /// Why the loop stopped
    pub termination: Termination,
}

/// Final state of a completed run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The table was checkpointed and the CSV export written
    Exported {
        /// Rows in the columnar checkpoint
        rows_stored: usize,
        /// Rows written to the CSV file
        rows_written: usize,
        /// Rows removed by the export filter
        rows_dropped: usize,
        /// Location of the CSV file
        csv_path: PathBuf,
    },
    /// The source yielded no records; nothing was written
    NoRecords,
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Exported { .. } => 0,
            RunOutcome::NoRecords => 3,
        }
    }
}

/// Report returned by a successful run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Acquisition summary, absent for export-only runs
    pub acquisition: Option<AcquisitionSummary>,
    /// Final state of the run
    pub outcome: RunOutcome,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A page was fetched and appended
    PageFetched {
        /// 1-based page number
        page: u32,
        /// Records on this page
        records: usize,
        /// Records accumulated so far
        total: usize,
    },

    /// The acquisition loop stopped
    AcquisitionFinished {
        /// Acquisition summary
        summary: AcquisitionSummary,
    },

    /// The projected table was checkpointed
    TableStored {
        /// Rows written
        rows: usize,
        /// Checkpoint location
        path: PathBuf,
    },

    /// The CSV export was written
    Exported {
        /// Rows written
        rows: usize,
        /// Rows removed by the export filter
        dropped: usize,
        /// CSV location
        path: PathBuf,
    },

    /// The run failed
    RunFailed {
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },
}
