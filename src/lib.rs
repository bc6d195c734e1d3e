//! # api-harvest
//!
//! Pulls a paginated JSON collection from a REST endpoint, checkpoints it as
//! a Parquet table and exports a flattened, filtered, single-file CSV.
//!
//! ## Stages
//!
//! - **Acquisition** - pages are requested one at a time until the source
//!   returns an empty page, the record ceiling is reached or the page limit
//!   is hit ([`accumulator`])
//! - **Projection** - records are projected onto a declared column list as
//!   Arrow record batches ([`table::projector`])
//! - **Checkpoint** - the table is written to and re-read from a sharded
//!   Parquet directory ([`storage`])
//! - **Export** - list columns are joined into text, rows with a blank key
//!   are dropped and the result is written as one CSV file ([`table`],
//!   [`sink`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use api_harvest::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.source.max_records = 200;
//!
//!     let pipeline = Pipeline::new(config)?;
//!
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = pipeline.run().await?;
//!     println!("{:?}", report.outcome);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Paginated acquisition loop
pub mod accumulator;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// End-to-end run orchestration
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// CSV export sink
pub mod sink;
/// Remote page sources
pub mod source;
/// Durable columnar checkpoint
pub mod storage;
/// Columnar tables and their transforms
pub mod table;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use accumulator::Accumulator;
pub use config::{Config, OutputConfig, RetryConfig, SourceConfig, TableConfig};
pub use error::{Error, Result, SourceError, StorageError, ToExitCode};
pub use pipeline::Pipeline;
pub use sink::CsvSink;
pub use source::{HttpPageSource, PageSource};
pub use storage::{ParquetStore, StoredTable, TableStore};
pub use table::{ColumnKind, ExportFilter, ExportTable, Table, TableProjector, flatten};
pub use types::{
    AcquisitionSummary, Event, Record, RecordSet, RunOutcome, RunReport, Termination,
};
