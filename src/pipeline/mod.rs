//! End-to-end harvest run
//!
//! [`Pipeline`] owns the run configuration and its collaborators and drives
//! the stages in order:
//!
//! 1. [`Accumulator`] pulls pages from the [`PageSource`];
//! 2. [`TableProjector`] turns the records into a table;
//! 3. the [`TableStore`] checkpoints the table, which is then read back;
//! 4. [`flatten`] and [`ExportFilter`] prepare the export;
//! 5. [`CsvSink`] writes the single CSV file.
//!
//! Stages 3-5 run on a blocking worker thread. They never change row order.
//! The cancellation token is checked before each of them; a stage already
//! writing runs to completion.
//! [`Pipeline::export`] repeats stages 3 (read only) to 5 against an existing
//! checkpoint.

use crate::accumulator::Accumulator;
use crate::config::Config;
use crate::error::{Error, Result, ToExitCode};
use crate::sink::CsvSink;
use crate::source::{HttpPageSource, PageSource};
use crate::storage::{ParquetStore, TableStore};
use crate::table::{ExportFilter, Table, TableProjector, flatten};
use crate::types::{Event, RunOutcome, RunReport};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Capacity of the progress event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A configured harvest run (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    source: Arc<dyn PageSource>,
    store: Arc<dyn TableStore>,
    sink: CsvSink,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Pipeline with the HTTP source and the Parquet store
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration does not validate.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = Arc::new(HttpPageSource::new(&config.source)?);
        let store = Arc::new(ParquetStore::new(config.output.rows_per_shard));
        Self::with_components(config, source, store)
    }

    /// Pipeline with caller-provided collaborators
    pub fn with_components(
        config: Config,
        source: Arc<dyn PageSource>,
        store: Arc<dyn TableStore>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            source,
            store,
            sink: CsvSink::new(),
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Run configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that cancels the run when fired
    ///
    /// Acquisition aborts its in-flight request; later stages stop before
    /// the next one starts. A fired token also rejects [`Pipeline::export`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Acquire, checkpoint and export
    ///
    /// An empty source is not an error: the report carries
    /// [`RunOutcome::NoRecords`] and nothing is written.
    pub async fn run(&self) -> Result<RunReport> {
        let result = self.run_inner().await;
        self.report_failure(&result);
        result
    }

    /// Re-export from the existing checkpoint without contacting the source
    pub async fn export(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let result = self.spawn_export(None).await.map(|outcome| RunReport {
            acquisition: None,
            outcome,
            started_at,
            finished_at: Utc::now(),
        });
        self.report_failure(&result);
        result
    }

    async fn run_inner(&self) -> Result<RunReport> {
        let started_at = Utc::now();

        let accumulator = Accumulator::new(self.source.clone(), self.config.source.clone())
            .with_events(self.event_tx.clone())
            .with_cancellation(self.cancel.clone());
        let (records, summary) = accumulator.run().await?;

        let outcome = if records.is_empty() {
            info!("No records fetched; skipping checkpoint and export");
            RunOutcome::NoRecords
        } else {
            let table = TableProjector::from_config(&self.config.table).project(&records)?;
            drop(records);
            info!(
                rows = table.num_rows(),
                columns = table.column_names().len(),
                "Projected table"
            );
            self.spawn_export(Some(table)).await?
        };

        Ok(RunReport {
            acquisition: Some(summary),
            outcome,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Run the storage and export stages on a blocking thread
    async fn spawn_export(&self, table: Option<Table>) -> Result<RunOutcome> {
        self.check_cancelled()?;
        let stages = ExportStages {
            config: self.config.clone(),
            store: self.store.clone(),
            sink: self.sink.clone(),
            event_tx: self.event_tx.clone(),
            cancel: self.cancel.clone(),
        };
        tokio::task::spawn_blocking(move || {
            let rows_stored = match table {
                Some(table) => stages.checkpoint(&table)?,
                None => 0,
            };
            stages.export(rows_stored)
        })
        .await
        .map_err(|e| Error::Other(format!("export task failed: {}", e)))?
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn report_failure(&self, result: &Result<RunReport>) {
        if let Err(e) = result {
            error!(code = e.error_code(), error = %e, "Run failed");
            self.event_tx
                .send(Event::RunFailed {
                    code: e.error_code().to_string(),
                    error: e.to_string(),
                })
                .ok();
        }
    }
}

/// Everything the blocking stages need, owned
struct ExportStages {
    config: Arc<Config>,
    store: Arc<dyn TableStore>,
    sink: CsvSink,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl ExportStages {
    /// Stages run on a blocking thread, so the token is polled between steps
    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn checkpoint(&self, table: &Table) -> Result<usize> {
        let stored = self.store.write(table, &self.config.output.table_dir)?;
        self.event_tx
            .send(Event::TableStored {
                rows: stored.rows,
                path: stored.path.clone(),
            })
            .ok();
        Ok(stored.rows)
    }

    /// Read the checkpoint back and write the CSV file
    ///
    /// `rows_stored` is 0 when the checkpoint was written by an earlier run;
    /// the row count of the re-read table is reported instead.
    fn export(&self, rows_stored: usize) -> Result<RunOutcome> {
        self.check_cancelled()?;
        let table = self.store.read(&self.config.output.table_dir)?;
        if rows_stored > 0 && table.num_rows() != rows_stored {
            return Err(Error::Schema(format!(
                "checkpoint holds {} rows, {} were written",
                table.num_rows(),
                rows_stored
            )));
        }

        // Declared sequence columns plus any column the projector typed as a list
        let mut list_columns = self.config.table.sequence_columns.clone();
        for name in table.list_columns() {
            if !list_columns.contains(&name) {
                list_columns.push(name);
            }
        }
        let flat = flatten(&table, &list_columns)?;
        let export = ExportFilter::new(self.config.table.key_column.clone())
            .filter_and_consolidate(&flat)?;
        info!(
            kept = export.num_rows(),
            dropped = export.rows_dropped(),
            "Filtered rows with blank key"
        );

        self.check_cancelled()?;
        let csv_path = self.config.output.csv_path.clone();
        let rows_written = self.sink.write(&export, &csv_path)?;
        self.event_tx
            .send(Event::Exported {
                rows: rows_written,
                dropped: export.rows_dropped(),
                path: csv_path.clone(),
            })
            .ok();

        Ok(RunOutcome::Exported {
            rows_stored: table.num_rows(),
            rows_written,
            rows_dropped: export.rows_dropped(),
            csv_path,
        })
    }
}
