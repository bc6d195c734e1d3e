//! Paginated acquisition loop
//!
//! The accumulator requests pages strictly one after another, starting at
//! page 1. After every fetch it applies the termination policy in this order:
//!
//! 1. an empty page stops the loop (source exhausted);
//! 2. the page is appended to the record set;
//! 3. once the record count reaches `max_records` the loop stops. The check
//!    runs after a whole page was appended, so the final count may exceed the
//!    ceiling by up to `page_size - 1`;
//! 4. otherwise the next page is requested.
//!
//! `max_pages` bounds the number of requests for sources that never run dry,
//! and a [`CancellationToken`] aborts an in-flight request.

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::source::PageSource;
use crate::types::{AcquisitionSummary, Event, RecordSet, Termination};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives a [`PageSource`] until a termination condition holds
pub struct Accumulator {
    source: Arc<dyn PageSource>,
    config: SourceConfig,
    event_tx: Option<broadcast::Sender<Event>>,
    cancel: CancellationToken,
}

impl Accumulator {
    /// Create an accumulator over `source`
    pub fn new(source: Arc<dyn PageSource>, config: SourceConfig) -> Self {
        Self {
            source,
            config,
            event_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Publish a [`Event::PageFetched`] for every appended page
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Abort the loop when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the acquisition loop
    ///
    /// # Errors
    /// Returns [`Error::Source`] once a request fails permanently or exhausts
    /// its retries, and [`Error::Cancelled`] if the token fires first.
    pub async fn run(&self) -> Result<(RecordSet, AcquisitionSummary)> {
        let page_size = self.config.page_size;
        let mut records = RecordSet::new();
        let mut page: u32 = 1;
        let mut pages_fetched: u32 = 0;

        info!(
            url = %self.config.base_url,
            page_size,
            max_records = self.config.max_records,
            "Starting acquisition"
        );

        let termination = loop {
            if self
                .config
                .max_pages
                .is_some_and(|max_pages| pages_fetched >= max_pages)
            {
                warn!(
                    pages_fetched,
                    total = records.len(),
                    "Page limit reached before the source was exhausted"
                );
                break Termination::PageLimit;
            }

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                result = fetch_with_retry(&self.config.retry, || self.source.fetch(page, page_size)) => result?,
            };
            pages_fetched += 1;

            if fetched.is_empty() {
                info!(page, "No more records to fetch");
                break Termination::Exhausted;
            }

            let page_len = fetched.len();
            records.extend(fetched);
            info!(page, records = page_len, total = records.len(), "Fetched page");
            self.emit(Event::PageFetched {
                page,
                records: page_len,
                total: records.len(),
            });

            if records.len() >= self.config.max_records {
                info!(total = records.len(), "Reached max record limit");
                break Termination::CeilingReached;
            }

            page += 1;
        };

        let duplicates_dropped = match &self.config.dedup_key {
            Some(field) => {
                let dropped = records.dedup_by_field(field);
                if dropped > 0 {
                    warn!(field = %field, dropped, "Dropped duplicate records");
                }
                dropped
            }
            None => 0,
        };

        let summary = AcquisitionSummary {
            pages_fetched,
            records: records.len(),
            duplicates_dropped,
            termination,
        };
        info!(
            pages = summary.pages_fetched,
            records = summary.records,
            reason = %summary.termination,
            "Acquisition finished"
        );
        self.emit(Event::AcquisitionFinished {
            summary: summary.clone(),
        });

        Ok((records, summary))
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            // No subscribers is not an error
            tx.send(event).ok();
        }
    }
}
