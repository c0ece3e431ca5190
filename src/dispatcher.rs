//! Batch dispatcher.
//!
//! Pages are buffered into a [`Batch`] of at most `batch_size` pages. A full
//! batch is submitted immediately; a partial one waits for [`Dispatcher::finish`]
//! at the end of the cycle. Delivery is best effort: a batch the sink keeps
//! refusing is dropped after the retry budget and the loss is counted.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;
use crate::sink::{AnalysisSink, BatchSubmission, PageSubmission};
use crate::ScrapedPage;

/// Ordered, size-bounded group of pages.
#[derive(Debug)]
pub struct Batch {
    pages: Vec<ScrapedPage>,
    max: usize,
}

impl Batch {
    /// Creates an empty batch holding at most `max` pages (at least one).
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            pages: Vec::with_capacity(max),
            max,
        }
    }

    /// Appends a page. Returns the page back if the batch is already full.
    pub fn push(&mut self, page: ScrapedPage) -> std::result::Result<(), ScrapedPage> {
        if self.is_full() {
            return Err(page);
        }
        self.pages.push(page);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pages.len() >= self.max
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn pages(&self) -> &[ScrapedPage] {
        &self.pages
    }

    /// Empties the batch, returning its pages.
    pub fn take(&mut self) -> Vec<ScrapedPage> {
        std::mem::replace(&mut self.pages, Vec::with_capacity(self.max))
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub batches_sent: usize,
    pub pages_sent: usize,
    pub batches_dropped: usize,
    pub pages_dropped: usize,
    pub relevant: usize,
}

impl DispatchStats {
    /// Adds `other` into `self`.
    pub fn merge(&mut self, other: DispatchStats) {
        self.batches_sent += other.batches_sent;
        self.pages_sent += other.pages_sent;
        self.batches_dropped += other.batches_dropped;
        self.pages_dropped += other.pages_dropped;
        self.relevant += other.relevant;
    }
}

/// Buffers pages and forwards them to the analysis sink.
pub struct Dispatcher {
    sink: Arc<dyn AnalysisSink>,
    batch: Batch,
    retry: RetryPolicy,
    search_strings: Option<Vec<String>>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn AnalysisSink>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            sink,
            batch: Batch::new(batch_size),
            retry,
            search_strings: None,
            stats: DispatchStats::default(),
        }
    }

    /// Sets the match strings attached to every following submission.
    pub fn set_search_strings(&mut self, search_strings: Option<Vec<String>>) {
        self.search_strings = search_strings;
    }

    /// Pages waiting for a flush.
    pub fn buffered(&self) -> usize {
        self.batch.len()
    }

    /// Counters since the last [`finish`](Self::finish).
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Adds a page, flushing when the batch becomes full.
    pub async fn offer(&mut self, page: ScrapedPage) {
        if let Err(page) = self.batch.push(page) {
            self.flush().await;
            // An empty batch always accepts.
            let _ = self.batch.push(page);
        }
        if self.batch.is_full() {
            self.flush().await;
        }
    }

    /// Submits the buffered pages, if any.
    pub async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let pages = self.batch.take();
        let submission = BatchSubmission {
            pages: pages.iter().map(PageSubmission::from).collect(),
            search_strings: self.search_strings.clone(),
        };
        let count = submission.pages.len();

        for attempt in 0..self.retry.attempts() {
            match self.sink.submit(&submission).await {
                Ok(ack) => {
                    info!(
                        "Batch of {} pages delivered ({}/{} relevant)",
                        count, ack.relevant_count, ack.total
                    );
                    self.stats.batches_sent += 1;
                    self.stats.pages_sent += count;
                    self.stats.relevant += ack.relevant_count;
                    return;
                }
                Err(err) if attempt + 1 < self.retry.attempts() => {
                    let delay = self.retry.delay_for(attempt);
                    debug!("Batch submission failed ({}), retrying in {:?}", err.class(), delay);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        "Dropping batch of {} pages after {} attempts: {}",
                        count,
                        attempt + 1,
                        err.class()
                    );
                }
            }
        }

        self.stats.batches_dropped += 1;
        self.stats.pages_dropped += count;
    }

    /// Flushes the partial batch and returns the counters of the cycle.
    pub async fn finish(&mut self) -> DispatchStats {
        self.flush().await;
        std::mem::take(&mut self.stats)
    }
}
