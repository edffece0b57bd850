//! Page-by-page browsing of partitioned, compacted logs.
//!
//! Two pagers share the same building blocks:
//!
//! - [`PartitionPager`] walks a single partition using raw offsets as page
//!   links, recovering when the page's first offset has been removed.
//! - [`TopicPager`] merges several partitions into one virtual, newest-first
//!   sequence and serves it by page number, using [`SlotAllocator`] to decide
//!   which offsets of which partition land on the requested page.
//!
//! Both lay their reads out with [`gap_filler::fill`] so compacted offsets
//! show up as placeholders instead of shifting the page.

pub mod gap_filler;
mod partition;
mod slots;
mod topic;

pub use partition::PartitionPager;
pub use slots::{PageSlots, RankRange, SlotAllocator};
pub use topic::TopicPager;

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PaginationConfig;
use crate::error::{ConfigResult, PagerError, ReadError, ReadResult, Result};
use crate::metrics::PagerMetrics;
use crate::model::{Offset, PageSize, Partition, Record};
use crate::reader::{LogReader, OnMissingStart};

/// Tunables shared by both pagers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerSettings {
    /// Maximum entries per page.
    pub page_size: PageSize,
    /// Width of the per-partition read fan-out.
    pub max_concurrent_reads: usize,
    /// Budget for one whole page request.
    pub page_timeout: Duration,
}

impl PagerSettings {
    /// Build settings from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &PaginationConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            page_size: config.page_size()?,
            max_concurrent_reads: config.max_concurrent_reads,
            page_timeout: config.page_timeout(),
        })
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl Default for PagerSettings {
    fn default() -> Self {
        Self {
            page_size: PageSize::DEFAULT,
            max_concurrent_reads: 8,
            page_timeout: Duration::from_secs(15),
        }
    }
}

/// Run a page computation under the page budget and an optional cancellation token.
///
/// Dropping `fut` on timeout or cancellation drops every read still in
/// flight, so callers never see a partial page.
pub(crate) async fn run_bounded<T, F>(
    budget: Duration,
    token: Option<&CancellationToken>,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let timed = tokio::time::timeout(budget, fut);
    let outcome = match token {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("page request cancelled");
                    return Err(PagerError::Cancelled);
                }
                outcome = timed => outcome,
            }
        }
        None => timed.await,
    };

    outcome.map_err(|_| {
        warn!(budget_ms = budget.as_millis() as u64, "page request timed out");
        PagerError::Timeout(budget)
    })?
}

/// Issue one read, recording its latency and outcome.
pub(crate) async fn read_records(
    reader: &dyn LogReader,
    metrics: Option<&PagerMetrics>,
    topic: &str,
    partition: Partition,
    start: Offset,
    count: usize,
    on_missing: OnMissingStart,
) -> ReadResult<Vec<Record>> {
    let started = Instant::now();
    let result = reader
        .read(topic, partition, start, count, on_missing)
        .await;

    let fatal = matches!(&result, Err(err) if !matches!(err, ReadError::MissingStart { .. }));
    if let Some(metrics) = metrics {
        metrics.record_read(started.elapsed().as_secs_f64(), fatal);
    }

    match &result {
        Ok(records) => debug!(
            topic,
            %partition,
            %start,
            count,
            fetched = records.len(),
            "read records"
        ),
        Err(err) if fatal => warn!(topic, %partition, %start, count, error = %err, "read failed"),
        Err(_) => debug!(topic, %partition, %start, "start offset missing"),
    }

    result
}
