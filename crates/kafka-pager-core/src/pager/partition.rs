//! Offset-linked pages over a single partition.
//!
//! Pages are addressed by the offset they start at rather than by a page
//! number, so a link stays valid while new records are appended. Entries
//! come back newest first.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ReadError, Result};
use crate::metrics::PagerMetrics;
use crate::model::{Offset, PageSize, PageWindow, Partition, StartOffset};
use crate::reader::{LogReader, OnMissingStart};
use crate::watermarks::WatermarkOffsets;

use super::{gap_filler, read_records, run_bounded, PagerSettings};

/// Pager over one partition.
pub struct PartitionPager {
    reader: Arc<dyn LogReader>,
    settings: PagerSettings,
    metrics: Option<Arc<PagerMetrics>>,
}

impl PartitionPager {
    /// Create a pager reading through `reader`.
    #[must_use]
    pub fn new(reader: Arc<dyn LogReader>, settings: PagerSettings) -> Self {
        Self {
            reader,
            settings,
            metrics: None,
        }
    }

    /// Record page and read metrics into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<PagerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn page_size(&self) -> PageSize {
        self.settings.page_size
    }

    /// Look up the current watermarks and build the page starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::NotFound`](crate::error::PagerError::NotFound)
    /// for unknown partitions, [`PagerError::Timeout`](crate::error::PagerError::Timeout)
    /// when the page budget runs out, and propagates fatal read errors.
    pub async fn page(
        &self,
        topic: &str,
        partition: Partition,
        start: StartOffset,
    ) -> Result<PageWindow> {
        run_bounded(
            self.settings.page_timeout,
            None,
            self.find_and_page(topic, partition, start),
        )
        .await
    }

    /// Like [`page`](Self::page), but gives up as soon as `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::Cancelled`](crate::error::PagerError::Cancelled)
    /// on cancellation, otherwise the same errors as [`page`](Self::page).
    pub async fn page_cancellable(
        &self,
        topic: &str,
        partition: Partition,
        start: StartOffset,
        token: &CancellationToken,
    ) -> Result<PageWindow> {
        run_bounded(
            self.settings.page_timeout,
            Some(token),
            self.find_and_page(topic, partition, start),
        )
        .await
    }

    async fn find_and_page(
        &self,
        topic: &str,
        partition: Partition,
        start: StartOffset,
    ) -> Result<PageWindow> {
        let watermarks = WatermarkOffsets::find(self.reader.as_ref(), topic, partition).await?;
        self.offset_page(topic, start, watermarks).await
    }

    /// Build the page of `watermarks.partition` that starts at `start`.
    ///
    /// `previous_offset` links to the newer page and `next_offset` to the
    /// older one. When the page's first offset is no longer readable the
    /// read moves forward one offset at a time, at most once per offset on
    /// the page.
    ///
    /// # Errors
    ///
    /// Propagates every reader error except a missing start offset.
    #[instrument(
        skip(self, watermarks),
        fields(partition = %watermarks.partition, low = %watermarks.low, high = %watermarks.high)
    )]
    pub async fn offset_page(
        &self,
        topic: &str,
        start: StartOffset,
        watermarks: WatermarkOffsets,
    ) -> Result<PageWindow> {
        let partition = watermarks.partition;
        let page_size = self.settings.page_size.as_i64();
        let WatermarkOffsets { low, high, .. } = watermarks;

        let mut start = match start {
            StartOffset::Latest => high.back(page_size),
            StartOffset::At(offset) => offset,
        };

        if low == high {
            debug!("partition holds no records");
            return Ok(self.finish(PageWindow::empty()));
        }

        let (count, next_offset) = if start <= low {
            // Oldest page: nothing further back.
            let count = (page_size - (low.0 - start.0)).min(high.0 - low.0);
            start = low;
            (count, None)
        } else {
            let next = start.back(page_size).max(low);
            (page_size.min(high.0 - start.0), Some(next))
        };

        if count <= 0 {
            debug!(%start, "start offset outside the readable range");
            return Ok(self.finish(PageWindow::empty()));
        }

        for index in 0..count {
            let context_offset = start.forward(index);
            let context_count = (count - index) as usize;

            let read = read_records(
                self.reader.as_ref(),
                self.metrics.as_deref(),
                topic,
                partition,
                context_offset,
                context_count,
                OnMissingStart::Fail,
            )
            .await;

            match read {
                Ok(records) => {
                    let mut entries =
                        gap_filler::fill(records, partition, context_offset, context_count, high);
                    entries.reverse();

                    return Ok(self.finish(PageWindow {
                        previous_offset: previous_offset(start, count, low, high, page_size),
                        entries,
                        next_offset,
                    }));
                }
                Err(ReadError::MissingStart { .. }) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_start_offset_retry();
                    }
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        debug!(%start, count, "no readable start offset left on the page");
        Ok(self.finish(PageWindow::empty()))
    }

    fn finish(&self, window: PageWindow) -> PageWindow {
        if let Some(metrics) = &self.metrics {
            metrics.record_page("offset");
            metrics.record_placeholders(window.entries.iter().filter(|e| e.is_placeholder()).count());
        }
        window
    }
}

/// Start of the newer page, if any.
///
/// Pages near the head snap to `high - page_size` so the newest page is
/// always full; the result never drops below `low`.
fn previous_offset(
    start: Offset,
    count: i64,
    low: Offset,
    high: Offset,
    page_size: i64,
) -> Option<Offset> {
    let candidate = start.forward(count);
    if candidate >= high {
        None
    } else if candidate.0 + (page_size - 1) > high.0 {
        Some(high.back(page_size).max(low))
    } else {
        Some(candidate)
    }
}
