//! Numbered pages over several partitions merged into one sequence.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{PagerError, Result};
use crate::metrics::PagerMetrics;
use crate::model::{Entry, PageSize, Partition, TopicPage};
use crate::reader::{LogReader, OnMissingStart};
use crate::watermarks::WatermarkOffsets;

use super::slots::SlotAllocator;
use super::{gap_filler, read_records, run_bounded, PagerSettings};

/// Pager presenting a set of partitions as one newest-first sequence.
///
/// Watermark lookups and per-partition reads are independent, so they fan
/// out with at most `max_concurrent_reads` in flight. A page is all or
/// nothing: the first failure fails the whole page.
pub struct TopicPager {
    reader: Arc<dyn LogReader>,
    settings: PagerSettings,
    allocator: SlotAllocator,
    metrics: Option<Arc<PagerMetrics>>,
}

impl TopicPager {
    /// Create a pager reading through `reader`.
    #[must_use]
    pub fn new(reader: Arc<dyn LogReader>, settings: PagerSettings) -> Self {
        Self {
            reader,
            allocator: SlotAllocator::new(settings.page_size),
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

    /// Page `page` (1-based) of `partitions` of `topic`, merged.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::InvalidPage`] for page 0,
    /// [`PagerError::NotFound`] for unknown partitions,
    /// [`PagerError::Timeout`] when the page budget runs out, and propagates
    /// fatal read errors.
    pub async fn topic_page(
        &self,
        topic: &str,
        partitions: &[Partition],
        page: u32,
    ) -> Result<TopicPage> {
        run_bounded(
            self.settings.page_timeout,
            None,
            self.build_page(topic, partitions, page),
        )
        .await
    }

    /// Like [`topic_page`](Self::topic_page), but gives up as soon as `token`
    /// is cancelled, dropping all in-flight reads.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::Cancelled`] on cancellation, otherwise the same
    /// errors as [`topic_page`](Self::topic_page).
    pub async fn topic_page_cancellable(
        &self,
        topic: &str,
        partitions: &[Partition],
        page: u32,
        token: &CancellationToken,
    ) -> Result<TopicPage> {
        run_bounded(
            self.settings.page_timeout,
            Some(token),
            self.build_page(topic, partitions, page),
        )
        .await
    }

    /// Page `page` over every partition of `topic`.
    ///
    /// # Errors
    ///
    /// Same as [`topic_page`](Self::topic_page).
    pub async fn all_partitions_page(&self, topic: &str, page: u32) -> Result<TopicPage> {
        run_bounded(
            self.settings.page_timeout,
            None,
            self.build_all_partitions_page(topic, page),
        )
        .await
    }

    /// Like [`all_partitions_page`](Self::all_partitions_page), but gives up
    /// as soon as `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::Cancelled`] on cancellation, otherwise the same
    /// errors as [`topic_page`](Self::topic_page).
    pub async fn all_partitions_page_cancellable(
        &self,
        topic: &str,
        page: u32,
        token: &CancellationToken,
    ) -> Result<TopicPage> {
        run_bounded(
            self.settings.page_timeout,
            Some(token),
            self.build_all_partitions_page(topic, page),
        )
        .await
    }

    async fn build_all_partitions_page(&self, topic: &str, page: u32) -> Result<TopicPage> {
        let partitions = self.reader.partitions(topic).await?;
        self.build_page(topic, &partitions, page).await
    }

    #[instrument(skip(self, partitions), fields(partitions = partitions.len()))]
    async fn build_page(
        &self,
        topic: &str,
        partitions: &[Partition],
        page: u32,
    ) -> Result<TopicPage> {
        if page == 0 {
            return Err(PagerError::InvalidPage(page));
        }

        let mut partitions = partitions.to_vec();
        partitions.sort_unstable();
        partitions.dedup();

        let watermarks: Vec<WatermarkOffsets> = stream::iter(partitions)
            .map(|partition| WatermarkOffsets::find(self.reader.as_ref(), topic, partition))
            .buffered(self.settings.max_concurrent_reads)
            .try_collect()
            .await?;

        let counts: Vec<(Partition, u64)> =
            watermarks.iter().map(|w| (w.partition, w.count())).collect();
        let slots = self.allocator.allocate(&counts, page);
        let has_next_page = !self
            .allocator
            .allocate(&counts, page.saturating_add(1))
            .is_empty();

        debug!(
            slots = slots.slot_count(),
            partitions_on_page = slots.ranges.len(),
            has_next_page,
            "allocated page slots"
        );

        let by_partition: HashMap<Partition, WatermarkOffsets> =
            watermarks.into_iter().map(|w| (w.partition, w)).collect();
        let requests: Vec<(WatermarkOffsets, Range<u64>)> = slots
            .ranges
            .into_iter()
            .filter_map(|range| {
                by_partition
                    .get(&range.partition)
                    .map(|w| (*w, range.ranks))
            })
            .collect();

        let slices: Vec<Vec<Entry>> = stream::iter(requests)
            .map(|(watermarks, ranks)| self.partition_slice(topic, watermarks, ranks))
            .buffered(self.settings.max_concurrent_reads)
            .try_collect()
            .await?;

        let entries: Vec<Entry> = slices.into_iter().flatten().collect();

        if let Some(metrics) = &self.metrics {
            metrics.record_page("topic");
            metrics.record_placeholders(entries.iter().filter(|e| e.is_placeholder()).count());
        }

        Ok(TopicPage {
            entries,
            has_next_page,
        })
    }

    /// Entries of one partition for the given age ranks, newest first.
    ///
    /// Ranks count back from the high watermark, so ranks `[s, e)` cover
    /// offsets `[high - e, high - s)`.
    async fn partition_slice(
        &self,
        topic: &str,
        watermarks: WatermarkOffsets,
        ranks: Range<u64>,
    ) -> Result<Vec<Entry>> {
        let partition = watermarks.partition;
        let start = watermarks.high.back(ranks.end as i64);
        let count = (ranks.end - ranks.start) as usize;

        let records = read_records(
            self.reader.as_ref(),
            self.metrics.as_deref(),
            topic,
            partition,
            start,
            count,
            OnMissingStart::Skip,
        )
        .await?;

        let mut entries = gap_filler::fill(records, partition, start, count, watermarks.high);
        entries.reverse();
        Ok(entries)
    }
}
