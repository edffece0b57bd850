//! Test harness wiring both pagers to one in-memory log.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::metrics::PagerMetrics;
use crate::model::{PageSize, PageWindow, Partition, StartOffset, TopicPage};
use crate::pager::{PagerSettings, PartitionPager, TopicPager};

use super::memory_log::MemoryLog;

/// Test harness for integration testing.
pub struct PagerTestHarness {
    /// The log both pagers read from
    pub log: Arc<MemoryLog>,
    pub partition_pager: PartitionPager,
    pub topic_pager: TopicPager,
    /// Metrics shared by both pagers
    pub metrics: Arc<PagerMetrics>,
    pub settings: PagerSettings,
}

impl PagerTestHarness {
    /// Create a harness with default settings (page size 25).
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(PagerSettings::default())
    }

    /// Create a harness with custom settings.
    #[must_use]
    pub fn with_settings(settings: PagerSettings) -> Self {
        let log = Arc::new(MemoryLog::new());
        let metrics = Arc::new(PagerMetrics::new());
        let partition_pager =
            PartitionPager::new(log.clone(), settings).with_metrics(metrics.clone());
        let topic_pager = TopicPager::new(log.clone(), settings).with_metrics(metrics.clone());

        Self {
            log,
            partition_pager,
            topic_pager,
            metrics,
            settings,
        }
    }

    /// Create `topic` and fill partition `i` with `counts[i]` records.
    pub async fn seed_topic(&self, topic: &str, counts: &[usize]) {
        self.log.create_topic(topic, counts.len()).await;
        for (index, &count) in counts.iter().enumerate() {
            self.log
                .append_n(topic, Partition(index as i32), count)
                .await;
        }
    }

    /// Offset-linked page of one partition.
    pub async fn partition_page(
        &self,
        topic: &str,
        partition: Partition,
        start: StartOffset,
    ) -> Result<PageWindow> {
        self.partition_pager.page(topic, partition, start).await
    }

    /// Numbered page over `partitions`.
    pub async fn topic_page(
        &self,
        topic: &str,
        partitions: &[Partition],
        page: u32,
    ) -> Result<TopicPage> {
        self.topic_pager.topic_page(topic, partitions, page).await
    }

    /// Follow `next_offset` links from the newest page until they run out,
    /// returning every page visited.
    pub async fn walk_older(&self, topic: &str, partition: Partition) -> Result<Vec<PageWindow>> {
        let mut pages = Vec::new();
        let mut start = StartOffset::Latest;
        loop {
            let window = self.partition_page(topic, partition, start).await?;
            let next = window.next_offset;
            pages.push(window);
            match next {
                Some(offset) => start = StartOffset::At(offset),
                None => return Ok(pages),
            }
        }
    }
}

impl Default for PagerTestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test harness with specific configuration.
pub struct TestHarnessBuilder {
    settings: PagerSettings,
}

impl TestHarnessBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: PagerSettings::default(),
        }
    }

    /// Set the page size.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.settings.page_size = PageSize::new(size).expect("page size must be positive");
        self
    }

    /// Set the read fan-out width.
    #[must_use]
    pub fn max_concurrent_reads(mut self, width: usize) -> Self {
        self.settings.max_concurrent_reads = width;
        self
    }

    /// Set the per-page time budget.
    #[must_use]
    pub fn page_timeout(mut self, timeout: Duration) -> Self {
        self.settings.page_timeout = timeout;
        self
    }

    /// Build the test harness.
    #[must_use]
    pub fn build(self) -> PagerTestHarness {
        PagerTestHarness::with_settings(self.settings)
    }
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_defaults() {
        let harness = PagerTestHarness::new();
        assert_eq!(harness.settings.page_size.get(), 25);
        assert_eq!(harness.partition_pager.page_size().get(), 25);
    }

    #[test]
    fn test_harness_builder() {
        let harness = TestHarnessBuilder::new()
            .page_size(5)
            .max_concurrent_reads(2)
            .page_timeout(Duration::from_millis(50))
            .build();

        assert_eq!(harness.topic_pager.page_size().get(), 5);
        assert_eq!(harness.settings.max_concurrent_reads, 2);
        assert_eq!(harness.settings.page_timeout, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_walk_older_visits_every_offset() {
        let harness = TestHarnessBuilder::new().page_size(4).build();
        harness.seed_topic("events", &[10]).await;

        let pages = harness.walk_older("events", Partition(0)).await.unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages.last().and_then(|p| p.next_offset), None);

        // The oldest page is anchored at the low watermark and may overlap
        // the page before it.
        let offsets: std::collections::BTreeSet<i64> =
            pages.iter().flat_map(PageWindow::offsets).collect();
        assert_eq!(offsets, (0..10).collect());
    }
}
