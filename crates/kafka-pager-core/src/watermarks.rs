//! Low/high watermark offsets of a partition.

use serde::Serialize;

use crate::error::{PagerError, Result};
use crate::model::{Offset, Partition};
use crate::reader::LogReader;

/// `(low, high)` offsets of one partition.
///
/// `low` is the oldest retained offset and `high` the next offset to be
/// written. `low == high` means there is nothing to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatermarkOffsets {
    pub partition: Partition,
    pub low: Offset,
    pub high: Offset,
}

impl WatermarkOffsets {
    /// Create watermarks, enforcing `low <= high`.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::InvalidWatermarks`] if `low > high`.
    pub fn new(partition: Partition, low: Offset, high: Offset) -> Result<Self> {
        if low > high {
            return Err(PagerError::InvalidWatermarks {
                partition,
                low,
                high,
            });
        }
        Ok(Self {
            partition,
            low,
            high,
        })
    }

    /// Ask the reader for the current watermarks.
    ///
    /// Never cached: watermarks move between requests, so callers look them
    /// up once per page.
    ///
    /// # Errors
    ///
    /// Propagates reader failures; an unknown partition becomes
    /// [`PagerError::NotFound`].
    pub async fn find(reader: &dyn LogReader, topic: &str, partition: Partition) -> Result<Self> {
        let (low, high) = reader.watermarks(topic, partition).await?;
        Self::new(partition, low, high)
    }

    /// The partition was never written to.
    #[must_use]
    pub fn empty(&self) -> bool {
        self.low == Offset(0) && self.high == Offset(0)
    }

    /// The partition held data once but all of it has aged out.
    #[must_use]
    pub fn cleaned(&self) -> bool {
        self.low == self.high && !self.empty()
    }

    /// Nothing is currently retrievable.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.low == self.high
    }

    /// Number of offsets in `[low, high)`, including compacted ones.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.low.distance_to(self.high)
    }

    /// Whether `offset` lies in `[low, high)`.
    #[must_use]
    pub fn contains(&self, offset: Offset) -> bool {
        offset >= self.low && offset < self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryLog;

    fn wm(low: i64, high: i64) -> WatermarkOffsets {
        WatermarkOffsets::new(Partition(0), Offset(low), Offset(high)).unwrap()
    }

    #[test]
    fn test_empty_and_cleaned() {
        assert!(wm(0, 0).empty());
        assert!(!wm(0, 0).cleaned());

        assert!(!wm(10, 10).empty());
        assert!(wm(10, 10).cleaned());

        assert!(!wm(0, 5).empty());
        assert!(!wm(0, 5).cleaned());
    }

    #[test]
    fn test_count_and_contains() {
        let w = wm(10, 35);
        assert_eq!(w.count(), 25);
        assert!(w.contains(Offset(10)));
        assert!(w.contains(Offset(34)));
        assert!(!w.contains(Offset(35)));
        assert!(!w.contains(Offset(9)));
    }

    #[test]
    fn test_low_above_high_rejected() {
        let result = WatermarkOffsets::new(Partition(2), Offset(10), Offset(5));
        assert!(matches!(
            result,
            Err(PagerError::InvalidWatermarks { partition: Partition(2), .. })
        ));
    }

    #[tokio::test]
    async fn test_find_reads_current_watermarks() {
        let log = MemoryLog::new();
        log.create_topic("events", 2).await;
        log.append_n("events", Partition(1), 12).await;
        log.retain_from("events", Partition(1), Offset(4)).await;

        let w = WatermarkOffsets::find(&log, "events", Partition(1)).await.unwrap();
        assert_eq!((w.low, w.high), (Offset(4), Offset(12)));

        log.append_n("events", Partition(1), 3).await;
        let w = WatermarkOffsets::find(&log, "events", Partition(1)).await.unwrap();
        assert_eq!(w.high, Offset(15));
    }

    #[tokio::test]
    async fn test_find_unknown_partition() {
        let log = MemoryLog::new();
        log.create_topic("events", 1).await;

        let result = WatermarkOffsets::find(&log, "events", Partition(5)).await;
        assert!(matches!(result, Err(PagerError::NotFound { .. })));
    }
}
