//! In-memory partitioned log for integration testing.
//!
//! Behaves like a compacted Kafka topic as far as the pagers can tell:
//! - Appends assign dense offsets per partition
//! - Compaction removes records without moving the watermarks
//! - Retention advances the low watermark
//! - Every read is recorded so tests can assert on read patterns

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::{ReadError, ReadResult};
use crate::model::{Offset, Partition, Record};
use crate::reader::{LogReader, OnMissingStart};

/// A recorded read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    pub topic: String,
    pub partition: Partition,
    pub start: Offset,
    pub count: usize,
    pub on_missing: OnMissingStart,
}

#[derive(Debug, Default)]
struct PartitionLog {
    low: i64,
    high: i64,
    records: BTreeMap<i64, Record>,
    failure: Option<ReadError>,
}

/// In-memory [`LogReader`].
#[derive(Debug, Default)]
pub struct MemoryLog {
    topics: RwLock<HashMap<String, Vec<PartitionLog>>>,
    call_log: RwLock<Vec<ReadCall>>,
    read_delay: RwLock<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `topic` with `partitions` empty partitions, replacing any
    /// existing topic of that name.
    pub async fn create_topic(&self, topic: &str, partitions: usize) {
        let logs = (0..partitions).map(|_| PartitionLog::default()).collect();
        self.topics.write().await.insert(topic.to_string(), logs);
    }

    /// Append a record with an optional key and payload.
    ///
    /// # Panics
    ///
    /// Panics if the partition does not exist.
    pub async fn append_record(
        &self,
        topic: &str,
        partition: Partition,
        key: Option<Bytes>,
        payload: Option<Bytes>,
    ) -> Offset {
        let mut topics = self.topics.write().await;
        let log = partition_mut(&mut topics, topic, partition);
        let offset = log.high;
        log.records.insert(
            offset,
            Record {
                partition,
                offset: Offset(offset),
                key,
                payload,
                timestamp_ms: Some(offset * 1_000),
            },
        );
        log.high += 1;
        Offset(offset)
    }

    /// Append a record with `payload`, returning its offset.
    pub async fn append(
        &self,
        topic: &str,
        partition: Partition,
        payload: impl Into<Bytes>,
    ) -> Offset {
        self.append_record(topic, partition, None, Some(payload.into()))
            .await
    }

    /// Append a record without a payload.
    pub async fn append_tombstone(&self, topic: &str, partition: Partition, key: impl Into<Bytes>) -> Offset {
        self.append_record(topic, partition, Some(key.into()), None)
            .await
    }

    /// Append `n` records with payloads `message-<offset>`.
    pub async fn append_n(&self, topic: &str, partition: Partition, n: usize) {
        let mut topics = self.topics.write().await;
        let log = partition_mut(&mut topics, topic, partition);
        for _ in 0..n {
            let offset = log.high;
            log.records.insert(
                offset,
                Record {
                    partition,
                    offset: Offset(offset),
                    key: None,
                    payload: Some(Bytes::from(format!("message-{offset}"))),
                    timestamp_ms: Some(offset * 1_000),
                },
            );
            log.high += 1;
        }
    }

    /// Remove individual offsets, as compaction would.
    pub async fn compact(
        &self,
        topic: &str,
        partition: Partition,
        offsets: impl IntoIterator<Item = i64>,
    ) {
        let mut topics = self.topics.write().await;
        let log = partition_mut(&mut topics, topic, partition);
        for offset in offsets {
            log.records.remove(&offset);
        }
    }

    /// Remove every offset in `range`.
    pub async fn compact_range(&self, topic: &str, partition: Partition, range: Range<i64>) {
        self.compact(topic, partition, range).await;
    }

    /// Drop everything below `offset` and move the low watermark up to it.
    pub async fn retain_from(&self, topic: &str, partition: Partition, offset: Offset) {
        let mut topics = self.topics.write().await;
        let log = partition_mut(&mut topics, topic, partition);
        let low = offset.0.clamp(log.low, log.high);
        log.records = log.records.split_off(&low);
        log.low = low;
    }

    /// Make every read of the partition fail with `error`.
    pub async fn fail_partition(&self, topic: &str, partition: Partition, error: ReadError) {
        let mut topics = self.topics.write().await;
        partition_mut(&mut topics, topic, partition).failure = Some(error);
    }

    /// Delay every read by `delay`.
    pub async fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.write().await = Some(delay);
    }

    /// All recorded reads, in call order.
    pub async fn read_calls(&self) -> Vec<ReadCall> {
        self.call_log.read().await.clone()
    }

    /// Recorded reads of one partition.
    pub async fn read_calls_for(&self, partition: Partition) -> Vec<ReadCall> {
        self.call_log
            .read()
            .await
            .iter()
            .filter(|call| call.partition == partition)
            .cloned()
            .collect()
    }

    pub async fn clear_read_calls(&self) {
        self.call_log.write().await.clear();
    }

    /// Highest number of reads that were in progress at the same time.
    #[must_use]
    pub fn max_concurrent_reads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn read_inner(
        &self,
        topic: &str,
        partition: Partition,
        start: Offset,
        count: usize,
        on_missing: OnMissingStart,
    ) -> ReadResult<Vec<Record>> {
        if let Some(delay) = *self.read_delay.read().await {
            tokio::time::sleep(delay).await;
        }

        let topics = self.topics.read().await;
        let log = partition_ref(&topics, topic, partition)?;
        if let Some(error) = &log.failure {
            return Err(error.clone());
        }

        let from = if start.0 < log.low || start.0 > log.high {
            match on_missing {
                OnMissingStart::Fail => {
                    return Err(ReadError::MissingStart {
                        topic: topic.to_string(),
                        partition,
                        offset: start,
                    })
                }
                OnMissingStart::Skip if start.0 > log.high => return Ok(Vec::new()),
                OnMissingStart::Skip => log.low,
            }
        } else {
            start.0
        };

        Ok(log
            .records
            .range(from..)
            .take(count)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl LogReader for MemoryLog {
    async fn partitions(&self, topic: &str) -> ReadResult<Vec<Partition>> {
        let topics = self.topics.read().await;
        let logs = topics.get(topic).ok_or_else(|| ReadError::UnknownPartition {
            topic: topic.to_string(),
            partition: Partition(-1),
        })?;
        Ok((0..logs.len()).map(|p| Partition(p as i32)).collect())
    }

    async fn watermarks(&self, topic: &str, partition: Partition) -> ReadResult<(Offset, Offset)> {
        let topics = self.topics.read().await;
        let log = partition_ref(&topics, topic, partition)?;
        Ok((Offset(log.low), Offset(log.high)))
    }

    async fn read(
        &self,
        topic: &str,
        partition: Partition,
        start: Offset,
        count: usize,
        on_missing: OnMissingStart,
    ) -> ReadResult<Vec<Record>> {
        self.call_log.write().await.push(ReadCall {
            topic: topic.to_string(),
            partition,
            start,
            count,
            on_missing,
        });

        let _in_flight = InFlightRead::enter(&self.in_flight, &self.max_in_flight);
        self.read_inner(topic, partition, start, count, on_missing)
            .await
    }
}

/// Counts a read as in flight until it finishes or its future is dropped.
struct InFlightRead<'a>(&'a AtomicUsize);

impl<'a> InFlightRead<'a> {
    fn enter(in_flight: &'a AtomicUsize, max_in_flight: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlightRead<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn partition_ref<'a>(
    topics: &'a HashMap<String, Vec<PartitionLog>>,
    topic: &str,
    partition: Partition,
) -> ReadResult<&'a PartitionLog> {
    usize::try_from(partition.0)
        .ok()
        .and_then(|index| topics.get(topic)?.get(index))
        .ok_or_else(|| ReadError::UnknownPartition {
            topic: topic.to_string(),
            partition,
        })
}

fn partition_mut<'a>(
    topics: &'a mut HashMap<String, Vec<PartitionLog>>,
    topic: &str,
    partition: Partition,
) -> &'a mut PartitionLog {
    usize::try_from(partition.0)
        .ok()
        .and_then(|index| topics.get_mut(topic)?.get_mut(index))
        .unwrap_or_else(|| panic!("unknown partition {topic}/{partition}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "events";

    async fn log_with(records: usize) -> MemoryLog {
        let log = MemoryLog::new();
        log.create_topic(TOPIC, 1).await;
        log.append_n(TOPIC, Partition(0), records).await;
        log
    }

    #[tokio::test]
    async fn test_compaction_keeps_watermarks() {
        let log = log_with(10).await;
        log.compact_range(TOPIC, Partition(0), 2..8).await;

        assert_eq!(
            log.watermarks(TOPIC, Partition(0)).await.unwrap(),
            (Offset(0), Offset(10))
        );
        let records = log
            .read(TOPIC, Partition(0), Offset(1), 3, OnMissingStart::Fail)
            .await
            .unwrap();
        let offsets: Vec<i64> = records.iter().map(|r| r.offset.0).collect();
        assert_eq!(offsets, vec![1, 8, 9]);
    }

    #[tokio::test]
    async fn test_abandoned_read_leaves_flight() {
        let log = log_with(10).await;
        log.set_read_delay(Duration::from_secs(5)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            log.read(TOPIC, Partition(0), Offset(0), 3, OnMissingStart::Fail),
        )
        .await;
        assert!(abandoned.is_err());

        log.set_read_delay(Duration::ZERO).await;
        log.read(TOPIC, Partition(0), Offset(0), 3, OnMissingStart::Fail)
            .await
            .unwrap();
        assert_eq!(log.max_concurrent_reads(), 1);
    }

    #[tokio::test]
    async fn test_missing_start_modes() {
        let log = log_with(10).await;
        log.retain_from(TOPIC, Partition(0), Offset(4)).await;

        let fail = log
            .read(TOPIC, Partition(0), Offset(2), 3, OnMissingStart::Fail)
            .await;
        assert!(matches!(fail, Err(ReadError::MissingStart { offset: Offset(2), .. })));

        let skip = log
            .read(TOPIC, Partition(0), Offset(2), 3, OnMissingStart::Skip)
            .await
            .unwrap();
        assert_eq!(skip.first().map(|r| r.offset), Some(Offset(4)));

        let past_head = log
            .read(TOPIC, Partition(0), Offset(11), 3, OnMissingStart::Skip)
            .await
            .unwrap();
        assert!(past_head.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_partition() {
        let log = log_with(1).await;
        let result = log.watermarks(TOPIC, Partition(1)).await;
        assert!(matches!(result, Err(ReadError::UnknownPartition { .. })));
        assert!(log.partitions("other").await.is_err());
    }

    #[tokio::test]
    async fn test_tombstones_occupy_offsets() {
        let log = MemoryLog::new();
        log.create_topic(TOPIC, 1).await;
        log.append(TOPIC, Partition(0), "a").await;
        let offset = log.append_tombstone(TOPIC, Partition(0), "key-a").await;
        assert_eq!(offset, Offset(1));

        let records = log
            .read(TOPIC, Partition(0), Offset(0), 5, OnMissingStart::Fail)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].is_tombstone());
    }

    #[tokio::test]
    async fn test_reads_are_recorded() {
        let log = log_with(5).await;
        log.read(TOPIC, Partition(0), Offset(1), 2, OnMissingStart::Skip)
            .await
            .unwrap();

        let calls = log.read_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].start, Offset(1));
        assert_eq!(calls[0].on_missing, OnMissingStart::Skip);
        assert_eq!(log.max_concurrent_reads(), 1);

        log.clear_read_calls().await;
        assert!(log.read_calls().await.is_empty());
    }
}
