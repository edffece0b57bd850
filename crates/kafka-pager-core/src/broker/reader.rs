//! [`LogReader`] backed by a Kafka cluster.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::topic_partition_list::{Offset as KafkaOffset, TopicPartitionList};
use rdkafka::Message;
use tracing::{debug, instrument};

use crate::config::KafkaConfig;
use crate::error::{ReadError, ReadResult};
use crate::model::{Offset, Partition, Record};
use crate::reader::{LogReader, OnMissingStart};

use super::pool::ConsumerPool;
use super::{map_kafka_error, ErrorContext};

/// Longest single `poll` while reading a range, so an abandoned read stops
/// promptly.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Raises the abort flag of a blocking read when its future is dropped.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Reads watermarks and records through pooled librdkafka consumers.
///
/// librdkafka calls block, so each one runs on the blocking thread pool
/// with a consumer checked out for the duration of the call.
pub struct KafkaLogReader {
    pool: Arc<ConsumerPool>,
    request_timeout: Duration,
}

impl KafkaLogReader {
    /// Create a reader for the cluster in `config`.
    ///
    /// `max_idle` bounds the consumers kept between reads; it is usually the
    /// pagers' `max_concurrent_reads`.
    #[must_use]
    pub fn new(config: &KafkaConfig, max_idle: usize) -> Self {
        Self {
            pool: Arc::new(ConsumerPool::new(config, max_idle)),
            request_timeout: config.request_timeout(),
        }
    }

    /// Run `f` with a pooled consumer on the blocking thread pool.
    ///
    /// `f` receives a flag that is raised when the caller stops waiting, for
    /// example on a page timeout or cancellation.
    async fn with_consumer<T, F>(&self, f: F) -> ReadResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&BaseConsumer, &AtomicBool) -> ReadResult<T> + Send + 'static,
    {
        let consumer = self.pool.checkout().await?;
        let aborted = Arc::new(AtomicBool::new(false));
        let _abort = AbortOnDrop(aborted.clone());
        let (consumer, result) = tokio::task::spawn_blocking(move || {
            let result = f(&consumer, &aborted);
            (consumer, result)
        })
        .await
        .map_err(|e| ReadError::Broker(format!("blocking read task failed: {e}")))?;

        self.pool.checkin(consumer).await;
        result
    }
}

#[async_trait]
impl LogReader for KafkaLogReader {
    async fn partitions(&self, topic: &str) -> ReadResult<Vec<Partition>> {
        let topic = topic.to_string();
        let timeout = self.request_timeout;

        self.with_consumer(move |consumer, _| {
            let context = ErrorContext::topic(&topic);
            let metadata = consumer
                .fetch_metadata(Some(&topic), timeout)
                .map_err(|e| map_kafka_error(e, &context))?;

            let Some(found) = metadata.topics().iter().find(|t| t.name() == topic) else {
                return Err(context.unknown());
            };
            if found.error().is_some() || found.partitions().is_empty() {
                return Err(context.unknown());
            }

            let mut partitions: Vec<Partition> =
                found.partitions().iter().map(|p| Partition(p.id())).collect();
            partitions.sort_unstable();
            Ok(partitions)
        })
        .await
    }

    async fn watermarks(&self, topic: &str, partition: Partition) -> ReadResult<(Offset, Offset)> {
        let topic = topic.to_string();
        let timeout = self.request_timeout;

        self.with_consumer(move |consumer, _| fetch_watermarks(consumer, &topic, partition, timeout))
            .await
    }

    #[instrument(skip(self), fields(start = %start))]
    async fn read(
        &self,
        topic: &str,
        partition: Partition,
        start: Offset,
        count: usize,
        on_missing: OnMissingStart,
    ) -> ReadResult<Vec<Record>> {
        let topic = topic.to_string();
        let timeout = self.request_timeout;

        self.with_consumer(move |consumer, aborted| {
            let request = RangeRequest {
                topic: &topic,
                partition,
                start,
                count,
                deadline: Instant::now() + timeout,
                aborted,
            };
            read_blocking(consumer, &request, on_missing, timeout)
        })
        .await
    }
}

fn fetch_watermarks(
    consumer: &BaseConsumer,
    topic: &str,
    partition: Partition,
    timeout: Duration,
) -> ReadResult<(Offset, Offset)> {
    let (low, high) = consumer
        .fetch_watermarks(topic, partition.0, timeout)
        .map_err(|e| map_kafka_error(e, &ErrorContext::partition(topic, partition)))?;
    Ok((Offset(low), Offset(high)))
}

/// One blocking range read.
struct RangeRequest<'a> {
    topic: &'a str,
    partition: Partition,
    start: Offset,
    count: usize,
    deadline: Instant,
    aborted: &'a AtomicBool,
}

fn read_blocking(
    consumer: &BaseConsumer,
    request: &RangeRequest<'_>,
    on_missing: OnMissingStart,
    timeout: Duration,
) -> ReadResult<Vec<Record>> {
    let RangeRequest {
        topic,
        partition,
        start,
        count,
        ..
    } = *request;
    let context = ErrorContext::partition(topic, partition).at(start);

    // A skipping read that loses a race with retention looks the low
    // watermark up again, once.
    let mut attempts = match on_missing {
        OnMissingStart::Fail => 1,
        OnMissingStart::Skip => 2,
    };

    loop {
        attempts -= 1;
        let (low, high) = fetch_watermarks(consumer, topic, partition, timeout)?;

        let from = if start < low || start > high {
            match on_missing {
                OnMissingStart::Fail => return Err(context.missing_start()),
                OnMissingStart::Skip if start > high => return Ok(Vec::new()),
                OnMissingStart::Skip => low,
            }
        } else {
            start
        };

        if count == 0 || from >= high {
            return Ok(Vec::new());
        }

        match poll_range(consumer, request, from, high) {
            Err(ReadError::MissingStart { .. }) if attempts > 0 => {
                debug!(topic, %partition, %from, "start offset aged out, retrying from low watermark");
            }
            Err(ReadError::MissingStart { .. }) => return Err(context.missing_start()),
            other => return other,
        }
    }
}

/// What the range read does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollStep {
    /// Poll again, waiting at most this long.
    Poll(Duration),
    /// Every requested record is in hand.
    Complete,
    /// The deadline passed with records still outstanding.
    TimedOut,
    /// Nobody is waiting for the result any more.
    Aborted,
}

fn next_poll_step(collected: usize, count: usize, remaining: Duration, aborted: bool) -> PollStep {
    if aborted {
        PollStep::Aborted
    } else if collected >= count {
        PollStep::Complete
    } else if remaining.is_zero() {
        PollStep::TimedOut
    } else {
        PollStep::Poll(remaining.min(POLL_SLICE))
    }
}

/// Poll records in `[from, high)` until `count` are collected, the high
/// watermark is reached or the partition end is seen.
///
/// Running out of time first is an error: the records not yet delivered
/// exist and must not be reported as missing.
fn poll_range(
    consumer: &BaseConsumer,
    request: &RangeRequest<'_>,
    from: Offset,
    high: Offset,
) -> ReadResult<Vec<Record>> {
    let RangeRequest {
        topic,
        partition,
        count,
        deadline,
        aborted,
        ..
    } = *request;
    let context = ErrorContext::partition(topic, partition).at(from);

    let mut tpl = TopicPartitionList::new();
    tpl.add_partition_offset(topic, partition.0, KafkaOffset::Offset(from.0))
        .map_err(|e| map_kafka_error(e, &context))?;
    consumer
        .assign(&tpl)
        .map_err(|e| map_kafka_error(e, &context))?;

    let mut records = Vec::with_capacity(count);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = match next_poll_step(
            records.len(),
            count,
            remaining,
            aborted.load(Ordering::Relaxed),
        ) {
            PollStep::Poll(wait) => wait,
            PollStep::Complete => break,
            PollStep::TimedOut => {
                debug!(topic, %partition, fetched = records.len(), "read deadline reached");
                return Err(ReadError::Broker(format!(
                    "read of {topic}/{partition} timed out after {} of {count} records",
                    records.len()
                )));
            }
            PollStep::Aborted => {
                return Err(ReadError::Broker(format!("read of {topic}/{partition} abandoned")));
            }
        };

        match consumer.poll(wait) {
            Some(Ok(message)) => {
                if message.topic() != topic || message.partition() != partition.0 {
                    continue;
                }
                let offset = Offset(message.offset());
                if offset < from {
                    continue;
                }
                records.push(Record {
                    partition,
                    offset,
                    key: message.key().map(Bytes::copy_from_slice),
                    payload: message.payload().map(Bytes::copy_from_slice),
                    timestamp_ms: message.timestamp().to_millis(),
                });
                if offset.forward(1) >= high {
                    break;
                }
            }
            Some(Err(KafkaError::PartitionEOF(_))) => break,
            Some(Err(e)) => return Err(map_kafka_error(e, &context)),
            None => {}
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_continues_in_short_slices() {
        assert_eq!(
            next_poll_step(3, 25, Duration::from_secs(5), false),
            PollStep::Poll(POLL_SLICE)
        );
        assert_eq!(
            next_poll_step(3, 25, Duration::from_millis(40), false),
            PollStep::Poll(Duration::from_millis(40))
        );
    }

    #[test]
    fn test_deadline_with_records_outstanding_times_out() {
        // A stalled broker after 5 of 25 records must not look like compaction.
        assert_eq!(
            next_poll_step(5, 25, Duration::ZERO, false),
            PollStep::TimedOut
        );
        assert_eq!(next_poll_step(0, 25, Duration::ZERO, false), PollStep::TimedOut);
    }

    #[test]
    fn test_full_read_completes_even_at_deadline() {
        assert_eq!(next_poll_step(25, 25, Duration::ZERO, false), PollStep::Complete);
        assert_eq!(
            next_poll_step(25, 25, Duration::from_secs(1), false),
            PollStep::Complete
        );
    }

    #[test]
    fn test_abandoned_read_stops() {
        assert_eq!(
            next_poll_step(3, 25, Duration::from_secs(5), true),
            PollStep::Aborted
        );
        assert_eq!(next_poll_step(25, 25, Duration::ZERO, true), PollStep::Aborted);
    }

    #[test]
    fn test_abort_flag_raised_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = AbortOnDrop(flag.clone());
        assert!(!flag.load(Ordering::Relaxed));
        drop(guard);
        assert!(flag.load(Ordering::Relaxed));
    }
}
