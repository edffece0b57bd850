//! The seam between the pagers and the broker.
//!
//! The pagers never talk to Kafka directly. They ask a [`LogReader`] for
//! watermarks and for short runs of records, which keeps the pagination math
//! testable against an in-memory log and lets the real client live behind
//! the `kafka` feature.

use async_trait::async_trait;

use crate::error::ReadResult;
use crate::model::{Offset, Partition, Record};

/// What a read should do when its start offset is not readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissingStart {
    /// Return [`ReadError::MissingStart`](crate::error::ReadError::MissingStart).
    Fail,
    /// Start at the first readable offset instead.
    Skip,
}

/// Read access to a partitioned, append-only log.
#[async_trait]
pub trait LogReader: Send + Sync {
    /// Partition ids of `topic`, ascending.
    async fn partitions(&self, topic: &str) -> ReadResult<Vec<Partition>>;

    /// Low and high watermark offsets of one partition.
    ///
    /// `low` is the oldest retained offset, `high` is one past the newest.
    async fn watermarks(&self, topic: &str, partition: Partition) -> ReadResult<(Offset, Offset)>;

    /// Read up to `count` records at offsets `>= start`, ascending.
    ///
    /// Compacted offsets are simply absent from the result, so the returned
    /// records may reach past `start + count`.
    async fn read(
        &self,
        topic: &str,
        partition: Partition,
        start: Offset,
        count: usize,
        on_missing: OnMissingStart,
    ) -> ReadResult<Vec<Record>>;
}
