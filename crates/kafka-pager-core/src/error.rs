//! Domain error types for the log pagination engine.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.

use std::time::Duration;

use thiserror::Error;

use crate::model::{Offset, Partition};

/// Errors related to configuration parsing and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Page size must hold at least one record.
    #[error("page_size must be at least 1, got {0}")]
    InvalidPageSize(u32),

    /// The read worker pool needs at least one slot.
    #[error("max_concurrent_reads must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    /// At least one bootstrap server is required to reach the cluster.
    #[error("kafka.bootstrap_servers must not be empty")]
    NoBootstrapServers,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Errors reported by a [`LogReader`](crate::reader::LogReader).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The requested start offset is not readable any more.
    ///
    /// Only returned when the read was issued with
    /// [`OnMissingStart::Fail`](crate::reader::OnMissingStart::Fail).
    #[error("start offset {offset} no longer exists on {topic}/{partition}")]
    MissingStart {
        topic: String,
        partition: Partition,
        offset: Offset,
    },

    /// The topic or partition does not exist on the cluster.
    #[error("unknown topic or partition: {topic}/{partition}")]
    UnknownPartition { topic: String, partition: Partition },

    /// Any other broker or client failure.
    #[error("broker error: {0}")]
    Broker(String),
}

/// Errors returned by the pagers.
#[derive(Error, Debug)]
pub enum PagerError {
    /// Topic or partition does not exist at the reader level.
    #[error("topic or partition not found: {topic}/{partition}")]
    NotFound { topic: String, partition: Partition },

    /// The reader reported a low watermark above the high watermark.
    #[error("invalid watermarks for partition {partition}: low {low} > high {high}")]
    InvalidWatermarks {
        partition: Partition,
        low: Offset,
        high: Offset,
    },

    /// Topic pages are numbered from 1.
    #[error("page numbers start at 1, got {0}")]
    InvalidPage(u32),

    /// A fatal reader failure.
    #[error("read failed: {0}")]
    Read(ReadError),

    /// The whole page did not complete within its time budget.
    #[error("page request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the page request.
    #[error("page request cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ReadError> for PagerError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::UnknownPartition { topic, partition } => {
                PagerError::NotFound { topic, partition }
            }
            other => PagerError::Read(other),
        }
    }
}

/// Result type alias for pager operations.
pub type Result<T> = std::result::Result<T, PagerError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for log reader operations.
pub type ReadResult<T> = std::result::Result<T, ReadError>;
