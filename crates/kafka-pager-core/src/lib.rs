//! Kafka Log Pager Core Library
//!
//! Page-by-page browsing of Kafka partitions for a consumer-monitoring UI.
//! Logs are compacted and retention-trimmed, so offsets have gaps and the
//! oldest offset moves; the pagers keep page links stable anyway and show
//! missing offsets as placeholders.
//!
//! # Architecture
//!
//! - [`model`] - Partitions, offsets, records and page types
//! - [`reader`] - The [`LogReader`] seam the pagers read through
//! - [`watermarks`] - Low/high watermark lookup
//! - [`pager`] - Single-partition and merged-topic pagers
//! - [`broker`] - Kafka-backed `LogReader` (feature `kafka`)
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Domain-specific error types
//! - [`metrics`] - Prometheus metrics collection
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kafka_pager_core::broker::KafkaLogReader;
//! use kafka_pager_core::config::PagerConfig;
//! use kafka_pager_core::model::{Partition, StartOffset};
//! use kafka_pager_core::pager::{PagerSettings, PartitionPager};
//!
//! let config = PagerConfig::from_file("config.yaml")?;
//! let settings = PagerSettings::from_config(&config.pagination)?;
//! let reader = Arc::new(KafkaLogReader::new(&config.kafka, settings.max_concurrent_reads));
//!
//! let pager = PartitionPager::new(reader, settings);
//! let window = pager.page("orders", Partition(0), StartOffset::Latest).await?;
//! ```

#![forbid(unsafe_code)]

#[cfg(feature = "kafka")]
pub mod broker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pager;
pub mod reader;
pub mod watermarks;

/// Test utilities for integration testing.
///
/// This module is only available when compiling tests or when the `testing` feature is enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
#[cfg(feature = "kafka")]
pub use broker::KafkaLogReader;
pub use config::{KafkaConfig, PagerConfig, PaginationConfig, SecurityProtocol};
pub use error::{ConfigError, PagerError, ReadError, Result};
pub use metrics::PagerMetrics;
pub use model::{Entry, Offset, PageSize, PageWindow, Partition, Record, StartOffset, TopicPage};
pub use pager::{PagerSettings, PartitionPager, TopicPager};
pub use reader::{LogReader, OnMissingStart};
pub use watermarks::WatermarkOffsets;
