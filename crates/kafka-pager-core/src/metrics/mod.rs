//! Metrics collection for the log pagers.
//!
//! Provides Prometheus-compatible metrics for monitoring page requests,
//! compaction gaps and read latency.

pub mod prometheus;

pub use self::prometheus::PagerMetrics;
