//! Prometheus metrics for the log pagers.
//!
//! Counts pages served, gaps reported and compaction retries, and times
//! every read issued against the log.

use prometheus::{
    Counter, CounterVec, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Pager metrics collection.
pub struct PagerMetrics {
    /// The Prometheus registry.
    pub registry: Registry,

    /// Pages served by kind (`offset` or `topic`).
    pub pages_total: CounterVec,

    /// Placeholders emitted for missing offsets.
    pub placeholders_total: Counter,

    /// Reads retried one offset further because the start offset was gone.
    pub start_offset_retries_total: IntCounter,

    /// Reads issued against the log.
    pub reads_total: IntCounter,

    /// Reads that failed with a fatal error.
    pub read_errors_total: IntCounter,

    /// Read latency histogram.
    pub read_duration_seconds: Histogram,
}

impl PagerMetrics {
    /// Create a new metrics collection.
    ///
    /// # Panics
    ///
    /// Panics if metric registration fails (should not happen with unique names).
    #[must_use]
    pub fn new() -> Self {
        let registry = Registry::new();

        let pages_total = CounterVec::new(
            Opts::new("kafka_pager_pages_total", "Total number of pages served by kind"),
            &["kind"],
        )
        .expect("metric creation should succeed");

        let placeholders_total = Counter::new(
            "kafka_pager_placeholders_total",
            "Total number of placeholders emitted for missing offsets",
        )
        .expect("metric creation should succeed");

        let start_offset_retries_total = IntCounter::new(
            "kafka_pager_start_offset_retries_total",
            "Total number of reads retried because the start offset no longer existed",
        )
        .expect("metric creation should succeed");

        let reads_total = IntCounter::new(
            "kafka_pager_reads_total",
            "Total number of reads issued against the log",
        )
        .expect("metric creation should succeed");

        let read_errors_total = IntCounter::new(
            "kafka_pager_read_errors_total",
            "Total number of reads that failed",
        )
        .expect("metric creation should succeed");

        let read_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("kafka_pager_read_duration_seconds", "Read latency in seconds")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )
        .expect("metric creation should succeed");

        registry
            .register(Box::new(pages_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(placeholders_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(start_offset_retries_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(reads_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(read_errors_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(read_duration_seconds.clone()))
            .expect("metric registration should succeed");

        Self {
            registry,
            pages_total,
            placeholders_total,
            start_offset_retries_total,
            reads_total,
            read_errors_total,
            read_duration_seconds,
        }
    }

    /// Record a page being served.
    pub fn record_page(&self, kind: &str) {
        self.pages_total.with_label_values(&[kind]).inc();
    }

    /// Record placeholders emitted on a page.
    pub fn record_placeholders(&self, count: usize) {
        self.placeholders_total.inc_by(count as f64);
    }

    /// Record a retry at the next offset.
    pub fn record_start_offset_retry(&self) {
        self.start_offset_retries_total.inc();
    }

    /// Record a finished read and its duration.
    pub fn record_read(&self, duration_seconds: f64, failed: bool) {
        self.reads_total.inc();
        self.read_duration_seconds.observe(duration_seconds);
        if failed {
            self.read_errors_total.inc();
        }
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = String::new();
        encoder.encode_utf8(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

impl Default for PagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = PagerMetrics::new();
        assert!(metrics.encode().is_ok());
    }

    #[test]
    fn test_record_page() {
        let metrics = PagerMetrics::new();
        metrics.record_page("offset");
        metrics.record_page("topic");

        let output = metrics.encode().unwrap();
        assert!(output.contains("kafka_pager_pages_total"));
        assert!(output.contains("kind=\"topic\""));
    }

    #[test]
    fn test_record_read() {
        let metrics = PagerMetrics::new();
        metrics.record_read(0.002, false);
        metrics.record_read(0.5, true);

        assert_eq!(metrics.reads_total.get(), 2);
        assert_eq!(metrics.read_errors_total.get(), 1);
        let output = metrics.encode().unwrap();
        assert!(output.contains("kafka_pager_read_duration_seconds"));
    }

    #[test]
    fn test_gap_counters() {
        let metrics = PagerMetrics::new();
        metrics.record_placeholders(25);
        metrics.record_start_offset_retry();

        assert!((metrics.placeholders_total.get() - 25.0).abs() < f64::EPSILON);
        assert_eq!(metrics.start_offset_retries_total.get(), 1);
    }
}
