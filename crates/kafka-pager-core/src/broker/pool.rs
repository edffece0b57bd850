//! Consumer pool.
//!
//! Each read assigns a partition to a consumer, so concurrent reads must not
//! share one. The pool hands out idle consumers and creates new ones on
//! demand, keeping at most `max_idle` around for reuse.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::KafkaConfig;
use crate::error::{ReadError, ReadResult};

use super::client_config;

/// Pool of `BaseConsumer`s sharing one client configuration.
pub struct ConsumerPool {
    config: ClientConfig,
    idle: Mutex<Vec<BaseConsumer>>,
    max_idle: usize,
}

impl ConsumerPool {
    /// Create an empty pool for the given cluster.
    #[must_use]
    pub fn new(kafka: &KafkaConfig, max_idle: usize) -> Self {
        Self {
            config: client_config(kafka),
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    /// Take an idle consumer, or create one.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Broker`] if librdkafka rejects the configuration.
    pub async fn checkout(&self) -> ReadResult<BaseConsumer> {
        if let Some(consumer) = self.idle.lock().await.pop() {
            return Ok(consumer);
        }

        debug!("creating consumer");
        self.config
            .create::<BaseConsumer>()
            .map_err(|e| ReadError::Broker(format!("failed to create consumer: {e}")))
    }

    /// Hand a consumer back for reuse.
    ///
    /// The consumer's assignment is cleared first; one that cannot be cleared
    /// is dropped instead of being reused.
    pub async fn checkin(&self, consumer: BaseConsumer) {
        if let Err(e) = consumer.unassign() {
            warn!(error = %e, "dropping consumer that could not be unassigned");
            return;
        }

        let mut idle = self.idle.lock().await;
        if idle.len() < self.max_idle {
            idle.push(consumer);
        }
    }

    /// Number of idle consumers.
    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> KafkaConfig {
        KafkaConfig {
            connection_timeout_ms: 100,
            request_timeout_ms: 1000,
            ..KafkaConfig::with_bootstrap_servers(vec!["127.0.0.1:59999".to_string()])
        }
    }

    #[tokio::test]
    async fn test_pool_starts_empty() {
        let pool = ConsumerPool::new(&test_config(), 4);
        assert_eq!(pool.idle_count().await, 0);
    }

    #[tokio::test]
    async fn test_checkin_keeps_at_most_max_idle() {
        // Creating a consumer does not contact the cluster.
        let pool = ConsumerPool::new(&test_config(), 1);
        let first = pool.checkout().await.unwrap();
        let second = pool.checkout().await.unwrap();

        pool.checkin(first).await;
        pool.checkin(second).await;
        assert_eq!(pool.idle_count().await, 1);

        let _reused = pool.checkout().await.unwrap();
        assert_eq!(pool.idle_count().await, 0);
    }
}
