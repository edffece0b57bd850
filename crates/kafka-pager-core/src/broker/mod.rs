//! Kafka-backed log reader.
//!
//! This module provides:
//! - [`KafkaLogReader`], the [`LogReader`](crate::reader::LogReader) used
//!   against real clusters
//! - [`ConsumerPool`], reusable librdkafka consumers
//! - Translation of configuration into librdkafka client settings
//! - Mapping of librdkafka errors onto [`ReadError`]

pub mod pool;
mod reader;

pub use pool::ConsumerPool;
pub use reader::KafkaLogReader;

use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};

use crate::config::KafkaConfig;
use crate::error::ReadError;
use crate::model::{Offset, Partition};

/// librdkafka settings for a browsing consumer.
///
/// Consumers never commit and never subscribe; they are assigned one
/// partition per read. `auto.offset.reset=error` makes a vanished start
/// offset visible instead of silently jumping to the log end.
#[must_use]
pub fn client_config(kafka: &KafkaConfig) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", kafka.bootstrap_servers.join(","))
        .set("client.id", &kafka.client_id)
        .set("group.id", format!("{}-browser", kafka.client_id))
        .set("enable.auto.commit", "false")
        .set("enable.auto.offset.store", "false")
        .set("enable.partition.eof", "true")
        .set("auto.offset.reset", "error")
        .set("socket.connection.setup.timeout.ms", kafka.connection_timeout_ms.to_string())
        .set("socket.timeout.ms", kafka.request_timeout_ms.to_string())
        .set("security.protocol", kafka.security_protocol.client_name());

    if kafka.security_protocol.requires_tls() {
        if let Some(tls) = &kafka.tls {
            if let Some(path) = &tls.ca_cert_path {
                config.set("ssl.ca.location", path.to_string_lossy());
            }
            if let Some(path) = &tls.cert_path {
                config.set("ssl.certificate.location", path.to_string_lossy());
            }
            if let Some(path) = &tls.key_path {
                config.set("ssl.key.location", path.to_string_lossy());
            }
            if tls.insecure_skip_verify {
                config
                    .set("enable.ssl.certificate.verification", "false")
                    .set("ssl.endpoint.identification.algorithm", "none");
            }
        }
    }

    if kafka.security_protocol.requires_sasl() {
        if let Some(sasl) = &kafka.sasl {
            config
                .set("sasl.mechanism", sasl.mechanism.mechanism_name())
                .set("sasl.username", sasl.username())
                .set("sasl.password", sasl.password());
        }
    }

    config
}

/// What a failed call was about, for error reporting.
#[derive(Debug, Clone)]
pub(crate) struct ErrorContext {
    topic: String,
    partition: Option<Partition>,
    offset: Option<Offset>,
}

impl ErrorContext {
    pub(crate) fn topic(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            partition: None,
            offset: None,
        }
    }

    pub(crate) fn partition(topic: &str, partition: Partition) -> Self {
        Self {
            partition: Some(partition),
            ..Self::topic(topic)
        }
    }

    pub(crate) fn at(mut self, offset: Offset) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn unknown(&self) -> ReadError {
        ReadError::UnknownPartition {
            topic: self.topic.clone(),
            partition: self.partition.unwrap_or(Partition(-1)),
        }
    }

    pub(crate) fn missing_start(&self) -> ReadError {
        match (self.partition, self.offset) {
            (Some(partition), Some(offset)) => ReadError::MissingStart {
                topic: self.topic.clone(),
                partition,
                offset,
            },
            _ => ReadError::Broker(format!("offset out of range on {}", self.topic)),
        }
    }
}

/// Map a librdkafka error onto the reader's error type.
///
/// Only out-of-range offsets and unknown partitions get their own variants;
/// everything else is reported as a broker failure.
pub(crate) fn map_kafka_error(err: KafkaError, context: &ErrorContext) -> ReadError {
    match err.rdkafka_error_code() {
        Some(RDKafkaErrorCode::OffsetOutOfRange | RDKafkaErrorCode::AutoOffsetReset) => {
            context.missing_start()
        }
        Some(
            RDKafkaErrorCode::UnknownTopicOrPartition
            | RDKafkaErrorCode::UnknownPartition
            | RDKafkaErrorCode::UnknownTopic,
        ) => context.unknown(),
        _ => ReadError::Broker(err.to_string()),
    }
}
