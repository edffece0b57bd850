//! Configuration types for the log pager.
//!
//! Configuration is loaded from YAML files and validated before use.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::model::PageSize;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PagerConfig {
    /// Kafka cluster connection configuration.
    pub kafka: KafkaConfig,

    /// Pagination behaviour.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Prometheus metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kafka cluster connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    /// Bootstrap server addresses.
    pub bootstrap_servers: Vec<String>,

    /// Client id reported to the brokers.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Timeout of a single watermark lookup or read, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Security protocol for broker connections.
    #[serde(default)]
    pub security_protocol: SecurityProtocol,

    /// TLS configuration for broker connections (when using SSL or SASL_SSL).
    #[serde(default)]
    pub tls: Option<BrokerTlsConfig>,

    /// SASL authentication configuration (when using SASL_PLAINTEXT or SASL_SSL).
    #[serde(default)]
    pub sasl: Option<BrokerSaslConfig>,
}

/// Security protocol for Kafka connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityProtocol {
    /// Plain TCP without encryption or authentication.
    #[default]
    Plaintext,
    /// TLS encryption without SASL authentication.
    Ssl,
    /// SASL authentication without TLS encryption.
    SaslPlaintext,
    /// TLS encryption with SASL authentication.
    SaslSsl,
}

impl SecurityProtocol {
    /// Check if TLS is required for this protocol.
    #[must_use]
    pub fn requires_tls(&self) -> bool {
        matches!(self, Self::Ssl | Self::SaslSsl)
    }

    /// Check if SASL is required for this protocol.
    #[must_use]
    pub fn requires_sasl(&self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }

    /// Name of the protocol as librdkafka's `security.protocol` expects it.
    #[must_use]
    pub fn client_name(&self) -> &'static str {
        match self {
            Self::Plaintext => "plaintext",
            Self::Ssl => "ssl",
            Self::SaslPlaintext => "sasl_plaintext",
            Self::SaslSsl => "sasl_ssl",
        }
    }
}

/// TLS configuration for broker connections.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BrokerTlsConfig {
    /// Path to CA certificate file (PEM format) for verifying broker certificates.
    /// If not set, uses the system's root certificates.
    pub ca_cert_path: Option<PathBuf>,

    /// Path to client certificate file (PEM format) for mTLS authentication.
    pub cert_path: Option<PathBuf>,

    /// Path to client private key file (PEM format) for mTLS authentication.
    pub key_path: Option<PathBuf>,

    /// Whether to skip server certificate verification (INSECURE - for testing only).
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum SaslMechanism {
    /// SASL/PLAIN - simple username/password authentication.
    #[default]
    #[serde(rename = "PLAIN")]
    Plain,
    /// SASL/SCRAM-SHA-256 - salted challenge-response authentication.
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    /// SASL/SCRAM-SHA-512 - salted challenge-response authentication.
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
}

impl SaslMechanism {
    /// Get the Kafka mechanism name as used in the SASL handshake.
    #[must_use]
    pub fn mechanism_name(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

/// SASL authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerSaslConfig {
    /// SASL mechanism to use.
    #[serde(default)]
    pub mechanism: SaslMechanism,

    /// Username for authentication.
    /// Supports environment variable expansion: "${KAFKA_USERNAME}"
    pub username: String,

    /// Password for authentication.
    /// Supports environment variable expansion: "${KAFKA_PASSWORD}"
    pub password: String,
}

impl BrokerSaslConfig {
    /// Get the username with environment variables expanded.
    #[must_use]
    pub fn username(&self) -> String {
        expand_env_vars(&self.username)
    }

    /// Get the password with environment variables expanded.
    #[must_use]
    pub fn password(&self) -> String {
        expand_env_vars(&self.password)
    }
}

/// Expand environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable `VAR_NAME`.
/// If the variable is not set, replaces with an empty string.
fn expand_env_vars(s: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex");
    re.replace_all(s, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .to_string()
}

/// Pagination configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginationConfig {
    /// Maximum number of entries on one page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on concurrent per-partition reads for topic pages.
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,

    /// Time budget for building one whole page, in milliseconds.
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Whether pagers record metrics.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output logs in JSON format (for production).
    #[serde(default)]
    pub json: bool,
}

// Default value functions

fn default_client_id() -> String {
    "kafka-pager".to_string()
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_page_size() -> u32 {
    PageSize::DEFAULT.get()
}

fn default_max_concurrent_reads() -> usize {
    8
}

fn default_page_timeout_ms() -> u64 {
    15_000
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_concurrent_reads: default_max_concurrent_reads(),
            page_timeout_ms: default_page_timeout_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl KafkaConfig {
    /// Config pointing at the given bootstrap servers with default settings.
    #[must_use]
    pub fn with_bootstrap_servers(servers: Vec<String>) -> Self {
        Self {
            bootstrap_servers: servers,
            client_id: default_client_id(),
            connection_timeout_ms: default_connection_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            security_protocol: SecurityProtocol::default(),
            tls: None,
            sasl: None,
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// Configuration loading and validation

impl PagerConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation check fails.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.kafka.bootstrap_servers.is_empty() {
            return Err(ConfigError::NoBootstrapServers);
        }
        self.pagination.validate()
    }
}

impl PaginationConfig {
    /// Validate the pagination configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `page_size` or `max_concurrent_reads` is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        if self.max_concurrent_reads == 0 {
            return Err(ConfigError::InvalidConcurrency(self.max_concurrent_reads));
        }
        Ok(())
    }

    /// The configured page size.
    ///
    /// # Errors
    ///
    /// Returns an error if `page_size` is zero.
    pub fn page_size(&self) -> ConfigResult<PageSize> {
        PageSize::new(self.page_size).ok_or(ConfigError::InvalidPageSize(self.page_size))
    }

    #[must_use]
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PagerConfig {
        PagerConfig {
            kafka: KafkaConfig::with_bootstrap_servers(vec!["localhost:9092".to_string()]),
            pagination: PaginationConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes_validation() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.pagination.page_size().unwrap().get(), 25);
    }

    #[test]
    fn test_zero_page_size() {
        let mut config = valid_config();
        config.pagination.page_size = 0;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::InvalidPageSize(0))));
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = valid_config();
        config.pagination.max_concurrent_reads = 0;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::InvalidConcurrency(0))));
    }

    #[test]
    fn test_missing_bootstrap_servers() {
        let mut config = valid_config();
        config.kafka.bootstrap_servers.clear();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoBootstrapServers)
        ));
    }

    #[test]
    fn test_default_values_applied() {
        let yaml = r"
kafka:
  bootstrap_servers:
    - 'localhost:9092'
";
        let config = PagerConfig::from_str(yaml).unwrap();
        assert_eq!(config.pagination.page_size, 25);
        assert_eq!(config.pagination.max_concurrent_reads, 8);
        assert_eq!(config.pagination.page_timeout(), Duration::from_secs(15));
        assert_eq!(config.kafka.client_id, "kafka-pager");
        assert_eq!(config.kafka.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.kafka.security_protocol, SecurityProtocol::Plaintext);
        assert!(config.metrics.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_pagination_overrides() {
        let yaml = r"
kafka:
  bootstrap_servers:
    - 'localhost:9092'
pagination:
  page_size: 100
  max_concurrent_reads: 2
";
        let config = PagerConfig::from_str(yaml).unwrap();
        assert_eq!(config.pagination.page_size().unwrap().get(), 100);
        assert_eq!(config.pagination.max_concurrent_reads, 2);
    }

    #[test]
    fn test_invalid_yaml_page_size_rejected() {
        let yaml = r"
kafka:
  bootstrap_servers:
    - 'localhost:9092'
pagination:
  page_size: 0
";
        assert!(matches!(
            PagerConfig::from_str(yaml),
            Err(ConfigError::InvalidPageSize(0))
        ));
    }

    #[test]
    fn test_security_protocol_parsing() {
        let yaml = r"
kafka:
  bootstrap_servers:
    - 'kafka.example.com:9093'
  security_protocol: SASL_SSL
  sasl:
    mechanism: SCRAM-SHA-512
    username: '${KAFKA_API_KEY}'
    password: '${KAFKA_API_SECRET}'
";
        let config = PagerConfig::from_str(yaml).unwrap();
        assert_eq!(config.kafka.security_protocol, SecurityProtocol::SaslSsl);
        assert!(config.kafka.security_protocol.requires_tls());
        assert!(config.kafka.security_protocol.requires_sasl());
        assert_eq!(config.kafka.security_protocol.client_name(), "sasl_ssl");

        let sasl = config.kafka.sasl.unwrap();
        assert_eq!(sasl.mechanism, SaslMechanism::ScramSha512);
        assert_eq!(sasl.mechanism.mechanism_name(), "SCRAM-SHA-512");
    }

    #[test]
    fn test_tls_config_parsing() {
        let yaml = r"
kafka:
  bootstrap_servers:
    - 'kafka.example.com:9093'
  security_protocol: SSL
  tls:
    ca_cert_path: '/etc/ssl/ca.crt'
    insecure_skip_verify: true
";
        let config = PagerConfig::from_str(yaml).unwrap();
        assert!(!config.kafka.security_protocol.requires_sasl());

        let tls = config.kafka.tls.unwrap();
        assert_eq!(tls.ca_cert_path, Some(PathBuf::from("/etc/ssl/ca.crt")));
        assert!(tls.cert_path.is_none());
        assert!(tls.insecure_skip_verify);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("TEST_PAGER_USER", "dashboard");
        std::env::set_var("TEST_PAGER_PASS", "s3cret");

        let config = BrokerSaslConfig {
            mechanism: SaslMechanism::Plain,
            username: "${TEST_PAGER_USER}".to_string(),
            password: "pre-${TEST_PAGER_PASS}".to_string(),
        };

        assert_eq!(config.username(), "dashboard");
        assert_eq!(config.password(), "pre-s3cret");

        std::env::remove_var("TEST_PAGER_USER");
        std::env::remove_var("TEST_PAGER_PASS");
    }

    #[test]
    fn test_env_var_expansion_missing_var() {
        let config = BrokerSaslConfig {
            mechanism: SaslMechanism::Plain,
            username: "${NONEXISTENT_PAGER_VAR}".to_string(),
            password: "literal".to_string(),
        };

        assert_eq!(config.username(), "");
        assert_eq!(config.password(), "literal");
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "kafka:\n  bootstrap_servers: ['broker:9092']\npagination:\n  page_size: 10"
        )
        .unwrap();

        let config = PagerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.kafka.bootstrap_servers, vec!["broker:9092"]);
        assert_eq!(config.pagination.page_size, 10);
    }

    #[test]
    fn test_from_missing_file() {
        let result = PagerConfig::from_file("/nonexistent/pager.yaml");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
