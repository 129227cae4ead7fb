//! Kafka configuration module

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kafka configuration settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated)
    #[serde(default = "default_brokers")]
    #[envconfig(from = "KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,

    /// Enable auto-commit (must stay false: offsets are committed manually
    /// after downstream success)
    #[serde(default = "default_auto_commit")]
    #[envconfig(from = "KAFKA_AUTO_COMMIT", default = "false")]
    pub auto_commit: bool,

    /// Offset reset behavior for new consumer groups
    #[serde(default = "default_auto_offset_reset")]
    #[envconfig(from = "KAFKA_AUTO_OFFSET_RESET", default = "earliest")]
    pub auto_offset_reset: String,

    /// Session timeout in milliseconds
    #[serde(default = "default_session_timeout")]
    #[envconfig(from = "KAFKA_SESSION_TIMEOUT_MS", default = "30000")]
    pub session_timeout_ms: u32,

    /// Maximum poll interval in milliseconds
    #[serde(default = "default_max_poll_interval")]
    #[envconfig(from = "KAFKA_MAX_POLL_INTERVAL_MS", default = "300000")]
    pub max_poll_interval_ms: u32,

    /// Bounded queue capacity between a consumer and its worker pool
    #[serde(default = "default_queue_capacity")]
    #[envconfig(from = "KAFKA_QUEUE_CAPACITY", default = "10")]
    pub queue_capacity: usize,

    /// Concurrent workers per consumer queue
    #[serde(default = "default_worker_concurrency")]
    #[envconfig(from = "KAFKA_WORKER_CONCURRENCY", default = "8")]
    pub worker_concurrency: usize,

    /// Producer delivery timeout in milliseconds
    #[serde(default = "default_message_timeout")]
    #[envconfig(from = "KAFKA_MESSAGE_TIMEOUT_MS", default = "30000")]
    pub message_timeout_ms: u64,

    /// Timeout for awaiting a produce acknowledgement
    #[serde(default = "default_send_timeout")]
    #[envconfig(from = "KAFKA_SEND_TIMEOUT_MS", default = "30000")]
    pub send_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            auto_commit: default_auto_commit(),
            auto_offset_reset: default_auto_offset_reset(),
            session_timeout_ms: default_session_timeout(),
            max_poll_interval_ms: default_max_poll_interval(),
            queue_capacity: default_queue_capacity(),
            worker_concurrency: default_worker_concurrency(),
            message_timeout_ms: default_message_timeout(),
            send_timeout_ms: default_send_timeout(),
        }
    }
}

impl KafkaConfig {
    /// Get session timeout as Duration
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.session_timeout_ms))
    }

    /// Get send timeout as Duration
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Build rdkafka consumer configuration for an operation's group
    pub fn build_consumer_config(&self, group_id: &str) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", self.auto_commit.to_string())
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set(
                "max.poll.interval.ms",
                self.max_poll_interval_ms.to_string(),
            )
            .set("enable.partition.eof", "false");

        config
    }

    /// Build rdkafka producer configuration.
    ///
    /// Idempotent settings: acks=all and a single in-flight request per
    /// connection, so produces are not reordered across retries.
    pub fn build_producer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("message.timeout.ms", self.message_timeout_ms.to_string())
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "1");

        config
    }
}

// Default value functions
fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_auto_commit() -> bool {
    false
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_session_timeout() -> u32 {
    30000 // 30 seconds
}

fn default_max_poll_interval() -> u32 {
    300000 // 5 minutes
}

fn default_queue_capacity() -> usize {
    10
}

fn default_worker_concurrency() -> usize {
    8
}

fn default_message_timeout() -> u64 {
    30000
}

fn default_send_timeout() -> u64 {
    30000
}
