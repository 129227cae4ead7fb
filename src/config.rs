//! Runtime configuration for the gateway.
//!
//! Environment-driven settings for the process itself: broker addresses,
//! logging, the channel-configuration file, and schema resolution. The
//! channel tree is a separate artifact (see `channel`) loaded from the file
//! this configuration points at.

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::kafka::KafkaConfig;

/// Main configuration structure for the gateway
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct Config {
    /// Gateway process configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub gateway: GatewayConfig,

    /// Kafka configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub kafka: KafkaConfig,
}

/// Gateway process configuration
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct GatewayConfig {
    /// Log level
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[envconfig(from = "ENVIRONMENT", default = "development")]
    pub environment: String,

    /// Path to the channel configuration YAML file
    #[envconfig(from = "CHANNEL_CONFIG_PATH", default = "config/application.yaml")]
    pub channel_config_path: String,

    /// Scheme + directory prepended to bare schema resource names
    #[envconfig(from = "SCHEMA_LOCATION", default = "embedded:schemas/")]
    pub schema_location: String,

    /// Shutdown timeout in seconds
    #[envconfig(from = "SHUTDOWN_TIMEOUT_SECS", default = "30")]
    pub shutdown_timeout_secs: u64,
}

impl GatewayConfig {
    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        Config::init_from_env().map_err(Error::from)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.is_empty() {
            return Err(Error::config("Kafka brokers cannot be empty"));
        }

        if self.gateway.channel_config_path.is_empty() {
            return Err(Error::config("Channel configuration path cannot be empty"));
        }

        if self.kafka.worker_concurrency == 0 {
            return Err(Error::config("Worker concurrency must be at least 1"));
        }

        if self.kafka.queue_capacity == 0 {
            return Err(Error::config("Queue capacity must be at least 1"));
        }

        Ok(())
    }

    /// Log configuration at startup
    pub fn log_config(&self) {
        tracing::info!(
            environment = %self.gateway.environment,
            log_level = %self.gateway.log_level,
            channel_config = %self.gateway.channel_config_path,
            schema_location = %self.gateway.schema_location,
            "Gateway configuration"
        );

        tracing::info!(
            brokers = %self.kafka.brokers,
            auto_offset_reset = %self.kafka.auto_offset_reset,
            queue_capacity = %self.kafka.queue_capacity,
            worker_concurrency = %self.kafka.worker_concurrency,
            "Kafka configuration"
        );
    }
}
