//! Kafka producer behind the publisher seam.
//!
//! All outbound traffic (EPortal requests, orchestrator responses and DLQ
//! entries) goes through one idempotent producer shared across workers.

use std::collections::HashMap;

use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::kafka::KafkaConfig;

/// Publisher seam between the pipeline and the Kafka client.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a payload with headers; resolves once the broker acknowledges.
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<()>;
}

/// Shared gateway producer with idempotent delivery settings.
pub struct GatewayProducer {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl GatewayProducer {
    /// Create the producer from Kafka configuration.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = config
            .build_producer_config()
            .create()
            .map_err(|e| Error::Kafka(format!("Failed to create producer: {}", e)))?;

        Ok(GatewayProducer {
            producer,
            send_timeout: config.send_timeout(),
        })
    }

    /// Flush pending deliveries, e.g. during shutdown.
    pub fn flush(&self) -> Result<()> {
        self.producer
            .flush(self.send_timeout)
            .map_err(|e| Error::Kafka(format!("Producer flush failed: {}", e)))
    }
}

#[async_trait]
impl MessagePublisher for GatewayProducer {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<()> {
        let mut owned_headers = OwnedHeaders::new_with_capacity(headers.len());
        for (name, value) in headers {
            owned_headers = owned_headers.insert(Header {
                key: name,
                value: Some(value.as_bytes()),
            });
        }

        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .headers(owned_headers);

        match self.producer.send(record, self.send_timeout).await {
            Ok(_delivery) => {
                debug!(topic = topic, key = key, "Message produced");
                Ok(())
            }
            Err((kafka_error, _)) => {
                error!(topic = topic, error = %kafka_error, "Produce failed");
                Err(Error::produce(kafka_error.to_string()))
            }
        }
    }
}

impl Clone for GatewayProducer {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            send_timeout: self.send_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_creation() {
        let config = KafkaConfig::default();
        let result = GatewayProducer::new(&config);
        assert!(result.is_ok());
    }
}
