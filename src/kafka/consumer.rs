//! Kafka consumer with manual offset management.
//!
//! One consumer per consuming operation, subscribed to the operation's
//! topic list under its group id. The consumer is deliberately lightweight:
//! it filters on the messageSchema header, packages an envelope with its
//! commit handle, and hands it to the worker pool through a bounded queue.
//! Enqueueing blocks when the queue is full, which backpressures the poll
//! loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::channel::Operation;
use crate::error::{Error, Result};
use crate::kafka::{KafkaCommitHandle, KafkaConfig};
use crate::pipeline::envelope::{Envelope, EnvelopeState};
use crate::pipeline::filter;

/// Consumer task for one operation's input topics.
pub struct OperationConsumer {
    consumer: Arc<StreamConsumer>,
    operation: Operation,
    /// messageSchema values this consumer accepts.
    recognized: Vec<String>,
    queue: mpsc::Sender<Envelope>,
    shutdown: Arc<AtomicBool>,
}

impl OperationConsumer {
    /// Create a consumer subscribed to the operation's topics.
    pub fn new(
        config: &KafkaConfig,
        operation: Operation,
        subscribe_topics: Vec<String>,
        queue: mpsc::Sender<Envelope>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let consumer: StreamConsumer = config
            .build_consumer_config(&operation.group_id)
            .create()
            .map_err(|e| Error::Kafka(format!("Failed to create consumer: {}", e)))?;

        let topic_refs: Vec<&str> = subscribe_topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| Error::Kafka(format!("Failed to subscribe: {}", e)))?;

        let recognized = vec![
            operation.name.clone(),
            operation.binary_schema.clone(),
            operation.schema_stem().to_string(),
        ];

        info!(
            operation = %operation.name,
            group_id = %operation.group_id,
            topics = ?subscribe_topics,
            "Consumer subscribed"
        );

        Ok(OperationConsumer {
            consumer: Arc::new(consumer),
            operation,
            recognized,
            queue,
            shutdown,
        })
    }

    /// Poll until shutdown, enqueueing accepted envelopes.
    pub async fn run(self) -> Result<()> {
        let stream = self.consumer.stream();
        tokio::pin!(stream);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let next = tokio::select! {
                message = stream.next() => message,
                _ = sleep(Duration::from_secs(1)) => continue,
            };

            match next {
                Some(Ok(message)) => self.accept(&message).await,
                Some(Err(e)) => {
                    error!(operation = %self.operation.name, error = %e, "Consumer error");
                }
                None => continue,
            }
        }

        info!(operation = %self.operation.name, "Consumer stopped");
        Ok(())
    }

    /// Filter, package and enqueue a received message.
    async fn accept(&self, message: &BorrowedMessage<'_>) {
        let topic = message.topic().to_string();
        let partition = message.partition();
        let offset = message.offset();

        debug!(
            operation = %self.operation.name,
            topic = %topic,
            partition = partition,
            offset = offset,
            "Message received"
        );

        let headers = extract_headers(message);
        if !filter::accept(&headers, &self.recognized) {
            debug!(
                topic = %topic,
                partition = partition,
                offset = offset,
                "Message dropped by schema filter"
            );
            return;
        }

        let payload = message.payload().map(<[u8]>::to_vec).unwrap_or_default();

        let handle = KafkaCommitHandle::new(
            Arc::clone(&self.consumer),
            topic.clone(),
            partition,
            offset,
        );

        let mut envelope = Envelope::new(topic, partition, offset, payload, headers)
            .with_commit_handle(Box::new(handle));
        envelope.state = EnvelopeState::Filtered;

        // Blocks while the queue is full.
        if self.queue.send(envelope).await.is_err() {
            warn!(
                operation = %self.operation.name,
                "Worker queue closed, dropping message for redelivery"
            );
        }
    }
}

/// Copy message headers into an owned, case-preserving map.
pub fn extract_headers(message: &BorrowedMessage<'_>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(headers) = message.headers() {
        for header in headers.iter() {
            if let Some(value) = header.value {
                out.insert(
                    header.key.to_string(),
                    String::from_utf8_lossy(value).to_string(),
                );
            }
        }
    }
    out
}
