//! Manual-commit lifecycle.
//!
//! Each envelope carries an opaque commit handle obtained from its consumer.
//! The coordinator fires the handle exactly once, after a successful
//! downstream produce or a successful DLQ produce. Commit failures are
//! logged and never re-raised: the next redelivery retries the message,
//! which is the at-least-once contract.

use std::sync::Arc;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::pipeline::envelope::{Envelope, EnvelopeState};

/// Opaque token that advances the consumer offset for one message.
pub trait CommitHandle: Send + Sync {
    fn commit(&self) -> Result<()>;
}

/// Commit handle bound to a Kafka consumer and a single message position.
pub struct KafkaCommitHandle {
    consumer: Arc<StreamConsumer>,
    topic: String,
    partition: i32,
    offset: i64,
}

impl KafkaCommitHandle {
    pub fn new(consumer: Arc<StreamConsumer>, topic: String, partition: i32, offset: i64) -> Self {
        KafkaCommitHandle {
            consumer,
            topic,
            partition,
            offset,
        }
    }
}

impl CommitHandle for KafkaCommitHandle {
    fn commit(&self) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&self.topic, self.partition, Offset::Offset(self.offset + 1))
            .map_err(|e| Error::Commit(e.to_string()))?;

        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(|e| Error::Commit(e.to_string()))
    }
}

/// Drives the per-envelope commit exactly once.
pub struct CommitCoordinator;

impl CommitCoordinator {
    /// Fire the envelope's commit handle, if any.
    ///
    /// A missing handle is permitted (non-Kafka sources) and only logged.
    pub fn finalize(envelope: &mut Envelope) {
        match envelope.commit_handle.take() {
            Some(handle) => match handle.commit() {
                Ok(()) => {
                    info!(
                        envelope_id = %envelope.id,
                        topic = %envelope.source_topic,
                        partition = envelope.partition,
                        offset = envelope.offset,
                        "Offset committed"
                    );
                    envelope.state = EnvelopeState::Committed;
                }
                Err(e) => {
                    // Not re-raised: redelivery will retry the message.
                    error!(
                        envelope_id = %envelope.id,
                        topic = %envelope.source_topic,
                        error = %e,
                        "Manual commit failed"
                    );
                    envelope.state = EnvelopeState::CommitFailed;
                }
            },
            None => {
                warn!(
                    envelope_id = %envelope.id,
                    topic = %envelope.source_topic,
                    "No commit handle on envelope, skipping commit. \
                     This is expected for non-Kafka sources."
                );
                envelope.state = EnvelopeState::Committed;
            }
        }
    }
}
