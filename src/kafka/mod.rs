//! Kafka integration module.
//!
//! This module provides:
//! - Per-operation consumers with manual offset management
//! - The shared idempotent producer behind the publisher seam
//! - Per-envelope commit handles and the commit coordinator
//! - The dispatcher wiring consumers, bounded queues and worker pools

mod commit;
mod config;
mod consumer;
mod dispatcher;
mod producer;

pub use commit::{CommitCoordinator, CommitHandle, KafkaCommitHandle};
pub use config::KafkaConfig;
pub use consumer::{extract_headers, OperationConsumer};
pub use dispatcher::Dispatcher;
pub use producer::{GatewayProducer, MessagePublisher};
