//! Dispatcher: consumers, queues and worker pools.
//!
//! For every enabled consuming operation the dispatcher starts one consumer
//! task, one bounded queue and one pool of workers running the matching
//! pipeline. Workers apply the channel's per-envelope deadline and route
//! every failure through the DLQ funnel. Shutdown is cooperative: consumers
//! stop polling and drop their queue senders, workers drain what is left,
//! then the pools join.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, Instrument};

use crate::channel::{AppConfig, Channel, Operation};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::kafka::{CommitCoordinator, MessagePublisher, OperationConsumer};
use crate::pipeline::{DlqFunnel, Envelope, MessagePipeline};
use crate::registry::SchemaRegistry;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Envelope>>>;

/// Wires consumers to worker pools and supervises them.
pub struct Dispatcher {
    config: Arc<Config>,
    channels: Arc<AppConfig>,
    registry: Arc<SchemaRegistry>,
    publisher: Arc<dyn MessagePublisher>,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<Config>,
        channels: Arc<AppConfig>,
        registry: Arc<SchemaRegistry>,
        publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        Dispatcher {
            config,
            channels,
            registry,
            publisher,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start every consumer and worker pool, then run until shutdown.
    pub async fn run(&self) -> Result<()> {
        let (channel_id, channel) = self
            .channels
            .enabled_channel()
            .ok_or_else(|| Error::config("no enabled channel"))?;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        let consuming: Vec<Operation> = channel
            .enabled_operations()
            .into_iter()
            .filter(|op| op.flow.is_some())
            .cloned()
            .collect();

        info!(
            channel = channel_id,
            consumers = consuming.len(),
            "Starting dispatcher"
        );

        for operation in consuming {
            let mut handles = self.start_consumer(channel_id, channel, operation)?;
            tasks.append(&mut handles);
        }

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| Error::internal(format!("signal handler failed: {}", e)))?;
        info!("Shutdown signal received, draining queues");
        self.shutdown.store(true, Ordering::Relaxed);

        for task in tasks {
            if let Err(e) = task.await {
                // A panicked worker leaves its message uncommitted; the
                // broker redelivers it after restart.
                error!(error = %e, "Dispatcher task terminated abnormally");
            }
        }

        info!("Dispatcher stopped");
        Ok(())
    }

    /// Trigger a cooperative shutdown.
    pub fn trigger_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Start one consumer with its queue and worker pool.
    fn start_consumer(
        &self,
        channel_id: &str,
        channel: &Channel,
        operation: Operation,
    ) -> Result<Vec<JoinHandle<()>>> {
        let flow = operation
            .flow
            .ok_or_else(|| Error::config(format!("operation {} has no flow", operation.name)))?;

        let (queue_tx, queue_rx) = mpsc::channel(self.config.kafka.queue_capacity);
        let queue_rx: SharedReceiver = Arc::new(Mutex::new(queue_rx));

        let datacenters: Vec<&str> = {
            let mut keys: Vec<&str> = channel.data_center.keys().map(String::as_str).collect();
            keys.sort();
            keys
        };
        let subscribe_topics = operation.topics.expand(&datacenters);

        let consumer = OperationConsumer::new(
            &self.config.kafka,
            operation.clone(),
            subscribe_topics,
            queue_tx,
            Arc::clone(&self.shutdown),
        )?;

        let mut handles = Vec::new();
        let operation_name = operation.name.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = consumer.run().await {
                error!(operation = %operation_name, error = %e, "Consumer failed");
            }
        }));

        let pipeline = Arc::new(MessagePipeline::new(
            channel_id,
            channel.clone(),
            flow,
            Arc::clone(&self.registry),
            Arc::clone(&self.publisher),
        ));
        let funnel = Arc::new(DlqFunnel::new(
            channel.clone(),
            Arc::clone(&self.publisher),
        ));
        let deadline = Duration::from_millis(channel.timeout);

        for worker_id in 0..self.config.kafka.worker_concurrency {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&queue_rx),
                Arc::clone(&pipeline),
                Arc::clone(&funnel),
                deadline,
            )));
        }

        Ok(handles)
    }
}

/// Worker loop: drain the queue, run the pipeline with the per-envelope
/// deadline, commit on success, funnel every failure to the DLQ.
async fn worker_loop(
    worker_id: usize,
    queue: SharedReceiver,
    pipeline: Arc<MessagePipeline>,
    funnel: Arc<DlqFunnel>,
    deadline: Duration,
) {
    loop {
        let envelope = { queue.lock().await.recv().await };
        let Some(mut envelope) = envelope else {
            info!(worker_id = worker_id, flow = %pipeline.flow(), "Worker queue drained");
            break;
        };

        let span = crate::kafka_span!(envelope.source_topic, envelope.partition, envelope.offset);
        async {
            match timeout(deadline, pipeline.process(&mut envelope)).await {
                Ok(Ok(())) => CommitCoordinator::finalize(&mut envelope),
                Ok(Err(e)) => funnel.handle(&mut envelope, e).await,
                Err(_) => {
                    funnel
                        .handle(&mut envelope, Error::ProcessingTimeout(deadline))
                        .await
                }
            }
        }
        .instrument(span)
        .await;
    }
}
