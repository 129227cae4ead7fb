//! Per-message pipeline engine.
//!
//! A worker runs each envelope through resolution, the header gate, Avro
//! decode, validation + transform, Avro encode and routing, then produces
//! downstream. Any failure short-circuits into the DLQ funnel, which itself
//! commits only after a successful DLQ produce.

pub mod dlq;
pub mod envelope;
pub mod filter;
pub mod gate;
pub mod resolver;
pub mod router;
pub mod transform;

pub use dlq::DlqFunnel;
pub use envelope::{Envelope, EnvelopeState};

use std::sync::Arc;

use tracing::info;

use crate::channel::{Channel, Flow};
use crate::error::{Error, Result};
use crate::kafka::MessagePublisher;
use crate::registry::SchemaRegistry;

/// One directed pipeline (request or response) over a channel.
pub struct MessagePipeline {
    channel_id: String,
    channel: Channel,
    flow: Flow,
    registry: Arc<SchemaRegistry>,
    publisher: Arc<dyn MessagePublisher>,
}

impl MessagePipeline {
    pub fn new(
        channel_id: impl Into<String>,
        channel: Channel,
        flow: Flow,
        registry: Arc<SchemaRegistry>,
        publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        MessagePipeline {
            channel_id: channel_id.into(),
            channel,
            flow,
            registry,
            publisher,
        }
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    /// Run the envelope through every stage up to and including the
    /// downstream produce. The caller commits on success.
    pub async fn process(&self, envelope: &mut Envelope) -> Result<()> {
        let started = std::time::Instant::now();

        resolver::resolve(envelope, &self.channel_id, &self.channel, self.flow)?;
        gate::check(envelope)?;

        self.decode(envelope)?;
        transform::apply(envelope, &self.registry)?;
        self.encode(envelope)?;
        router::route(envelope, &self.channel)?;

        self.produce(envelope).await?;

        info!(
            envelope_id = %envelope.id,
            flow = %self.flow,
            source_topic = %envelope.source_topic,
            destination_topic = envelope.destination_topic.as_deref().unwrap_or(""),
            processing_time_ms = started.elapsed().as_millis() as u64,
            "Envelope processed"
        );
        Ok(())
    }

    /// Decode the inbound Avro payload under the operation's schema.
    fn decode(&self, envelope: &mut Envelope) -> Result<()> {
        let operation = envelope
            .operation
            .as_ref()
            .ok_or_else(|| Error::internal("decode before resolution"))?;
        let schema = self.registry.avro_schema(&operation.binary_schema)?;

        envelope.payload_json = Some(crate::codec::decode(&envelope.payload, &schema)?);
        envelope.state = EnvelopeState::Decoded;
        Ok(())
    }

    /// Encode the transformed JSON under the forward operation's schema.
    fn encode(&self, envelope: &mut Envelope) -> Result<()> {
        let operation = envelope
            .operation
            .as_ref()
            .ok_or_else(|| Error::internal("encode before resolution"))?;
        let forward = router::forward_operation(&self.channel, operation)?;
        let schema = self.registry.avro_schema(&forward.binary_schema)?;

        let transformed = envelope
            .transformed_json
            .as_ref()
            .ok_or_else(|| Error::internal("encode before transform"))?;

        if !forward.json_schema.is_empty() {
            transform::revalidate(transformed, &forward.json_schema, &self.registry)?;
        }

        envelope.outbound_payload = Some(crate::codec::encode(transformed, &schema)?);
        envelope.state = EnvelopeState::Encoded;
        Ok(())
    }

    /// Produce the encoded payload to the selected destination.
    async fn produce(&self, envelope: &mut Envelope) -> Result<()> {
        let topic = envelope
            .destination_topic
            .as_ref()
            .ok_or_else(|| Error::internal("produce before routing"))?
            .clone();
        let payload = envelope
            .outbound_payload
            .as_ref()
            .ok_or_else(|| Error::internal("produce before encode"))?
            .clone();

        let key = envelope.producer_key();
        self.publisher
            .publish(&topic, &key, &payload, &envelope.headers)
            .await?;
        envelope.state = EnvelopeState::Produced;
        Ok(())
    }
}
