//! The in-flight, per-message state record.
//!
//! An envelope is created by a consumer, handed to exactly one worker
//! through the bounded queue, and destroyed once its commit handle fires
//! (directly on success, or after the DLQ produce on failure). Replaces the
//! dynamic property map of the source system with typed fields.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::channel::Operation;
use crate::constants::HEADER_MESSAGE_SCHEMA;
use crate::kafka::CommitHandle;

/// Lifecycle states of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Received,
    Filtered,
    Resolved,
    Decoded,
    Transformed,
    Encoded,
    Produced,
    DlqProduced,
    Committed,
    CommitFailed,
}

/// Per-message processing state, exclusively owned by one worker.
pub struct Envelope {
    /// Correlation id for log spans.
    pub id: Uuid,

    // Immutable Kafka coordinates.
    pub source_topic: String,
    pub partition: i32,
    pub offset: i64,

    /// Raw inbound payload bytes (also the DLQ body).
    pub payload: Vec<u8>,

    /// Inbound headers, original case preserved.
    pub headers: HashMap<String, String>,

    pub state: EnvelopeState,

    // Fields populated as the pipeline advances.
    pub channel_id: Option<String>,
    pub operation: Option<Operation>,
    pub datacenter: Option<String>,
    pub original_headers: Option<HashMap<String, String>>,
    pub payload_json: Option<String>,
    pub transformed_json: Option<String>,
    pub outbound_payload: Option<Vec<u8>>,
    pub outbound_message_schema: Option<String>,
    pub destination_topic: Option<String>,

    /// Opaque token that advances the consumer offset when invoked.
    /// Absent for non-Kafka sources.
    pub commit_handle: Option<Box<dyn CommitHandle>>,
}

impl Envelope {
    /// Create a freshly received envelope.
    pub fn new(
        source_topic: impl Into<String>,
        partition: i32,
        offset: i64,
        payload: Vec<u8>,
        headers: HashMap<String, String>,
    ) -> Self {
        Envelope {
            id: Uuid::new_v4(),
            source_topic: source_topic.into(),
            partition,
            offset,
            payload,
            headers,
            state: EnvelopeState::Received,
            channel_id: None,
            operation: None,
            datacenter: None,
            original_headers: None,
            payload_json: None,
            transformed_json: None,
            outbound_payload: None,
            outbound_message_schema: None,
            destination_topic: None,
            commit_handle: None,
        }
    }

    /// Attach the consumer's commit handle.
    pub fn with_commit_handle(mut self, handle: Box<dyn CommitHandle>) -> Self {
        self.commit_handle = Some(handle);
        self
    }

    /// Inbound messageSchema header value, if present.
    pub fn message_schema(&self) -> Option<&str> {
        self.headers.get(HEADER_MESSAGE_SCHEMA).map(String::as_str)
    }

    /// Producer key, `partition-offset` of the source position.
    pub fn producer_key(&self) -> String {
        format!("{}-{}", self.partition, self.offset)
    }

    /// Restore the pre-transform header snapshot onto the envelope.
    pub fn restore_headers(&mut self) {
        if let Some(snapshot) = &self.original_headers {
            self.headers = snapshot.clone();
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("id", &self.id)
            .field("source_topic", &self.source_topic)
            .field("partition", &self.partition)
            .field("offset", &self.offset)
            .field("state", &self.state)
            .field("operation", &self.operation.as_ref().map(|op| &op.name))
            .field("datacenter", &self.datacenter)
            .field("destination_topic", &self.destination_topic)
            .field("has_commit_handle", &self.commit_handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> HashMap<String, String> {
        HashMap::from([
            ("messageSchema".to_string(), "SomeSchema".to_string()),
            ("channelId".to_string(), "BNE".to_string()),
            ("X-Business-Ref".to_string(), "abc".to_string()),
        ])
    }

    #[test]
    fn test_new_envelope_state() {
        let envelope = Envelope::new("topic", 1, 42, vec![1, 2], headers());
        assert_eq!(envelope.state, EnvelopeState::Received);
        assert_eq!(envelope.message_schema(), Some("SomeSchema"));
        assert_eq!(envelope.producer_key(), "1-42");
        assert!(envelope.commit_handle.is_none());
    }

    #[test]
    fn test_restore_headers_preserves_case() {
        let mut envelope = Envelope::new("topic", 0, 0, vec![], headers());
        envelope.original_headers = Some(envelope.headers.clone());

        envelope.headers.clear();
        envelope.restore_headers();

        assert_eq!(
            envelope.headers.get("X-Business-Ref").map(String::as_str),
            Some("abc")
        );
    }
}
