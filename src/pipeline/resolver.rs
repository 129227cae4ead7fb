//! Operation resolver.
//!
//! Maps an incoming envelope (source topic + messageSchema header) to a
//! channel, an operation of the pipeline's flow, and a datacenter key.

use tracing::debug;

use crate::channel::{Channel, Flow};
use crate::error::{Error, Result};
use crate::pipeline::envelope::{Envelope, EnvelopeState};

/// Resolve channel, operation and datacenter onto the envelope.
///
/// The messageSchema header is mandatory; its value must match an enabled
/// consuming operation by canonical name or Avro schema name, exactly and
/// case-sensitively. No fallback for unknown operations.
pub fn resolve(
    envelope: &mut Envelope,
    channel_id: &str,
    channel: &Channel,
    flow: Flow,
) -> Result<()> {
    let schema = envelope
        .message_schema()
        .filter(|s| !s.trim().is_empty())
        .ok_or(Error::MissingMessageSchema)?
        .to_string();

    let operation = channel
        .consuming_operations(flow)
        .into_iter()
        .find(|op| op.matches_schema(&schema))
        .ok_or_else(|| Error::UnknownOperation(schema.clone()))?
        .clone();

    let datacenter = channel
        .datacenter_for_topic(&envelope.source_topic)
        .map(str::to_string);

    debug!(
        envelope_id = %envelope.id,
        operation = %operation.name,
        datacenter = datacenter.as_deref().unwrap_or("unknown"),
        "Operation resolved"
    );

    envelope.channel_id = Some(channel_id.to_string());
    envelope.operation = Some(operation);
    envelope.datacenter = datacenter;
    envelope.state = EnvelopeState::Resolved;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{request_envelope, sample_channel};

    #[test]
    fn test_resolves_by_schema_stem() {
        let channel = sample_channel();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve");

        resolve(&mut envelope, "BNE", &channel, Flow::Request).unwrap();

        assert_eq!(envelope.state, EnvelopeState::Resolved);
        assert_eq!(
            envelope.operation.as_ref().unwrap().name,
            "requestPayerCustomerOwnAccountRetrieve"
        );
        assert_eq!(envelope.datacenter.as_deref(), Some("jrd"));
        assert_eq!(envelope.channel_id.as_deref(), Some("BNE"));
    }

    #[test]
    fn test_resolves_by_operation_name() {
        let channel = sample_channel();
        let mut envelope = request_envelope("requestPayerCustomerOwnAccountRetrieve");
        resolve(&mut envelope, "BNE", &channel, Flow::Request).unwrap();
        assert!(envelope.operation.is_some());
    }

    #[test]
    fn test_missing_header_fails() {
        let channel = sample_channel();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve");
        envelope.headers.remove("messageSchema");

        let err = resolve(&mut envelope, "BNE", &channel, Flow::Request).unwrap_err();
        assert_eq!(err.kind(), "MissingMessageSchema");
    }

    #[test]
    fn test_unknown_operation_fails() {
        let channel = sample_channel();
        let mut envelope = request_envelope("NoSuchSchema");

        let err = resolve(&mut envelope, "BNE", &channel, Flow::Request).unwrap_err();
        assert_eq!(err.kind(), "UnknownOperation");
    }

    #[test]
    fn test_response_flow_does_not_match_request_operations() {
        let channel = sample_channel();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve");

        let err = resolve(&mut envelope, "BNE", &channel, Flow::Response).unwrap_err();
        assert_eq!(err.kind(), "UnknownOperation");
    }
}
