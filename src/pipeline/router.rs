//! Output router.
//!
//! Selects the destination topic from the forward operation's topic list by
//! datacenter and rewrites the outbound messageSchema header. The datacenter
//! was derived from the source topic during resolution, so symmetric topic
//! pairs (jrd/qro) always route back to the matching side.

use tracing::debug;

use crate::channel::{Channel, Operation};
use crate::constants::HEADER_MESSAGE_SCHEMA;
use crate::error::{Error, Result};
use crate::pipeline::envelope::Envelope;

/// Look up the forward operation the resolved operation routes to.
pub fn forward_operation<'a>(channel: &'a Channel, operation: &Operation) -> Result<&'a Operation> {
    let target = operation
        .forward_to
        .as_ref()
        .ok_or_else(|| Error::produce(format!("operation {} has no forward target", operation.name)))?;
    channel
        .operation(target)
        .ok_or_else(|| Error::produce(format!("forward operation {} not configured", target)))
}

/// Set the destination topic and outbound messageSchema on the envelope.
pub fn route(envelope: &mut Envelope, channel: &Channel) -> Result<()> {
    let operation = envelope
        .operation
        .as_ref()
        .ok_or_else(|| Error::internal("routing before resolution"))?
        .clone();
    let forward = forward_operation(channel, &operation)?;

    let datacenter = envelope
        .datacenter
        .as_deref()
        .ok_or_else(|| Error::produce(format!("no datacenter derived from {}", envelope.source_topic)))?;

    let topic = forward.topics.select(datacenter).ok_or_else(|| {
        Error::produce(format!(
            "operation {} has no topic for datacenter {}",
            forward.name, datacenter
        ))
    })?;

    let message_schema = forward.outbound_message_schema();
    envelope
        .headers
        .insert(HEADER_MESSAGE_SCHEMA.to_string(), message_schema.clone());
    envelope.outbound_message_schema = Some(message_schema);
    envelope.destination_topic = Some(topic.clone());

    debug!(
        envelope_id = %envelope.id,
        destination = %topic,
        "Destination selected"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Flow;
    use crate::pipeline::resolver;
    use crate::test_utils::{request_envelope, response_envelope, sample_channel};

    #[test]
    fn test_routes_to_matching_datacenter() {
        let channel = sample_channel();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve");
        resolver::resolve(&mut envelope, "BNE", &channel, Flow::Request).unwrap();

        route(&mut envelope, &channel).unwrap();

        assert_eq!(
            envelope.destination_topic.as_deref(),
            Some("mx.accountManagement.oab.requestOwnAccountInformationPayerBeS016.jrd")
        );
        assert_eq!(
            envelope.headers.get("messageSchema").map(String::as_str),
            Some("RequestOwnAccountInformationPayerBeS016")
        );
    }

    #[test]
    fn test_routing_is_deterministic() {
        let channel = sample_channel();
        let mut first = request_envelope("RequestPayerCustomerOwnAccountRetrieve");
        let mut second = request_envelope("RequestPayerCustomerOwnAccountRetrieve");
        resolver::resolve(&mut first, "BNE", &channel, Flow::Request).unwrap();
        resolver::resolve(&mut second, "BNE", &channel, Flow::Request).unwrap();

        route(&mut first, &channel).unwrap();
        route(&mut second, &channel).unwrap();

        assert_eq!(first.destination_topic, second.destination_topic);
    }

    #[test]
    fn test_response_flow_routes_back_to_orchestrator() {
        let channel = sample_channel();
        let mut envelope = response_envelope("ResponseOwnAccountInformationPayerBeS016");
        resolver::resolve(&mut envelope, "BNE", &channel, Flow::Response).unwrap();

        route(&mut envelope, &channel).unwrap();

        assert_eq!(
            envelope.destination_topic.as_deref(),
            Some("mx.accountManagement.oab.responsePayerCustomerOwnAccountRetrieve.qro")
        );
    }

    #[test]
    fn test_unmatched_datacenter_fails() {
        let channel = sample_channel();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve");
        resolver::resolve(&mut envelope, "BNE", &channel, Flow::Request).unwrap();
        envelope.datacenter = Some("mty".to_string());

        let err = route(&mut envelope, &channel).unwrap_err();
        assert_eq!(err.kind(), "ProduceError");
    }
}
