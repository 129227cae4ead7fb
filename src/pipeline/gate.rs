//! Header gate.
//!
//! Enforces the per-operation set of mandatory inbound headers before any
//! payload work happens. Headers are not mutated at this stage.

use crate::constants::{HEADER_CHANNEL_ID, HEADER_MESSAGE_SCHEMA};
use crate::error::{Error, Result};
use crate::pipeline::envelope::Envelope;

/// Check that every required header is present and non-blank.
pub fn check(envelope: &Envelope) -> Result<()> {
    let operation = envelope
        .operation
        .as_ref()
        .ok_or_else(|| Error::internal("header gate before resolution"))?;

    let mut required: Vec<&str> = vec![HEADER_CHANNEL_ID, HEADER_MESSAGE_SCHEMA];
    required.extend(operation.required_headers.iter().map(String::as_str));

    for name in required {
        match envelope.headers.get(name) {
            Some(value) if !value.trim().is_empty() => {}
            _ => return Err(Error::MissingHeader(name.to_string())),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Flow;
    use crate::pipeline::resolver;
    use crate::test_utils::{request_envelope, sample_channel};

    fn resolved_envelope(schema: &str) -> Envelope {
        let channel = sample_channel();
        let mut envelope = request_envelope(schema);
        resolver::resolve(&mut envelope, "BNE", &channel, Flow::Request).unwrap();
        envelope
    }

    #[test]
    fn test_all_headers_present() {
        let envelope = resolved_envelope("RequestPayerCustomerOwnAccountRetrieve");
        assert!(check(&envelope).is_ok());
    }

    #[test]
    fn test_missing_channel_id_fails() {
        let mut envelope = resolved_envelope("RequestPayerCustomerOwnAccountRetrieve");
        envelope.headers.remove("channelId");

        let err = check(&envelope).unwrap_err();
        assert_eq!(err.kind(), "MissingHeader");
        assert!(err.to_string().contains("channelId"));
    }

    #[test]
    fn test_blank_header_fails() {
        let mut envelope = resolved_envelope("RequestPayerCustomerOwnAccountRetrieve");
        envelope
            .headers
            .insert("channelId".to_string(), "   ".to_string());

        let err = check(&envelope).unwrap_err();
        assert_eq!(err.kind(), "MissingHeader");
    }

    #[test]
    fn test_operation_declared_header_enforced() {
        let mut envelope = resolved_envelope("RequestPayerCustomerOwnAccountRetrieve");
        envelope
            .operation
            .as_mut()
            .unwrap()
            .required_headers
            .push("traceId".to_string());

        let err = check(&envelope).unwrap_err();
        assert!(err.to_string().contains("traceId"));

        envelope
            .headers
            .insert("traceId".to_string(), "t-1".to_string());
        assert!(check(&envelope).is_ok());
    }
}
