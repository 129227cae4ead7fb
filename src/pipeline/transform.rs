//! Transform stage: JSON-schema validation followed by the operation's
//! declarative JSONata mapping.
//!
//! Inbound headers are snapshotted before the transform and restored
//! afterwards, so business headers survive with their original case no
//! matter what the expression does.

use bumpalo::Bump;
use jsonata_rs::JsonAta;
use tracing::debug;

use crate::error::{Error, Result};
use crate::pipeline::envelope::{Envelope, EnvelopeState};
use crate::registry::SchemaRegistry;

/// Validate and transform the decoded payload JSON.
pub fn apply(envelope: &mut Envelope, registry: &SchemaRegistry) -> Result<()> {
    let operation = envelope
        .operation
        .as_ref()
        .ok_or_else(|| Error::internal("transform before resolution"))?
        .clone();
    let payload_json = envelope
        .payload_json
        .as_ref()
        .ok_or_else(|| Error::internal("transform before decode"))?
        .clone();

    // Snapshot inbound headers for post-transform restoration.
    envelope.original_headers = Some(envelope.headers.clone());

    validate(&payload_json, &operation.json_schema, registry)?;

    let expr = registry.transform_expr(&operation.transform_expr)?;
    let transformed = evaluate(&expr, &payload_json)?;

    debug!(
        envelope_id = %envelope.id,
        operation = %operation.name,
        "Payload validated and transformed"
    );

    envelope.transformed_json = Some(transformed);
    envelope.restore_headers();
    envelope.state = EnvelopeState::Transformed;
    Ok(())
}

/// Re-validation hook: forward operations may declare their own JSON schema
/// which is applied to the transformed payload before encoding.
pub(crate) fn revalidate(
    transformed_json: &str,
    schema_name: &str,
    registry: &SchemaRegistry,
) -> Result<()> {
    validate(transformed_json, schema_name, registry)
}

/// Apply the operation's JSON schema to the decoded payload.
fn validate(payload_json: &str, schema_name: &str, registry: &SchemaRegistry) -> Result<()> {
    let validator = registry.json_validator(schema_name)?;
    let instance: serde_json::Value = serde_json::from_str(payload_json)?;

    if let Some(error) = validator.iter_errors(&instance).next() {
        return Err(Error::SchemaValidation {
            path: error.instance_path.to_string(),
            detail: error.to_string(),
        });
    }
    Ok(())
}

/// Evaluate a JSONata expression against a JSON document.
fn evaluate(expr: &str, input: &str) -> Result<String> {
    let arena = Bump::new();
    let jsonata = JsonAta::new(expr, &arena).map_err(|e| Error::transform(e.to_string()))?;
    let result = jsonata
        .evaluate(Some(input), None)
        .map_err(|e| Error::transform(e.to_string()))?;
    Ok(result.serialize(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Flow;
    use crate::pipeline::resolver;
    use crate::test_utils::{request_envelope, sample_channel, sample_registry};

    fn transformed_envelope(payload_json: &str) -> Result<Envelope> {
        let channel = sample_channel();
        let registry = sample_registry();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve");
        resolver::resolve(&mut envelope, "BNE", &channel, Flow::Request).unwrap();
        envelope.payload_json = Some(payload_json.to_string());
        apply(&mut envelope, &registry)?;
        Ok(envelope)
    }

    #[test]
    fn test_transform_reshapes_payload() {
        let envelope = transformed_envelope(
            r#"{"messageId": "m-1", "customerId": "c-9",
                "accountNumber": "00123", "branchCode": "777",
                "requestTimestamp": "2026-08-02T10:00:00Z"}"#,
        )
        .unwrap();

        let out: serde_json::Value =
            serde_json::from_str(envelope.transformed_json.as_ref().unwrap()).unwrap();
        assert_eq!(out["requestHeader"]["requestId"], "m-1");
        assert_eq!(out["payerQuery"]["customerNumber"], "c-9");
        assert_eq!(out["payerQuery"]["accountNumber"], "00123");
        assert_eq!(envelope.state, EnvelopeState::Transformed);
    }

    #[test]
    fn test_schema_violation_reports_path() {
        let err = transformed_envelope(
            r#"{"messageId": "m-1", "requestTimestamp": "2026-08-02T10:00:00Z"}"#,
        )
        .unwrap_err();

        assert_eq!(err.kind(), "SchemaValidationError");
        assert!(err.to_string().contains("customerId"));
    }

    #[test]
    fn test_headers_survive_transform() {
        let envelope = transformed_envelope(
            r#"{"messageId": "m-1", "customerId": "c-9",
                "requestTimestamp": "2026-08-02T10:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(
            envelope.headers.get("channelId").map(String::as_str),
            Some("BNE")
        );
        assert!(envelope.original_headers.is_some());
    }

    #[test]
    fn test_broken_expression_is_transform_error() {
        let err = evaluate("{ \"a\": $nosuchfn(1) }", "{}").unwrap_err();
        assert_eq!(err.kind(), "TransformError");
    }

    #[test]
    fn test_revalidation_hook_rejects_bad_output() {
        let registry = sample_registry();
        let schema = r#"{"type": "object", "required": ["requestHeader"]}"#;

        assert!(revalidate(r#"{"requestHeader": {}}"#, schema, &registry).is_ok());

        let err = revalidate(r#"{"other": 1}"#, schema, &registry).unwrap_err();
        assert_eq!(err.kind(), "SchemaValidationError");
    }
}
