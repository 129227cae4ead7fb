//! Avro binary → JSON decoding.

use std::error::Error as StdError;

use apache_avro::types::Value;
use apache_avro::{from_avro_datum, Schema};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Parse Avro binary bytes under `schema` and emit the record's canonical
/// JSON form.
///
/// Truncated input fails with a decode error; bytes that read but do not
/// conform to the schema fail as a type mismatch.
pub fn decode(bytes: &[u8], schema: &Schema) -> Result<String> {
    let mut reader = bytes;
    let value = from_avro_datum(schema, &mut reader, None).map_err(classify_decode_error)?;
    let json = avro_value_to_json(&value)?;
    serde_json::to_string(&json).map_err(Error::from)
}

fn classify_decode_error(err: apache_avro::Error) -> Error {
    if is_truncation(&err) {
        Error::decode(err.to_string())
    } else {
        Error::TypeMismatch(err.to_string())
    }
}

/// Walk the source chain looking for an unexpected-EOF IO error.
fn is_truncation(err: &apache_avro::Error) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::UnexpectedEof {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Convert a generic Avro value into JSON.
///
/// Bytes, fixed and decimal values render as standard base64 so the output
/// matches the textual forms the encoder accepts.
pub(crate) fn avro_value_to_json(value: &Value) -> Result<JsonValue> {
    let json = match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::from(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Long(l) => JsonValue::from(*l),
        Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::String(s) => JsonValue::from(s.clone()),
        Value::Enum(_, symbol) => JsonValue::from(symbol.clone()),
        Value::Bytes(bytes) => JsonValue::from(STANDARD.encode(bytes)),
        Value::Fixed(_, bytes) => JsonValue::from(STANDARD.encode(bytes)),
        Value::Decimal(decimal) => {
            let bytes = <Vec<u8>>::try_from(decimal)
                .map_err(|e| Error::decode(format!("decimal value unreadable: {}", e)))?;
            JsonValue::from(STANDARD.encode(bytes))
        }
        Value::Uuid(uuid) => JsonValue::from(uuid.to_string()),
        Value::Date(days) => JsonValue::from(*days),
        Value::TimeMillis(ms) => JsonValue::from(*ms),
        Value::TimeMicros(us) => JsonValue::from(*us),
        Value::TimestampMillis(ms) => JsonValue::from(*ms),
        Value::TimestampMicros(us) => JsonValue::from(*us),
        Value::LocalTimestampMillis(ms) => JsonValue::from(*ms),
        Value::LocalTimestampMicros(us) => JsonValue::from(*us),
        Value::Union(_, inner) => avro_value_to_json(inner)?,
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(avro_value_to_json(item)?);
            }
            JsonValue::Array(out)
        }
        Value::Map(entries) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in entries {
                out.insert(key.clone(), avro_value_to_json(entry)?);
            }
            JsonValue::Object(out)
        }
        Value::Record(fields) => {
            let mut out = serde_json::Map::new();
            for (name, field) in fields {
                out.insert(name.clone(), avro_value_to_json(field)?);
            }
            JsonValue::Object(out)
        }
        other => {
            return Err(Error::UnsupportedRecordType(format!("{:?}", other)));
        }
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn parse(schema: &str) -> Schema {
        Schema::parse_str(schema).unwrap()
    }

    #[test]
    fn test_truncated_input_is_decode_error() {
        let schema = parse(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "id", "type": "string"},
                {"name": "note", "type": "string"}
            ]}"#,
        );
        let bytes = encode(r#"{"id": "abc", "note": "a longer note"}"#, &schema).unwrap();

        let err = decode(&bytes[..bytes.len() - 4], &schema).unwrap_err();
        assert_eq!(err.kind(), "DecodeError");
    }

    #[test]
    fn test_incompatible_bytes_are_type_mismatch() {
        let writer = parse(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "flag", "type": "boolean"}
            ]}"#,
        );
        let reader = parse(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "flag", "type": {"type": "array", "items": "string"}}
            ]}"#,
        );
        let bytes = encode(r#"{"flag": true}"#, &writer).unwrap();

        // A boolean byte read as an array block count yields garbage.
        let err = decode(&bytes, &reader).unwrap_err();
        assert!(matches!(err.kind(), "TypeMismatch" | "DecodeError"));
    }

    #[test]
    fn test_union_decodes_to_plain_value() {
        let schema = parse(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "v", "type": ["null", "long"], "default": null}
            ]}"#,
        );
        let bytes = encode(r#"{"v": 7}"#, &schema).unwrap();
        let decoded: serde_json::Value =
            serde_json::from_str(&decode(&bytes, &schema).unwrap()).unwrap();
        assert_eq!(decoded, serde_json::json!({"v": 7}));
    }
}
