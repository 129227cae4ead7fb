//! JSON → Avro binary encoding.
//!
//! The converter walks the schema rather than the value, so union branch
//! selection, decimal scaling and byte decoding are all schema-directed.

use std::collections::HashMap;

use apache_avro::types::Value;
use apache_avro::{to_avro_datum, Decimal, Schema};
use base64::{engine::general_purpose::STANDARD, Engine};
use num_bigint::BigInt;
use serde_json::Value as JsonValue;

use super::{base64_regex, decimal_regex, json_kind};
use crate::error::{Error, Result};

/// Parse a JSON document through the schema-aware converter and emit its
/// Avro binary encoding.
pub fn encode(json: &str, schema: &Schema) -> Result<Vec<u8>> {
    let parsed: JsonValue = serde_json::from_str(json)
        .map_err(|e| Error::encode(format!("payload is not valid JSON: {}", e)))?;
    let value = json_to_avro(&parsed, schema)?;
    to_avro_datum(schema, value).map_err(|e| Error::encode(e.to_string()))
}

/// Convert a JSON value into a generic Avro value under `schema`.
pub(crate) fn json_to_avro(json: &JsonValue, schema: &Schema) -> Result<Value> {
    match schema {
        Schema::Null => match json {
            JsonValue::Null => Ok(Value::Null),
            other => Err(Error::TypeMismatch(format!(
                "null schema expects null, got {}",
                json_kind(other)
            ))),
        },

        Schema::Boolean => json
            .as_bool()
            .map(Value::Boolean)
            .ok_or_else(|| type_mismatch("boolean", json)),

        Schema::Int => int_from_json(json)
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Int)
            .ok_or_else(|| type_mismatch("int", json)),

        Schema::Long => int_from_json(json)
            .map(Value::Long)
            .ok_or_else(|| type_mismatch("long", json)),

        Schema::Float => json
            .as_f64()
            .map(|f| Value::Float(f as f32))
            .ok_or_else(|| type_mismatch("float", json)),

        Schema::Double => json
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| type_mismatch("double", json)),

        Schema::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| type_mismatch("string", json)),

        Schema::Bytes => bytes_from_json(json)
            .map(Value::Bytes)
            .ok_or_else(|| Error::BytesTypeMismatch(json_kind(json).to_string())),

        Schema::Fixed(fixed) => {
            let bytes = bytes_from_json(json)
                .ok_or_else(|| Error::BytesTypeMismatch(json_kind(json).to_string()))?;
            if bytes.len() != fixed.size {
                return Err(Error::encode(format!(
                    "fixed {} expects {} bytes, got {}",
                    fixed.name,
                    fixed.size,
                    bytes.len()
                )));
            }
            Ok(Value::Fixed(fixed.size, bytes))
        }

        Schema::Enum(symbols) => {
            let text = json.as_str().ok_or_else(|| type_mismatch("enum", json))?;
            symbols
                .symbols
                .iter()
                .position(|s| s == text)
                .map(|idx| Value::Enum(idx as u32, text.to_string()))
                .ok_or_else(|| {
                    Error::TypeMismatch(format!("enum {} has no symbol {}", symbols.name, text))
                })
        }

        Schema::Decimal(decimal) => decimal_from_json(json, decimal.scale),

        Schema::Uuid => {
            let text = json.as_str().ok_or_else(|| type_mismatch("uuid", json))?;
            uuid::Uuid::parse_str(text)
                .map(Value::Uuid)
                .map_err(|e| Error::TypeMismatch(format!("uuid: {}", e)))
        }

        Schema::Date => int_from_json(json)
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Date)
            .ok_or_else(|| type_mismatch("date", json)),

        Schema::TimeMillis => int_from_json(json)
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::TimeMillis)
            .ok_or_else(|| type_mismatch("time-millis", json)),

        Schema::TimeMicros => int_from_json(json)
            .map(Value::TimeMicros)
            .ok_or_else(|| type_mismatch("time-micros", json)),

        Schema::TimestampMillis => int_from_json(json)
            .map(Value::TimestampMillis)
            .ok_or_else(|| type_mismatch("timestamp-millis", json)),

        Schema::TimestampMicros => int_from_json(json)
            .map(Value::TimestampMicros)
            .ok_or_else(|| type_mismatch("timestamp-micros", json)),

        Schema::LocalTimestampMillis => int_from_json(json)
            .map(Value::LocalTimestampMillis)
            .ok_or_else(|| type_mismatch("local-timestamp-millis", json)),

        Schema::LocalTimestampMicros => int_from_json(json)
            .map(Value::LocalTimestampMicros)
            .ok_or_else(|| type_mismatch("local-timestamp-micros", json)),

        Schema::Union(union) => {
            let variants = union.variants();
            if json.is_null() {
                let index = variants
                    .iter()
                    .position(|branch| matches!(branch, Schema::Null))
                    .ok_or(Error::NullNotAllowedForUnion)?;
                return Ok(Value::Union(index as u32, Box::new(Value::Null)));
            }
            for (index, branch) in variants.iter().enumerate() {
                if matches!(branch, Schema::Null) {
                    continue;
                }
                if let Ok(value) = json_to_avro(json, branch) {
                    return Ok(Value::Union(index as u32, Box::new(value)));
                }
            }
            Err(Error::NoSuitableUnionBranch(format!(
                "{} value {}",
                json_kind(json),
                json
            )))
        }

        Schema::Array(items) => {
            let entries = json
                .as_array()
                .ok_or_else(|| Error::ExpectedList(json_kind(json).to_string()))?;
            let mut out = Vec::with_capacity(entries.len());
            for entry in entries {
                out.push(json_to_avro(entry, items)?);
            }
            Ok(Value::Array(out))
        }

        Schema::Map(values) => {
            let entries = json
                .as_object()
                .ok_or_else(|| Error::ExpectedMap(json_kind(json).to_string()))?;
            let mut out = HashMap::with_capacity(entries.len());
            for (key, entry) in entries {
                out.insert(key.clone(), json_to_avro(entry, values)?);
            }
            Ok(Value::Map(out))
        }

        Schema::Record(record) => {
            let object = json.as_object().ok_or_else(|| {
                Error::TypeMismatch(format!(
                    "record {} expects object, got {}",
                    record.name,
                    json_kind(json)
                ))
            })?;
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let value = match object.get(&field.name) {
                    Some(entry) => json_to_avro(entry, &field.schema)?,
                    None => missing_field_value(field)?,
                };
                fields.push((field.name.clone(), value));
            }
            Ok(Value::Record(fields))
        }

        Schema::Ref { name } => Err(Error::UnsupportedRecordType(name.to_string())),

        other => Err(Error::UnsupportedRecordType(format!("{:?}", other))),
    }
}

/// Value for a record field absent from the JSON object: the declared
/// default, then the null branch of a nullable union.
fn missing_field_value(field: &apache_avro::schema::RecordField) -> Result<Value> {
    if let Some(default) = &field.default {
        return json_to_avro(default, &field.schema);
    }
    if let Schema::Union(union) = &field.schema {
        if let Some(index) = union
            .variants()
            .iter()
            .position(|branch| matches!(branch, Schema::Null))
        {
            return Ok(Value::Union(index as u32, Box::new(Value::Null)));
        }
    }
    Err(Error::encode(format!(
        "missing value for field {}",
        field.name
    )))
}

fn type_mismatch(expected: &str, json: &JsonValue) -> Error {
    Error::TypeMismatch(format!("expected {} but got {}", expected, json_kind(json)))
}

fn int_from_json(json: &JsonValue) -> Option<i64> {
    json.as_i64()
}

/// Accept base64 text or a JSON array of byte numbers.
fn bytes_from_json(json: &JsonValue) -> Option<Vec<u8>> {
    match json {
        JsonValue::String(text) if base64_regex().is_match(text) => STANDARD.decode(text).ok(),
        JsonValue::Array(entries) => entries
            .iter()
            .map(|entry| entry.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        _ => None,
    }
}

/// Decimal logical type: numeric literal, base64 text or raw byte sequence.
fn decimal_from_json(json: &JsonValue, scale: usize) -> Result<Value> {
    match json {
        JsonValue::Number(number) => decimal_from_text(&number.to_string(), scale),
        JsonValue::String(text) if decimal_regex().is_match(text) => {
            decimal_from_text(text, scale)
        }
        JsonValue::String(text) if base64_regex().is_match(text) => {
            let bytes = STANDARD
                .decode(text)
                .map_err(|e| Error::DecimalTypeMismatch(format!("base64: {}", e)))?;
            Ok(Value::Decimal(Decimal::from(bytes)))
        }
        JsonValue::Array(_) => bytes_from_json(json)
            .map(|bytes| Value::Decimal(Decimal::from(bytes)))
            .ok_or_else(|| Error::DecimalTypeMismatch("array".to_string())),
        other => Err(Error::DecimalTypeMismatch(json_kind(other).to_string())),
    }
}

/// Scale a decimal text literal into its two's-complement unscaled form.
fn decimal_from_text(text: &str, scale: usize) -> Result<Value> {
    if !decimal_regex().is_match(text) {
        return Err(Error::DecimalTypeMismatch(format!("number {}", text)));
    }

    let (integral, fraction) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    if fraction.len() > scale {
        return Err(Error::DecimalTypeMismatch(format!(
            "{} has more than {} fractional digits",
            text, scale
        )));
    }

    let mut unscaled = String::with_capacity(integral.len() + scale);
    unscaled.push_str(integral);
    unscaled.push_str(fraction);
    for _ in 0..(scale - fraction.len()) {
        unscaled.push('0');
    }

    let big: BigInt = unscaled
        .parse()
        .map_err(|e| Error::DecimalTypeMismatch(format!("{}: {}", text, e)))?;
    Ok(Value::Decimal(Decimal::from(big.to_signed_bytes_be())))
}
