//! Bidirectional Avro binary ↔ JSON conversion driven by a record schema.
//!
//! `decode` reads Avro binary bytes into a generic record and emits its
//! canonical JSON form; `encode` reads JSON through a schema-aware converter
//! and emits Avro binary. The encoder resolves unions by value shape and
//! accepts the textual forms (base64, numeric decimal) that travel on the
//! wire contract.

mod decode;
mod encode;

pub use decode::decode;
pub use encode::encode;

use std::sync::OnceLock;

use regex::Regex;

use crate::constants::{BASE64_PATTERN, DECIMAL_PATTERN};

// Lazy static text patterns shared by the encoder.
static DECIMAL_REGEX: OnceLock<Regex> = OnceLock::new();
static BASE64_REGEX: OnceLock<Regex> = OnceLock::new();

/// Get or initialize the decimal text pattern
pub(crate) fn decimal_regex() -> &'static Regex {
    DECIMAL_REGEX
        .get_or_init(|| Regex::new(DECIMAL_PATTERN).expect("Invalid decimal regex pattern"))
}

/// Get or initialize the base64 text pattern
pub(crate) fn base64_regex() -> &'static Regex {
    BASE64_REGEX.get_or_init(|| Regex::new(BASE64_PATTERN).expect("Invalid base64 regex pattern"))
}

/// Describe a JSON value's type for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
