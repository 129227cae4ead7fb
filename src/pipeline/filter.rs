//! Consumer-side messageSchema filter.
//!
//! Messages whose `messageSchema` header is absent or matches no recognized
//! schema are dropped before they ever reach a worker.

use std::collections::HashMap;

use crate::constants::HEADER_MESSAGE_SCHEMA;

/// Decide whether a message passes the schema filter.
pub fn accept(headers: &HashMap<String, String>, recognized: &[String]) -> bool {
    match headers.get(HEADER_MESSAGE_SCHEMA) {
        Some(schema) if !schema.trim().is_empty() => {
            recognized.iter().any(|known| known == schema)
        }
        _ => false,
    }
}
