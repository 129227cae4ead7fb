//! Wire and header string contracts shared across the gateway.
//!
//! These are stable literals: header names travel on Kafka messages, the
//! scheme prefixes select how schema resources are resolved, and the text
//! patterns govern what the codec accepts for decimal and base64 values.

/// Header carrying the logical schema name of the payload.
pub const HEADER_MESSAGE_SCHEMA: &str = "messageSchema";

/// Header carrying the originating channel identifier.
pub const HEADER_CHANNEL_ID: &str = "channelId";

// DLQ diagnostic headers attached by the funnel.
pub const HEADER_DLQ_SOURCE_TOPIC: &str = "dlqSourceTopic";
pub const HEADER_DLQ_ERROR_KIND: &str = "dlqErrorKind";
pub const HEADER_DLQ_ERROR_MESSAGE: &str = "dlqErrorMessage";
pub const HEADER_DLQ_ERROR_CLASS: &str = "dlqErrorClass";
pub const HEADER_DLQ_FAILED_AT: &str = "dlqFailedAt";

/// Resource reference scheme resolved against the compiled-in resource table.
pub const EMBEDDED_PREFIX: &str = "embedded:";

/// Resource reference scheme resolved against the filesystem.
pub const FILE_PREFIX: &str = "file:";

/// Placeholder substituted into dynamic topic templates.
pub const DATACENTER_PLACEHOLDER: &str = "{datacenter}";

// Resource file extensions.
pub const AVRO_SCHEMA_EXTENSION: &str = ".avsc";
pub const JSON_SCHEMA_EXTENSION: &str = ".json";
pub const TRANSFORM_EXTENSION: &str = ".jsonata";

/// Numeric text accepted for decimal logical values.
pub const DECIMAL_PATTERN: &str = r"^-?\d+(?:\.\d+)?$";

/// Standard base64 text accepted for bytes and decimal values.
pub const BASE64_PATTERN: &str =
    "^([A-Za-z0-9+/]{4})*([A-Za-z0-9+/]{3}=|[A-Za-z0-9+/]{2}==)?$";
