//! Error handling module for the gateway.
//!
//! Every pipeline failure is surfaced by kind, not by source exception type:
//! `kind()` returns the stable name that travels on DLQ diagnostic headers,
//! and `routes_to_dlq()` is the predicate the DLQ funnel consults before
//! absorbing an error; ineligible kinds are logged and left for redelivery.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (startup-time fatal, never per-message)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The mandatory messageSchema header is absent
    #[error("Missing messageSchema header")]
    MissingMessageSchema,

    /// A required inbound header is absent or blank
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// The messageSchema header matches no enabled operation
    #[error("Unknown operation for message schema: {0}")]
    UnknownOperation(String),

    /// A schema resource could not be located
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// A schema resource could not be parsed
    #[error("Schema invalid: {0}")]
    SchemaInvalid(String),

    /// Binary payload could not be read (truncated input)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Payload bytes or JSON value do not conform to the record schema
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// JSON null for a union without a null branch
    #[error("null not allowed for this union")]
    NullNotAllowedForUnion,

    /// No union branch matches the JSON value shape
    #[error("No suitable union branch for value: {0}")]
    NoSuitableUnionBranch(String),

    /// Map-typed field fed with non-object JSON
    #[error("Expected map value but got: {0}")]
    ExpectedMap(String),

    /// Array-typed field fed with non-array JSON
    #[error("Expected list value but got: {0}")]
    ExpectedList(String),

    /// Decimal logical type fed with an unsupported JSON form
    #[error("Decimal logical type expects number, base64 or bytes but got: {0}")]
    DecimalTypeMismatch(String),

    /// Bytes type fed with an unsupported JSON form
    #[error("bytes type expects base64 or bytes but got: {0}")]
    BytesTypeMismatch(String),

    /// Schema form the codec does not support
    #[error("Unsupported record type: {0}")]
    UnsupportedRecordType(String),

    /// Logical JSON rejected by the operation's JSON schema
    #[error("Schema validation failed at {path}: {detail}")]
    SchemaValidation { path: String, detail: String },

    /// Declarative transform evaluation failed
    #[error("Transform error: {0}")]
    Transform(String),

    /// JSON could not be re-serialized under the output record schema
    #[error("Encode error: {0}")]
    Encode(String),

    /// Downstream produce failed after client-level retries
    #[error("Produce error: {0}")]
    Produce(String),

    /// Worker deadline exceeded
    #[error("Processing timed out after {0:?}")]
    ProcessingTimeout(Duration),

    /// DLQ produce failed; the message must not be committed
    #[error("DLQ produce error: {0}")]
    DlqProduce(String),

    /// Offset commit failed (logged, never re-raised)
    #[error("Commit error: {0}")]
    Commit(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Kafka client errors outside the produce/commit paths
    #[error("Kafka error: {0}")]
    Kafka(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Error::Decode(msg.into())
    }

    /// Create an encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Error::Encode(msg.into())
    }

    /// Create a transform error
    pub fn transform<S: Into<String>>(msg: S) -> Self {
        Error::Transform(msg.into())
    }

    /// Create a produce error
    pub fn produce<S: Into<String>>(msg: S) -> Self {
        Error::Produce(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Stable kind name, used for DLQ diagnostic headers and assertions
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::MissingMessageSchema => "MissingMessageSchema",
            Error::MissingHeader(_) => "MissingHeader",
            Error::UnknownOperation(_) => "UnknownOperation",
            Error::SchemaNotFound(_) => "SchemaNotFound",
            Error::SchemaInvalid(_) => "SchemaInvalid",
            Error::Decode(_) => "DecodeError",
            Error::TypeMismatch(_) => "TypeMismatch",
            Error::NullNotAllowedForUnion => "NullNotAllowedForUnion",
            Error::NoSuitableUnionBranch(_) => "NoSuitableUnionBranch",
            Error::ExpectedMap(_) => "ExpectedMap",
            Error::ExpectedList(_) => "ExpectedList",
            Error::DecimalTypeMismatch(_) => "DecimalTypeMismatch",
            Error::BytesTypeMismatch(_) => "BytesTypeMismatch",
            Error::UnsupportedRecordType(_) => "UnsupportedRecordType",
            Error::SchemaValidation { .. } => "SchemaValidationError",
            Error::Transform(_) => "TransformError",
            Error::Encode(_) => "EncodeError",
            Error::Produce(_) => "ProduceError",
            Error::ProcessingTimeout(_) => "ProcessingTimeout",
            Error::DlqProduce(_) => "DlqProduceError",
            Error::Commit(_) => "CommitError",
            Error::Serialization(_) => "SerializationError",
            Error::Io(_) => "IoError",
            Error::Kafka(_) => "KafkaError",
            Error::Internal(_) => "InternalError",
        }
    }

    /// Variant name reported as the DLQ "class" diagnostic
    pub fn class_name(&self) -> String {
        format!("Error::{}", self.kind())
    }

    /// Check if this error is absorbed into the DLQ funnel.
    ///
    /// The funnel consults this before producing: DLQ-produce and commit
    /// failures never re-enter it, and configuration errors abort startup
    /// instead.
    pub fn routes_to_dlq(&self) -> bool {
        !matches!(
            self,
            Error::Config(_) | Error::DlqProduce(_) | Error::Commit(_)
        )
    }
}

/// Convert from anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Convert from envconfig::Error to our Error type
impl From<envconfig::Error> for Error {
    fn from(err: envconfig::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convert from rdkafka::error::KafkaError to our Error type
impl From<rdkafka::error::KafkaError> for Error {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Error::Kafka(err.to_string())
    }
}
