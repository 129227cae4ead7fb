//! Logging module for the gateway.
//!
//! Structured logging via tracing: JSON output in production, pretty
//! formatting in development. Per-message logs hang off the `kafka_span!`
//! span so every line carries the envelope's topic/partition/offset.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::error::Result;

/// Initialize the logging system.
///
/// The filter comes from `RUST_LOG` when set, otherwise from the configured
/// log level, with the Kafka client held at warn.
pub fn init_tracing(log_level: &str, environment: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("eportal_gateway={},rdkafka=warn", log_level)));

    let formatting_layer = if environment == "production" {
        fmt::layer()
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    };

    Registry::default()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .map_err(|e| {
            crate::error::Error::internal(format!("Failed to initialize tracing: {}", e))
        })?;

    tracing::info!(
        environment = environment,
        log_level = log_level,
        "Logging initialized"
    );

    Ok(())
}

/// Create a span for Kafka message processing
#[macro_export]
macro_rules! kafka_span {
    ($topic:expr, $partition:expr, $offset:expr) => {
        tracing::info_span!(
            "kafka_message",
            topic = %$topic,
            partition = $partition,
            offset = $offset,
            envelope_id = tracing::field::Empty,
            operation = tracing::field::Empty,
            processing_time_ms = tracing::field::Empty,
        )
    };
}

/// Log an error with context
#[macro_export]
macro_rules! log_error {
    ($error:expr, $msg:expr) => {
        tracing::error!(
            error = %$error,
            error_kind = $error.kind(),
            $msg
        )
    };
    ($error:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::error!(
            error = %$error,
            error_kind = $error.kind(),
            $($key = tracing::field::display(&$value),)*
            $msg
        )
    };
}
