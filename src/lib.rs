//! EPortal Gateway Library
//!
//! This library exposes the core modules of the gateway for use in
//! integration tests and as a library for other applications.

pub mod channel;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod kafka;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod test_utils;

// Re-export commonly used types at the crate root
pub use channel::{AppConfig, Channel, Dlq, Flow, Operation, Topics};
pub use config::Config;
pub use error::{Error, Result};
pub use kafka::{CommitHandle, Dispatcher, GatewayProducer, MessagePublisher};
pub use pipeline::{DlqFunnel, Envelope, EnvelopeState, MessagePipeline};
pub use registry::SchemaRegistry;
