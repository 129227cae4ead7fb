//! EPortal Gateway - a stateless Kafka message-transformation gateway
//!
//! Consumes orchestrator request envelopes, re-shapes their Avro payloads
//! for the EPortal backend, and symmetrically re-shapes EPortal responses
//! for the orchestrator, with manual-commit at-least-once delivery and a
//! per-datacenter DLQ.

use std::sync::Arc;

use eportal_gateway::channel::AppConfig;
use eportal_gateway::config::Config;
use eportal_gateway::error::Result;
use eportal_gateway::kafka::{Dispatcher, GatewayProducer};
use eportal_gateway::registry::SchemaRegistry;
use eportal_gateway::{logging, MessagePublisher};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Arc::new(Config::from_env()?);
    config.validate()?;

    // Initialize logging/tracing
    logging::init_tracing(&config.gateway.log_level, &config.gateway.environment)?;
    config.log_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting EPortal gateway"
    );

    // Invalid channel configuration is fatal, never a per-message error.
    let channels = Arc::new(AppConfig::from_file(&config.gateway.channel_config_path)?);
    channels.validate()?;

    let registry = Arc::new(SchemaRegistry::new(config.gateway.schema_location.clone()));
    let producer = GatewayProducer::new(&config.kafka)?;
    let publisher: Arc<dyn MessagePublisher> = Arc::new(producer.clone());

    let dispatcher = Dispatcher::new(
        Arc::clone(&config),
        channels,
        registry,
        publisher,
    );
    dispatcher.run().await?;

    producer.flush()?;
    tracing::info!("Gateway shutdown complete");
    Ok(())
}
