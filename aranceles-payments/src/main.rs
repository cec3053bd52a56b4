//! Payments service (aranceles-payments) - Main entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use aranceles_common::api::ConsumerHealth;
use aranceles_common::broker::{spawn_consumer, NatsPublisher};
use aranceles_common::config::{ServiceArgs, ServiceConfig};
use aranceles_common::logging::init_tracing;
use aranceles_common::store::{self, MongoStore};
use aranceles_payments::models::Payment;
use aranceles_payments::{build_router, AppState, DEFAULT_PORT, SERVICE_NAME};

/// Command-line arguments for aranceles-payments
#[derive(Parser, Debug)]
#[command(name = "aranceles-payments")]
#[command(about = "Student payments microservice")]
#[command(version)]
struct Args {
    #[command(flatten)]
    service: ServiceArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::resolve(SERVICE_NAME, DEFAULT_PORT, args.service)
        .context("Failed to resolve configuration")?;

    init_tracing(&config.log_level);
    info!(
        "Starting aranceles-payments v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        config.port
    );
    match &config.config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }

    let db = store::connect(&config.mongo)
        .await
        .context("Failed to connect to MongoDB")?;
    let payments = MongoStore::<Payment>::new(&db);
    payments
        .ensure_indexes()
        .await
        .context("Failed to create indexes")?;

    let publisher = NatsPublisher::connect(&config.broker)
        .await
        .context("Failed to create broker publisher")?;

    let consumer = ConsumerHealth::new();
    let state = AppState::new(Arc::new(payments), Arc::new(publisher), consumer.clone());
    spawn_consumer(config.broker.clone(), state.sync_handler(), consumer);

    aranceles_common::server::serve(build_router(state), config.port)
        .await
        .context("Server error")?;
    Ok(())
}
