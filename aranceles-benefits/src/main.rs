//! Benefits service (aranceles-benefits) - Main entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use aranceles_common::api::ConsumerHealth;
use aranceles_common::broker::{spawn_consumer, NatsPublisher};
use aranceles_common::config::{ServiceArgs, ServiceConfig};
use aranceles_common::logging::init_tracing;
use aranceles_common::store::{self, MongoStore};
use aranceles_benefits::models::Benefit;
use aranceles_benefits::{build_router, AppState, DEFAULT_PORT, SERVICE_NAME};

/// Command-line arguments for aranceles-benefits
#[derive(Parser, Debug)]
#[command(name = "aranceles-benefits")]
#[command(about = "Student benefits microservice")]
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
        "Starting aranceles-benefits v{} on port {}",
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
    let benefits = MongoStore::<Benefit>::new(&db);
    benefits
        .ensure_indexes()
        .await
        .context("Failed to create indexes")?;

    let publisher = NatsPublisher::connect(&config.broker)
        .await
        .context("Failed to create broker publisher")?;

    let consumer = ConsumerHealth::new();
    let state = AppState::new(benefits, Arc::new(publisher), consumer.clone());
    spawn_consumer(config.broker.clone(), state.sync_handler(), consumer);

    aranceles_common::server::serve(build_router(state), config.port)
        .await
        .context("Server error")?;
    Ok(())
}
