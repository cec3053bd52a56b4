//! Debts service (aranceles-debts) - Main entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use aranceles_common::api::ConsumerHealth;
use aranceles_common::broker::{spawn_consumer, NatsPublisher};
use aranceles_common::config::{ServiceArgs, ServiceConfig};
use aranceles_common::logging::init_tracing;
use aranceles_common::store::{self, MongoStore};
use aranceles_debts::models::{Debt, Enrollment};
use aranceles_debts::{build_router, AppState, DEFAULT_PORT, SERVICE_NAME};

/// Command-line arguments for aranceles-debts
#[derive(Parser, Debug)]
#[command(name = "aranceles-debts")]
#[command(about = "Student debts and enrollments microservice")]
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
        "Starting aranceles-debts v{} on port {}",
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
    let debts = MongoStore::<Debt>::new(&db);
    let enrollments = MongoStore::<Enrollment>::new(&db);
    debts
        .ensure_indexes()
        .await
        .context("Failed to create debt indexes")?;
    enrollments
        .ensure_indexes()
        .await
        .context("Failed to create enrollment indexes")?;

    let publisher = NatsPublisher::connect(&config.broker)
        .await
        .context("Failed to create broker publisher")?;

    let consumer = ConsumerHealth::new();
    let state = AppState::new(
        Arc::new(debts),
        Arc::new(enrollments),
        Arc::new(publisher),
        consumer.clone(),
    );
    spawn_consumer(config.broker.clone(), state.sync_handler(), consumer);

    aranceles_common::server::serve(build_router(state), config.port)
        .await
        .context("Server error")?;
    Ok(())
}
