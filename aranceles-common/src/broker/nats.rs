//! NATS JetStream transport
//!
//! One stream (default `ARANCELES`) stores every entity subject. Each
//! service owns a durable pull consumer named after itself, filtered to
//! `<service>.*.*`, so redelivery state survives restarts.

use std::sync::Arc;

use async_nats::jetstream::{self, consumer, stream, AckKind, Context};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{retry_fixed, EventPublisher};
use crate::api::{ConsumerHealth, ConsumerStatus};
use crate::config::BrokerSettings;
use crate::events::DomainEvent;
use crate::sync::{dispatch, Disposition, SyncHandler};
use crate::{Error, Result};

async fn connect_once(settings: &BrokerSettings) -> Result<async_nats::Client> {
    async_nats::ConnectOptions::new()
        .name(&settings.service)
        .connection_timeout(settings.connect_delay)
        .connect(settings.url.as_str())
        .await
        .map_err(Error::broker)
}

/// Connect with the configured fixed-delay retry budget
async fn connect_with_retry(settings: &BrokerSettings) -> Result<async_nats::Client> {
    let client = retry_fixed(
        "broker connect",
        settings.connect_attempts,
        settings.connect_delay,
        || connect_once(settings),
    )
    .await?;
    info!(url = %settings.url, service = %settings.service, "Connected to NATS");
    Ok(client)
}

/// Create the shared stream if missing
async fn ensure_stream(js: &Context, settings: &BrokerSettings) -> Result<stream::Stream> {
    js.get_or_create_stream(stream::Config {
        name: settings.stream.clone(),
        subjects: settings.stream_subjects(),
        storage: stream::StorageType::File,
        retention: stream::RetentionPolicy::Limits,
        ..Default::default()
    })
    .await
    .map_err(Error::broker)
}

/// [`EventPublisher`] publishing to JetStream and awaiting the stream ack
#[derive(Clone)]
pub struct NatsPublisher {
    js: Context,
}

impl NatsPublisher {
    /// Start a client that keeps retrying in the background
    ///
    /// Startup does not block on the broker; publishes fail (500) until the
    /// connection comes up.
    pub async fn connect(settings: &BrokerSettings) -> Result<Self> {
        let client = async_nats::ConnectOptions::new()
            .name(format!("{}-publisher", settings.service))
            .retry_on_initial_connect()
            .connect(settings.url.as_str())
            .await
            .map_err(Error::broker)?;
        Ok(Self {
            js: jetstream::new(client),
        })
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let ack = self
            .js
            .publish(event.subject(), event.payload()?.into())
            .await
            .map_err(Error::broker)?;
        let ack = ack.await.map_err(Error::broker)?;
        debug!(subject = %event.key, stream = %ack.stream, sequence = ack.sequence, "Publish acknowledged");
        Ok(())
    }
}

fn ack_kind(disposition: &Disposition, settings: &BrokerSettings) -> AckKind {
    match disposition {
        Disposition::Applied | Disposition::AlreadyApplied | Disposition::SelfOrigin => {
            AckKind::Ack
        }
        Disposition::Retry(_) => AckKind::Nak(Some(settings.nak_delay)),
        Disposition::Reject(_) => AckKind::Term,
    }
}

/// Bind the durable consumer and process messages until the stream ends
async fn consume(
    client: async_nats::Client,
    settings: &BrokerSettings,
    handler: &dyn SyncHandler,
    health: &ConsumerHealth,
) -> Result<()> {
    let js = jetstream::new(client);
    let stream = ensure_stream(&js, settings).await?;

    let consumer = stream
        .get_or_create_consumer(
            &settings.service,
            consumer::pull::Config {
                durable_name: Some(settings.service.clone()),
                filter_subject: settings.filter_subject(),
                ack_policy: consumer::AckPolicy::Explicit,
                ack_wait: settings.ack_wait,
                max_deliver: settings.max_deliver,
                ..Default::default()
            },
        )
        .await
        .map_err(Error::broker)?;

    let mut messages = consumer.messages().await.map_err(Error::broker)?;
    health.set(ConsumerStatus::Running).await;
    info!(
        consumer = %settings.service,
        filter = %settings.filter_subject(),
        "Consuming events"
    );

    while let Some(message) = messages.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to receive message");
                continue;
            }
        };

        let subject = message.subject.to_string();
        let disposition = dispatch(handler, &subject, &message.payload).await;
        if let Err(e) = message.ack_with(ack_kind(&disposition, settings)).await {
            warn!(subject = %subject, error = %e, "Failed to acknowledge message");
        }
    }

    Ok(())
}

/// Spawn the background consumer worker
///
/// The worker reconnects when the message stream ends. When the connect
/// budget is exhausted it records [`ConsumerStatus::Failed`] and exits.
pub fn spawn_consumer(
    settings: BrokerSettings,
    handler: Arc<dyn SyncHandler>,
    health: ConsumerHealth,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            health.set(ConsumerStatus::Connecting).await;

            let client = match connect_with_retry(&settings).await {
                Ok(client) => client,
                Err(e) => {
                    error!(
                        url = %settings.url,
                        attempts = settings.connect_attempts,
                        error = %e,
                        "Event consumer giving up; remote events will not be applied"
                    );
                    health.set(ConsumerStatus::Failed).await;
                    return;
                }
            };

            match consume(client, &settings, handler.as_ref(), &health).await {
                Ok(()) => warn!("Message stream ended, reconnecting"),
                Err(e) => warn!(error = %e, "Consumer error, reconnecting"),
            }
            tokio::time::sleep(settings.connect_delay).await;
        }
    })
}
