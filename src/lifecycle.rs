use crate::broker::{BrokerClient, BrokerConnector, Subscription, SubscriptionSpec, TlsPolicy};
use crate::config::ConsumerSettings;
use crate::credentials::OAuth2Credentials;
use crate::error::ConsumerError;
use crate::shutdown::{ShutdownFlag, ShutdownReason, ShutdownTrigger};
use consumer_core::mask::mask_value;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

pub const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Connecting,
    Subscribing,
    Receiving,
    Draining,
    Closed,
    Failed,
}

type SubscriptionOf<C> = <<C as BrokerConnector>::Client as BrokerClient>::Subscription;

/// Owns the broker client and subscription for one process run and sequences
/// connect, subscribe, the receive loop and teardown.
pub struct ConsumerLifecycle<C: BrokerConnector> {
    connector: C,
    state: LifecycleState,
    client: Option<C::Client>,
    subscription: Option<SubscriptionOf<C>>,
    retry_delay: Duration,
    acknowledged: u64,
}

impl<C: BrokerConnector> ConsumerLifecycle<C> {
    pub fn new(connector: C) -> Self {
        Self::with_retry_delay(connector, RECEIVE_RETRY_DELAY)
    }

    pub fn with_retry_delay(connector: C, retry_delay: Duration) -> Self {
        Self {
            connector,
            state: LifecycleState::Idle,
            client: None,
            subscription: None,
            retry_delay,
            acknowledged: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    /// Runs the consumer until shutdown is requested or a fatal error occurs.
    /// A fatal error or panic requests `ShutdownReason::Fatal` on `trigger`.
    /// Resources are always drained before returning.
    pub async fn run<F>(&mut self, lookup: F, trigger: &ShutdownTrigger) -> Result<(), ConsumerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let consumed = AssertUnwindSafe(self.start_and_consume(lookup, trigger.flag()))
            .catch_unwind()
            .await;
        let outcome = consumed.unwrap_or_else(|payload| {
            Err(ConsumerError::Panicked(panic_message(payload.as_ref())))
        });

        if let Err(error) = &outcome {
            error!(error = %error, state = ?self.state, "consumer failed");
            trigger.request(ShutdownReason::Fatal);
        }

        self.drain().await;

        self.state = match outcome {
            Ok(()) => LifecycleState::Closed,
            Err(_) => LifecycleState::Failed,
        };
        outcome
    }

    async fn start_and_consume<F>(
        &mut self,
        lookup: F,
        mut shutdown: ShutdownFlag,
    ) -> Result<(), ConsumerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = ConsumerSettings::from_lookup(lookup)?;
        debug!("all required environment variables are present");

        self.state = LifecycleState::Connecting;
        let connected = tokio::select! {
            biased;
            _ = shutdown.requested() => None,
            client = connect_client(&self.connector, &settings) => Some(client?),
        };
        let Some(client) = connected else {
            info!("shutdown requested while connecting");
            return Ok(());
        };
        let client = self.client.insert(client);

        self.state = LifecycleState::Subscribing;
        let subscribed = tokio::select! {
            biased;
            _ = shutdown.requested() => None,
            subscription = open_subscription(client, &settings) => Some(subscription?),
        };
        let Some(subscription) = subscribed else {
            info!("shutdown requested while subscribing");
            return Ok(());
        };
        self.subscription = Some(subscription);

        self.receive_loop(&mut shutdown).await
    }

    async fn receive_loop(&mut self, shutdown: &mut ShutdownFlag) -> Result<(), ConsumerError> {
        self.state = LifecycleState::Receiving;
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(());
        };

        while !shutdown.is_requested() {
            let received = tokio::select! {
                biased;
                _ = shutdown.requested() => break,
                received = subscription.receive() => received,
            };

            let delivery = match received {
                Ok(delivery) => delivery,
                Err(error) => {
                    if shutdown.is_requested() {
                        break;
                    }
                    error!(error = %format!("{error:#}"), "error receiving message");
                    tokio::select! {
                        biased;
                        _ = shutdown.requested() => break,
                        _ = sleep(self.retry_delay) => continue,
                    }
                }
            };

            let message = &delivery.message;
            info!(
                topic = %message.topic,
                payload = %message.payload_text(),
                message_id = %message.message_id,
                publish_time = %message.publish_time_rfc3339(),
                "received message"
            );

            subscription
                .acknowledge(&delivery.receipt)
                .await
                .map_err(|error| ConsumerError::AcknowledgeFailed {
                    topic: message.topic.clone(),
                    message_id: message.message_id.clone(),
                    source: error.into(),
                })?;
            self.acknowledged = self.acknowledged.saturating_add(1);
        }

        info!(acknowledged = self.acknowledged, "receive loop stopped");
        Ok(())
    }

    /// Best-effort teardown in reverse acquisition order. Every step runs even
    /// when an earlier one fails; a second call is a no-op.
    pub async fn drain(&mut self) {
        if self.subscription.is_none() && self.client.is_none() {
            return;
        }

        self.state = LifecycleState::Draining;
        info!("cleaning up pulsar resources");

        if let Some(mut subscription) = self.subscription.take() {
            match subscription.unsubscribe().await {
                Ok(()) => info!("consumer unsubscribed"),
                Err(error) => log_cleanup_failure("unsubscribe", error),
            }
            match subscription.close().await {
                Ok(()) => info!("consumer closed"),
                Err(error) => log_cleanup_failure("close consumer", error),
            }
        }

        if let Some(mut client) = self.client.take() {
            match client.close().await {
                Ok(()) => info!("pulsar client closed"),
                Err(error) => log_cleanup_failure("close client", error),
            }
        }

        self.state = LifecycleState::Closed;
    }
}

async fn connect_client<C: BrokerConnector>(
    connector: &C,
    settings: &ConsumerSettings,
) -> Result<C::Client, ConsumerError> {
    let credentials = OAuth2Credentials::from_settings(settings);
    info!(
        service_url = %settings.service_url,
        issuer_url = %credentials.issuer_url,
        client_id = %mask_value(&credentials.client_id),
        audience = %credentials.audience,
        scope = credentials.scope.as_deref().unwrap_or("none"),
        "initializing pulsar client with oauth2 authentication"
    );

    connector
        .connect(&settings.service_url, credentials, TlsPolicy::SECURE)
        .await
        .map_err(|error| ConsumerError::ClientConstructionFailed {
            service_url: settings.service_url.clone(),
            source: error.into(),
        })
}

async fn open_subscription<B: BrokerClient>(
    client: &mut B,
    settings: &ConsumerSettings,
) -> Result<B::Subscription, ConsumerError> {
    let spec = SubscriptionSpec::shared_latest(&settings.topic, &settings.subscription);
    let subscription =
        client
            .subscribe(&spec)
            .await
            .map_err(|error| ConsumerError::SubscriptionFailed {
                topic: spec.topic.clone(),
                subscription: spec.subscription.clone(),
                source: error.into(),
            })?;

    info!(
        topic = %spec.topic,
        subscription = %spec.subscription,
        "pulsar consumer created, listening for messages"
    );
    Ok(subscription)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}

fn log_cleanup_failure(step: &'static str, error: anyhow::Error) {
    let error = ConsumerError::Cleanup {
        step,
        source: error.into(),
    };
    let detail = std::error::Error::source(&error)
        .map(ToString::to_string)
        .unwrap_or_default();
    warn!(error = %error, detail = %detail, "error during cleanup");
}
