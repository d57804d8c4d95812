use crate::broker::{
    BrokerClient, BrokerConnector, Delivery, InboundMessage, InitialPosition, Subscription,
    SubscriptionKind, SubscriptionSpec, TlsPolicy,
};
use crate::credentials::OAuth2Credentials;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use pulsar::authentication::oauth2::{OAuth2Authentication, OAuth2Params};
use pulsar::consumer::{InitialPosition as PulsarInitialPosition, Message};
use pulsar::proto::MessageIdData;
use pulsar::{Consumer, ConsumerOptions, Pulsar, SubType, TokioExecutor};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct PulsarConnector;

pub struct PulsarClient {
    pulsar: Option<Pulsar<TokioExecutor>>,
}

pub struct PulsarSubscription {
    consumer: Consumer<Vec<u8>, TokioExecutor>,
    topic: String,
}

#[async_trait]
impl BrokerConnector for PulsarConnector {
    type Client = PulsarClient;

    async fn connect(
        &self,
        service_url: &str,
        credentials: OAuth2Credentials,
        tls: TlsPolicy,
    ) -> Result<Self::Client> {
        let params = OAuth2Params {
            issuer_url: credentials.issuer_url.clone(),
            credentials_url: credentials.credentials_url()?,
            audience: Some(credentials.audience.clone()),
            scope: credentials.scope.clone(),
        };
        drop(credentials);

        let pulsar = Pulsar::builder(service_url, TokioExecutor)
            .with_auth_provider(OAuth2Authentication::client_credentials(params))
            .with_allow_insecure_connection(tls.allow_insecure_connection)
            .with_tls_hostname_verification_enabled(tls.validate_hostname)
            .build()
            .await
            .with_context(|| format!("connect to pulsar at {service_url}"))?;

        Ok(PulsarClient {
            pulsar: Some(pulsar),
        })
    }
}

#[async_trait]
impl BrokerClient for PulsarClient {
    type Subscription = PulsarSubscription;

    async fn subscribe(&mut self, spec: &SubscriptionSpec) -> Result<Self::Subscription> {
        let pulsar = self
            .pulsar
            .as_ref()
            .ok_or_else(|| anyhow!("pulsar client already closed"))?;

        let options = ConsumerOptions {
            initial_position: initial_position(spec.initial_position),
            ..ConsumerOptions::default()
        };

        let consumer: Consumer<Vec<u8>, TokioExecutor> = pulsar
            .consumer()
            .with_topic(&spec.topic)
            .with_subscription(&spec.subscription)
            .with_subscription_type(sub_type(spec.kind))
            .with_options(options)
            .build()
            .await
            .with_context(|| {
                format!(
                    "create pulsar consumer for {} / {}",
                    spec.topic, spec.subscription
                )
            })?;

        Ok(PulsarSubscription {
            consumer,
            topic: spec.topic.clone(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        // The client exposes no explicit close; dropping it tears down its connections.
        if self.pulsar.take().is_some() {
            debug!("pulsar client dropped");
        }
        Ok(())
    }
}

#[async_trait]
impl Subscription for PulsarSubscription {
    type Receipt = Message<Vec<u8>>;

    async fn receive(&mut self) -> Result<Delivery<Self::Receipt>> {
        let message = self
            .consumer
            .try_next()
            .await
            .with_context(|| format!("receive from {}", self.topic))?
            .ok_or_else(|| anyhow!("pulsar consumer stream for {} ended", self.topic))?;

        let inbound = InboundMessage {
            topic: message.topic.clone(),
            payload: message.payload.data.clone(),
            message_id: format_message_id(message.message_id()),
            publish_time_ms: message.metadata().publish_time,
        };

        Ok(Delivery {
            message: inbound,
            receipt: message,
        })
    }

    async fn acknowledge(&mut self, receipt: &Self::Receipt) -> Result<()> {
        self.consumer
            .ack(receipt)
            .await
            .with_context(|| format!("ack message on {}", self.topic))
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.consumer
            .unsubscribe()
            .await
            .with_context(|| format!("unsubscribe from {}", self.topic))
    }

    async fn close(&mut self) -> Result<()> {
        self.consumer
            .close()
            .await
            .with_context(|| format!("close consumer on {}", self.topic))
    }
}

fn sub_type(kind: SubscriptionKind) -> SubType {
    match kind {
        SubscriptionKind::Shared => SubType::Shared,
    }
}

fn initial_position(position: InitialPosition) -> PulsarInitialPosition {
    match position {
        InitialPosition::Latest => PulsarInitialPosition::Latest,
    }
}

fn format_message_id(id: &MessageIdData) -> String {
    format!(
        "{}:{}:{}:{}",
        id.ledger_id,
        id.entry_id,
        id.partition.unwrap_or(-1),
        id.batch_index.unwrap_or(-1)
    )
}
