use crate::credentials::OAuth2Credentials;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsPolicy {
    pub allow_insecure_connection: bool,
    pub validate_hostname: bool,
}

impl TlsPolicy {
    pub const SECURE: TlsPolicy = TlsPolicy {
        allow_insecure_connection: false,
        validate_hostname: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialPosition {
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    pub topic: String,
    pub subscription: String,
    pub kind: SubscriptionKind,
    pub initial_position: InitialPosition,
}

impl SubscriptionSpec {
    pub fn shared_latest(topic: &str, subscription: &str) -> Self {
        Self {
            topic: topic.to_string(),
            subscription: subscription.to_string(),
            kind: SubscriptionKind::Shared,
            initial_position: InitialPosition::Latest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub message_id: String,
    pub publish_time_ms: u64,
}

impl InboundMessage {
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn publish_time(&self) -> Option<DateTime<Utc>> {
        if self.publish_time_ms == 0 {
            return None;
        }
        i64::try_from(self.publish_time_ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }

    pub fn publish_time_rfc3339(&self) -> String {
        self.publish_time()
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// A received message together with the handle the broker needs to acknowledge it.
pub struct Delivery<R> {
    pub message: InboundMessage,
    pub receipt: R,
}

#[async_trait]
pub trait BrokerConnector: Send + Sync {
    type Client: BrokerClient;

    async fn connect(
        &self,
        service_url: &str,
        credentials: OAuth2Credentials,
        tls: TlsPolicy,
    ) -> Result<Self::Client>;
}

#[async_trait]
pub trait BrokerClient: Send {
    type Subscription: Subscription;

    async fn subscribe(&mut self, spec: &SubscriptionSpec) -> Result<Self::Subscription>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Subscription: Send {
    type Receipt: Send;

    async fn receive(&mut self) -> Result<Delivery<Self::Receipt>>;

    async fn acknowledge(&mut self, receipt: &Self::Receipt) -> Result<()>;

    async fn unsubscribe(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}
