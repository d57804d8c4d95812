use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("environment file not found: {file} (available: {})", format_available(.available))]
    ConfigFileMissing {
        file: String,
        available: Vec<String>,
    },

    #[error("failed to load environment file {file}")]
    ConfigFileUnreadable {
        file: String,
        #[source]
        source: dotenvy::Error,
    },

    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    #[error("failed to construct pulsar client for {service_url}")]
    ClientConstructionFailed {
        service_url: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to subscribe to topic {topic} as {subscription}")]
    SubscriptionFailed {
        topic: String,
        subscription: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to receive message from {topic}")]
    TransientReceive {
        topic: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to acknowledge message {message_id} on {topic}")]
    AcknowledgeFailed {
        topic: String,
        message_id: String,
        #[source]
        source: BoxError,
    },

    #[error("consumer panicked: {0}")]
    Panicked(String),

    #[error("cleanup step '{step}' failed")]
    Cleanup {
        step: &'static str,
        #[source]
        source: BoxError,
    },
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        return "none".to_string();
    }
    available.join(", ")
}
