use crate::config::ConsumerSettings;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use consumer_core::mask::mask_value;
use serde::Serialize;
use std::fmt;

pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

#[derive(Clone, PartialEq, Eq)]
pub struct OAuth2Credentials {
    pub grant_type: &'static str,
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    pub scope: Option<String>,
}

#[derive(Serialize)]
struct CredentialsDocument<'a> {
    #[serde(rename = "type")]
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    issuer_url: &'a str,
}

impl OAuth2Credentials {
    pub fn from_settings(settings: &ConsumerSettings) -> Self {
        Self {
            grant_type: CLIENT_CREDENTIALS_GRANT,
            issuer_url: settings.issuer_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            audience: settings.audience.clone(),
            scope: settings.scope.clone(),
        }
    }

    /// Inline `data:` URL carrying the client credentials document.
    pub fn credentials_url(&self) -> Result<String> {
        let document = CredentialsDocument {
            grant_type: self.grant_type,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            issuer_url: &self.issuer_url,
        };
        let json = serde_json::to_vec(&document).context("serialize oauth2 credentials")?;
        Ok(format!(
            "data:application/json;base64,{}",
            STANDARD.encode(json)
        ))
    }
}

impl fmt::Debug for OAuth2Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Credentials")
            .field("grant_type", &self.grant_type)
            .field("issuer_url", &self.issuer_url)
            .field("client_id", &mask_value(&self.client_id))
            .field("client_secret", &"<redacted>")
            .field("audience", &self.audience)
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn settings() -> ConsumerSettings {
        ConsumerSettings {
            issuer_url: "https://auth.example.com/".to_string(),
            client_id: "client-abcdefgh".to_string(),
            client_secret: "s3cr3t+/=value".to_string(),
            audience: "urn:sn:pulsar:org:instance".to_string(),
            scope: Some("consume".to_string()),
            service_url: "pulsar+ssl://broker.example.com:6651".to_string(),
            topic: "persistent://public/default/events".to_string(),
            subscription: "audit".to_string(),
        }
    }

    #[test]
    fn descriptor_uses_client_credentials_grant() {
        let credentials = OAuth2Credentials::from_settings(&settings());
        assert_eq!(credentials.grant_type, "client_credentials");
        assert_eq!(credentials.audience, "urn:sn:pulsar:org:instance");
        assert_eq!(credentials.scope.as_deref(), Some("consume"));
    }

    #[test]
    fn credentials_url_round_trips_document() {
        let credentials = OAuth2Credentials::from_settings(&settings());
        let url = credentials.credentials_url().expect("encode credentials");
        let encoded = url
            .strip_prefix("data:application/json;base64,")
            .expect("data url prefix");
        let decoded = STANDARD.decode(encoded).expect("valid base64");
        let document: Value = serde_json::from_slice(&decoded).expect("valid json");

        assert_eq!(document["type"], "client_credentials");
        assert_eq!(document["client_id"], "client-abcdefgh");
        assert_eq!(document["client_secret"], "s3cr3t+/=value");
        assert_eq!(document["issuer_url"], "https://auth.example.com/");
    }

    #[test]
    fn debug_output_hides_secret() {
        let credentials = OAuth2Credentials::from_settings(&settings());
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("client-abcdefgh"));
        assert!(rendered.contains("client-a..."));
    }
}
