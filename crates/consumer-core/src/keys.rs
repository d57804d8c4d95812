pub const OAUTH2_ISSUER_URL: &str = "OAUTH2_ISSUER_URL";
pub const OAUTH2_CLIENT_ID: &str = "OAUTH2_CLIENT_ID";
pub const OAUTH2_CLIENT_SECRET: &str = "OAUTH2_CLIENT_SECRET";
pub const OAUTH2_AUDIENCE: &str = "OAUTH2_AUDIENCE";
pub const OAUTH2_SCOPE: &str = "OAUTH2_SCOPE";
pub const PULSAR_SERVICE_URL: &str = "PULSAR_SERVICE_URL";
pub const PULSAR_TOPIC: &str = "PULSAR_TOPIC";
pub const PULSAR_SUBSCRIPTION: &str = "PULSAR_SUBSCRIPTION";

pub const REQUIRED_VARS: [&str; 7] = [
    OAUTH2_ISSUER_URL,
    OAUTH2_CLIENT_ID,
    OAUTH2_CLIENT_SECRET,
    OAUTH2_AUDIENCE,
    PULSAR_SERVICE_URL,
    PULSAR_TOPIC,
    PULSAR_SUBSCRIPTION,
];

pub const OPTIONAL_VARS: [&str; 1] = [OAUTH2_SCOPE];

/// Returns the non-blank value for `name`, treating whitespace-only values as unset.
pub fn present<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|value| !value.trim().is_empty())
}

/// Required variables that are unset or blank, in declaration order.
pub fn missing_required<F>(lookup: &F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    REQUIRED_VARS
        .iter()
        .copied()
        .filter(|name| present(lookup, name).is_none())
        .collect()
}
