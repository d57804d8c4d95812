use crate::error::ConsumerError;
use consumer_core::keys::{self, missing_required, present};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const ENVIRONMENT_VAR: &str = "CONSUMER_ENV";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedEnvironment {
    pub environment: String,
    pub env_file: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    pub scope: Option<String>,
    pub service_url: String,
    pub topic: String,
    pub subscription: String,
}

impl ConsumerSettings {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConsumerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing = missing_required(&lookup);
        if !missing.is_empty() {
            return Err(ConsumerError::MissingConfiguration(
                missing.into_iter().map(ToString::to_string).collect(),
            ));
        }

        let required = |name: &str| present(&lookup, name).unwrap_or_default();

        Ok(Self {
            issuer_url: required(keys::OAUTH2_ISSUER_URL),
            client_id: required(keys::OAUTH2_CLIENT_ID),
            client_secret: required(keys::OAUTH2_CLIENT_SECRET),
            audience: required(keys::OAUTH2_AUDIENCE),
            scope: present(&lookup, keys::OAUTH2_SCOPE),
            service_url: required(keys::PULSAR_SERVICE_URL),
            topic: required(keys::PULSAR_TOPIC),
            subscription: required(keys::PULSAR_SUBSCRIPTION),
        })
    }
}

pub fn resolve_environment_name(cli_override: Option<&str>, process_value: Option<&str>) -> String {
    [cli_override, process_value]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ENVIRONMENT)
        .to_string()
}

pub fn env_file_for(environment: &str) -> Option<&'static str> {
    match environment.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" => Some(".env.dev"),
        "qa" => Some(".env.qa"),
        "stage" | "staging" => Some(".env.stage"),
        "production" | "prod" => Some(".env.prod"),
        _ => None,
    }
}

pub fn resolve_env_file(environment: &str) -> &'static str {
    env_file_for(environment).unwrap_or_else(|| {
        warn!(
            environment,
            fallback = DEFAULT_ENV_FILE,
            "unknown environment, falling back to default env file"
        );
        DEFAULT_ENV_FILE
    })
}

pub fn available_env_files(config_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(config_dir) else {
        return Vec::new();
    };

    let mut files = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(DEFAULT_ENV_FILE))
        .collect::<Vec<_>>();
    files.sort();

    files
        .into_iter()
        .map(|name| {
            let label = env_file_label(&name);
            format!("{name} ({label})")
        })
        .collect()
}

fn env_file_label(file_name: &str) -> &str {
    if file_name == DEFAULT_ENV_FILE {
        return "default";
    }
    file_name
        .strip_prefix(".env.")
        .unwrap_or(file_name)
}

/// Loads the env file selected for this run into the process environment.
/// Variables already present in the process environment keep their values.
pub fn load_environment(
    config_dir: &Path,
    cli_override: Option<&str>,
) -> Result<LoadedEnvironment, ConsumerError> {
    let process_value = env::var(ENVIRONMENT_VAR).ok();
    let environment = resolve_environment_name(cli_override, process_value.as_deref());
    info!(environment = %environment, "loading configuration");

    let env_file = resolve_env_file(&environment);
    let path = config_dir.join(env_file);

    if !path.is_file() {
        let available = available_env_files(config_dir);
        error!(
            file = env_file,
            config_dir = %config_dir.display(),
            "environment file not found"
        );
        for candidate in &available {
            info!(candidate = %candidate, "available environment file");
        }
        return Err(ConsumerError::ConfigFileMissing {
            file: env_file.to_string(),
            available,
        });
    }

    dotenvy::from_path(&path).map_err(|source| ConsumerError::ConfigFileUnreadable {
        file: env_file.to_string(),
        source,
    })?;

    info!(file = env_file, "loaded configuration");

    Ok(LoadedEnvironment {
        environment,
        env_file: env_file.to_string(),
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use consumer_core::keys::REQUIRED_VARS;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn full_lookup() -> HashMap<String, String> {
        REQUIRED_VARS
            .iter()
            .map(|name| (name.to_string(), format!("{}-value", name.to_ascii_lowercase())))
            .collect()
    }

    #[test]
    fn cli_override_wins_over_process_value() {
        assert_eq!(resolve_environment_name(Some("qa"), Some("prod")), "qa");
        assert_eq!(resolve_environment_name(None, Some("prod")), "prod");
        assert_eq!(resolve_environment_name(None, None), DEFAULT_ENVIRONMENT);
    }

    #[test]
    fn blank_values_fall_through_to_next_source() {
        assert_eq!(resolve_environment_name(Some(""), Some("stage")), "stage");
        assert_eq!(resolve_environment_name(Some("  "), Some("")), DEFAULT_ENVIRONMENT);
    }

    #[test]
    fn table_maps_every_known_name() {
        let cases = [
            ("development", ".env.dev"),
            ("dev", ".env.dev"),
            ("qa", ".env.qa"),
            ("stage", ".env.stage"),
            ("staging", ".env.stage"),
            ("production", ".env.prod"),
            ("prod", ".env.prod"),
            ("PROD", ".env.prod"),
        ];
        for (environment, file) in cases {
            assert_eq!(resolve_env_file(environment), file, "{environment}");
        }
    }

    #[test]
    fn unknown_names_fall_back_to_default_file() {
        assert_eq!(env_file_for("sandbox"), None);
        assert_eq!(resolve_env_file("sandbox"), DEFAULT_ENV_FILE);
        assert_eq!(resolve_env_file(""), DEFAULT_ENV_FILE);
    }

    #[test]
    fn available_files_are_sorted_and_labelled() {
        let dir = tempdir().expect("tempdir");
        for name in [".env.prod", ".env", ".env.dev", "README.md"] {
            fs::write(dir.path().join(name), "").expect("write fixture");
        }

        assert_eq!(
            available_env_files(dir.path()),
            vec![
                ".env (default)".to_string(),
                ".env.dev (dev)".to_string(),
                ".env.prod (prod)".to_string(),
            ]
        );
    }

    #[test]
    fn missing_qa_file_lists_available_files() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join(".env.dev"), "PULSAR_TOPIC=dev\n").expect("write fixture");

        let error = load_environment(dir.path(), Some("qa")).expect_err("qa file is absent");
        match error {
            ConsumerError::ConfigFileMissing { file, available } => {
                assert_eq!(file, ".env.qa");
                assert_eq!(available, vec![".env.dev (dev)".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loads_selected_file_without_overriding_process_values() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join(".env.stage"),
            "TOPIC_CONSUMER_TEST_STAGE_ONLY=from-file\nPATH=from-file\n",
        )
        .expect("write fixture");

        let original_path = env::var("PATH").ok();
        let loaded = load_environment(dir.path(), Some("staging")).expect("load stage file");

        assert_eq!(loaded.environment, "staging");
        assert_eq!(loaded.env_file, ".env.stage");
        assert_eq!(loaded.path, dir.path().join(".env.stage"));
        assert_eq!(
            env::var("TOPIC_CONSUMER_TEST_STAGE_ONLY").as_deref(),
            Ok("from-file")
        );
        assert_eq!(env::var("PATH").ok(), original_path);
    }

    #[test]
    fn settings_require_every_key() {
        let values = full_lookup();
        let settings = ConsumerSettings::from_lookup(|name| values.get(name).cloned())
            .expect("all keys present");
        assert_eq!(settings.topic, "pulsar_topic-value");
        assert_eq!(settings.subscription, "pulsar_subscription-value");
        assert_eq!(settings.scope, None);
    }

    #[test]
    fn settings_report_exact_missing_names() {
        let mut values = full_lookup();
        values.remove(keys::OAUTH2_AUDIENCE);
        values.insert(keys::PULSAR_TOPIC.to_string(), " ".to_string());

        let error = ConsumerSettings::from_lookup(|name| values.get(name).cloned())
            .expect_err("two keys missing");
        match error {
            ConsumerError::MissingConfiguration(missing) => assert_eq!(
                missing,
                vec![
                    keys::OAUTH2_AUDIENCE.to_string(),
                    keys::PULSAR_TOPIC.to_string()
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_scope_is_treated_as_absent() {
        let mut values = full_lookup();
        values.insert(keys::OAUTH2_SCOPE.to_string(), "  ".to_string());
        let settings = ConsumerSettings::from_lookup(|name| values.get(name).cloned())
            .expect("all keys present");
        assert_eq!(settings.scope, None);

        values.insert(keys::OAUTH2_SCOPE.to_string(), "consume".to_string());
        let settings = ConsumerSettings::from_lookup(|name| values.get(name).cloned())
            .expect("all keys present");
        assert_eq!(settings.scope.as_deref(), Some("consume"));
    }
}
