//! Service configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;
use url::Url;
use wordcount_engine::{PipelineSettings, RetryPolicy};

pub const BOOTSTRAP_SERVERS_VAR: &str = "KAFKA_BOOTSTRAP_SERVER";
pub const SCHEMA_REGISTRY_VAR: &str = "SCHEMA_REGISTRY_SERVER";
pub const INPUT_TOPIC_VAR: &str = "KAFKA_INPUT_TOPIC";
pub const OUTPUT_TOPIC_VAR: &str = "KAFKA_OUTPUT_TOPIC";
pub const REST_PROXY_VAR: &str = "KAFKA_REST_PROXY";
pub const APPLICATION_ID_VAR: &str = "WORDCOUNT_APPLICATION_ID";
pub const COMMIT_INTERVAL_VAR: &str = "WORDCOUNT_COMMIT_INTERVAL_MS";
pub const SHARDS_VAR: &str = "WORDCOUNT_SHARDS";
pub const SINK_MAX_RETRIES_VAR: &str = "WORDCOUNT_SINK_MAX_RETRIES";
pub const SINK_BACKOFF_VAR: &str = "WORDCOUNT_SINK_BACKOFF_MS";
pub const STATE_DIR_VAR: &str = "WORDCOUNT_STATE_DIR";
pub const RESET_STATE_VAR: &str = "WORDCOUNT_RESET_STATE";
pub const LOG_LEVEL_VAR: &str = "WORDCOUNT_LOG";
pub const LOG_FILE_VAR: &str = "WORDCOUNT_LOG_FILE";

pub const DEFAULT_BOOTSTRAP_SERVERS: &str = "localhost:9092";
pub const DEFAULT_SCHEMA_REGISTRY: &str = "localhost:8081";
pub const DEFAULT_INPUT_TOPIC: &str = "streams-plaintext-input";
pub const DEFAULT_OUTPUT_TOPIC: &str = "streams-wordcount-output";
pub const DEFAULT_REST_PROXY: &str = "http://localhost:8082";
pub const DEFAULT_APPLICATION_ID: &str = "wordcount-lambda-example";
pub const DEFAULT_COMMIT_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_STATE_DIR: &str = "./wordcount-state";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct SettingsError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// `host:port` pairs with any `PROTOCOL://` prefix removed.
    pub brokers: Vec<String>,
    pub schema_registry_url: Url,
    pub rest_proxy_url: Url,
    pub input_topic: String,
    pub output_topic: String,
    /// Consumer group name; the consumer instance is `{application_id}-client`.
    pub application_id: String,
    pub commit_interval: Duration,
    pub shards: usize,
    pub sink_retry: RetryPolicy,
    pub state_dir: PathBuf,
    /// Wipe the state directory before starting instead of resuming from it.
    pub reset_state: bool,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds settings from any variable lookup; unset or blank values take
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let get = |var: &'static str, default: &str| -> (&'static str, String) {
            let value = lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string());
            (var, value)
        };
        let defaults = RetryPolicy::default();

        let (var, value) = get(BOOTSTRAP_SERVERS_VAR, DEFAULT_BOOTSTRAP_SERVERS);
        let brokers = parse_brokers(&value).map_err(|reason| invalid(var, &value, reason))?;

        let (var, value) = get(SCHEMA_REGISTRY_VAR, DEFAULT_SCHEMA_REGISTRY);
        let schema_registry_url = parse_url(&value).map_err(|reason| invalid(var, &value, reason))?;

        let (var, value) = get(REST_PROXY_VAR, DEFAULT_REST_PROXY);
        let rest_proxy_url = parse_url(&value).map_err(|reason| invalid(var, &value, reason))?;

        let (var, value) = get(COMMIT_INTERVAL_VAR, &DEFAULT_COMMIT_INTERVAL_MS.to_string());
        let commit_ms = parse_number::<u64>(var, &value)?;
        if commit_ms == 0 {
            return Err(invalid(var, &value, "must be at least 1"));
        }

        let (var, value) = get(SHARDS_VAR, "1");
        let shards = parse_number::<usize>(var, &value)?;
        if shards == 0 {
            return Err(invalid(var, &value, "must be at least 1"));
        }

        let (var, value) = get(SINK_MAX_RETRIES_VAR, &defaults.max_retries.to_string());
        let max_retries = parse_number::<u32>(var, &value)?;

        let default_backoff_ms = defaults.base_backoff.as_millis().to_string();
        let (var, value) = get(SINK_BACKOFF_VAR, &default_backoff_ms);
        let backoff_ms = parse_number::<u64>(var, &value)?;

        let (var, value) = get(RESET_STATE_VAR, "true");
        let reset_state = parse_bool(&value).ok_or_else(|| invalid(var, &value, "expected true or false"))?;

        let (var, value) = get(LOG_LEVEL_VAR, "info");
        let log_level = wordcount_logging::parse_level(&value)
            .ok_or_else(|| invalid(var, &value, "expected off, error, warn, info, debug or trace"))?;

        Ok(Self {
            brokers,
            schema_registry_url,
            rest_proxy_url,
            input_topic: get(INPUT_TOPIC_VAR, DEFAULT_INPUT_TOPIC).1,
            output_topic: get(OUTPUT_TOPIC_VAR, DEFAULT_OUTPUT_TOPIC).1,
            application_id: get(APPLICATION_ID_VAR, DEFAULT_APPLICATION_ID).1,
            commit_interval: Duration::from_millis(commit_ms),
            shards,
            sink_retry: RetryPolicy {
                max_retries,
                base_backoff: Duration::from_millis(backoff_ms),
            },
            state_dir: PathBuf::from(get(STATE_DIR_VAR, DEFAULT_STATE_DIR).1),
            reset_state,
            log_level,
            log_file: lookup(LOG_FILE_VAR)
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn client_id(&self) -> String {
        format!("{}-client", self.application_id)
    }

    pub fn input_subject(&self) -> String {
        format!("{}-value", self.input_topic)
    }

    pub fn output_subject(&self) -> String {
        format!("{}-value", self.output_topic)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            shards: self.shards,
            commit_interval: self.commit_interval,
            sink_retry: self.sink_retry,
            ..PipelineSettings::default()
        }
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> SettingsError {
    SettingsError {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| invalid(var, value, err.to_string()))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Accepts `host:port[,host:port...]`, each optionally prefixed with a
/// listener protocol such as `PLAINTEXT://`.
fn parse_brokers(value: &str) -> Result<Vec<String>, String> {
    let mut brokers = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let address = entry.split_once("://").map_or(entry, |(_, rest)| rest);
        let Some((host, port)) = address.rsplit_once(':') else {
            return Err(format!("{entry} has no port"));
        };
        if host.is_empty() {
            return Err(format!("{entry} has no host"));
        }
        port.parse::<u16>()
            .map_err(|_| format!("{entry} has an invalid port"))?;
        brokers.push(address.to_string());
    }
    if brokers.is_empty() {
        return Err("no broker address given".into());
    }
    Ok(brokers)
}

/// Parses an http(s) endpoint; a bare `host:port` is taken as `http://host:port`.
fn parse_url(value: &str) -> Result<Url, String> {
    let candidate = if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{value}")
    };
    let url = Url::parse(&candidate).map_err(|err| err.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {}", url.scheme()));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err("missing host".into());
    }
    Ok(url)
}
