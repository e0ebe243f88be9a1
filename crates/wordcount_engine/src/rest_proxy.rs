use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use wordcount_core::CountUpdate;
use wordcount_logging::{wc_debug, wc_info, wc_warn};

use crate::{CountSink, RawRecord, RecordSource, SinkError, SourceError, WORD_COUNT_SCHEMA};

const V2_JSON: &str = "application/vnd.kafka.v2+json";
const AVRO_V2_JSON: &str = "application/vnd.kafka.avro.v2+json";
/// Record keys are plain strings.
const KEY_SCHEMA: &str = r#""string""#;

#[derive(Debug, Clone)]
pub struct RestProxySettings {
    pub base_url: Url,
    pub request_timeout: Duration,
    /// Pause after an empty poll before asking again.
    pub idle_backoff: Duration,
}

impl RestProxySettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: Duration::from_secs(30),
            idle_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RestProxyError {
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("rest proxy unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },
    #[error("rest proxy returned {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Kafka REST proxy (v2 API) used as record transport.
#[derive(Debug, Clone)]
pub struct RestProxy {
    client: reqwest::Client,
    settings: RestProxySettings,
}

impl RestProxy {
    pub fn new(settings: RestProxySettings) -> Result<Self, RestProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.request_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RestProxyError::Client(err.to_string()))?;
        Ok(Self { client, settings })
    }

    /// Fetches the topic list; a usable proxy answers with 2xx.
    pub async fn check_reachable(&self) -> Result<(), RestProxyError> {
        let url = join(&self.settings.base_url, &["topics"]);
        let response = self
            .client
            .get(url)
            .header(ACCEPT, V2_JSON)
            .send()
            .await
            .map_err(|err| RestProxyError::Unreachable {
                url: self.settings.base_url.to_string(),
                message: err.to_string(),
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(RestProxyError::Rejected {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }

    /// Creates (or reuses) consumer instance `instance` in `group` and
    /// subscribes it to `topic`.
    pub async fn subscribe(
        &self,
        group: &str,
        instance: &str,
        topic: &str,
    ) -> Result<RestProxySource, SourceError> {
        let create = json!({
            "name": instance,
            "format": "avro",
            "auto.offset.reset": "earliest",
        });
        let response = self
            .client
            .post(join(&self.settings.base_url, &["consumers", group]))
            .header(CONTENT_TYPE, V2_JSON)
            .header(ACCEPT, V2_JSON)
            .body(create.to_string())
            .send()
            .await
            .map_err(source_transport_error)?;

        let instance_uri = match response.status() {
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(source_transport_error)?;
                let created: CreatedConsumer = serde_json::from_slice(&bytes)
                    .map_err(|err| SourceError::Fatal(format!("consumer response: {err}")))?;
                Url::parse(&created.base_uri)
                    .map_err(|err| SourceError::Fatal(format!("consumer base_uri: {err}")))?
            }
            StatusCode::CONFLICT => {
                wc_info!("consumer instance {}/{} exists; reusing it", group, instance);
                join(
                    &self.settings.base_url,
                    &["consumers", group, "instances", instance],
                )
            }
            status => {
                let body = response.bytes().await.unwrap_or_default();
                return Err(classify_source_status(status, &body));
            }
        };

        let response = self
            .client
            .post(join(&instance_uri, &["subscription"]))
            .header(CONTENT_TYPE, V2_JSON)
            .body(json!({ "topics": [topic] }).to_string())
            .send()
            .await
            .map_err(source_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(classify_source_status(status, &body));
        }
        wc_info!("consumer {} subscribed to {}", instance_uri, topic);

        Ok(RestProxySource {
            client: self.client.clone(),
            instance_uri,
            idle_backoff: self.settings.idle_backoff,
            closed: false,
        })
    }

    /// Publishes to `topic`. Without a registered schema id the full value
    /// schema travels with every request.
    pub fn sink(&self, topic: &str, value_schema_id: Option<u32>) -> RestProxySink {
        RestProxySink {
            client: self.client.clone(),
            topic_url: join(&self.settings.base_url, &["topics", topic]),
            value_schema_id,
        }
    }
}

#[derive(Deserialize)]
struct CreatedConsumer {
    base_uri: String,
}

#[derive(Deserialize)]
struct ConsumedRecord {
    #[serde(default)]
    key: Option<serde_json::Value>,
    #[serde(default)]
    value: serde_json::Value,
    partition: u32,
    offset: u64,
}

impl From<ConsumedRecord> for RawRecord {
    fn from(record: ConsumedRecord) -> Self {
        let key = match record.key {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(key)) => Some(key),
            Some(other) => Some(other.to_string()),
        };
        RawRecord {
            key,
            value: record.value,
            partition: record.partition,
            offset: record.offset,
        }
    }
}

pub struct RestProxySource {
    client: reqwest::Client,
    instance_uri: Url,
    idle_backoff: Duration,
    closed: bool,
}

#[async_trait::async_trait]
impl RecordSource for RestProxySource {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawRecord>>, SourceError> {
        if self.closed {
            return Ok(None);
        }
        let response = self
            .client
            .get(join(&self.instance_uri, &["records"]))
            .header(ACCEPT, AVRO_V2_JSON)
            .send()
            .await
            .map_err(source_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(source_transport_error)?;
        if !status.is_success() {
            return Err(classify_source_status(status, &bytes));
        }
        let records: Vec<ConsumedRecord> = serde_json::from_slice(&bytes)
            .map_err(|err| SourceError::Fatal(format!("records response: {err}")))?;
        if records.is_empty() {
            tokio::time::sleep(self.idle_backoff).await;
        } else {
            wc_debug!("polled {} records from {}", records.len(), self.instance_uri);
        }
        Ok(Some(records.into_iter().map(RawRecord::from).collect()))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        let response = self
            .client
            .delete(self.instance_uri.clone())
            .header(CONTENT_TYPE, V2_JSON)
            .send()
            .await
            .map_err(source_transport_error)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            wc_info!("consumer {} closed", self.instance_uri);
            return Ok(());
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(classify_source_status(status, &body))
    }
}

#[derive(Serialize)]
struct ProduceRequest<'a> {
    key_schema: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_schema_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_schema: Option<&'static str>,
    records: Vec<ProduceRecord<'a>>,
}

#[derive(Serialize)]
struct ProduceRecord<'a> {
    key: &'a str,
    value: WordCountValue<'a>,
}

#[derive(Serialize)]
struct WordCountValue<'a> {
    word: &'a str,
    count: u64,
}

#[derive(Deserialize, Default)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<ProducedOffset>,
}

#[derive(Deserialize)]
struct ProducedOffset {
    #[serde(default)]
    error_code: Option<i32>,
    #[serde(default)]
    error: Option<String>,
}

/// REST proxy error code for a retriable Kafka exception.
const RETRIABLE_ERROR_CODE: i32 = 2;

pub struct RestProxySink {
    client: reqwest::Client,
    topic_url: Url,
    value_schema_id: Option<u32>,
}

#[async_trait::async_trait]
impl CountSink for RestProxySink {
    async fn publish(&self, updates: &[CountUpdate]) -> Result<(), SinkError> {
        if updates.is_empty() {
            return Ok(());
        }
        let request = ProduceRequest {
            key_schema: KEY_SCHEMA,
            value_schema_id: self.value_schema_id,
            value_schema: self.value_schema_id.is_none().then_some(WORD_COUNT_SCHEMA),
            records: updates
                .iter()
                .map(|update| ProduceRecord {
                    key: &update.word,
                    value: WordCountValue {
                        word: &update.word,
                        count: update.count,
                    },
                })
                .collect(),
        };
        let body =
            serde_json::to_vec(&request).map_err(|err| SinkError::Rejected(err.to_string()))?;

        let response = self
            .client
            .post(self.topic_url.clone())
            .header(CONTENT_TYPE, AVRO_V2_JSON)
            .header(ACCEPT, V2_JSON)
            .body(body)
            .send()
            .await
            .map_err(|err| SinkError::Transient(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| SinkError::Transient(err.to_string()))?;
        if !status.is_success() {
            let message = error_message(status, &bytes);
            return Err(if is_transient_status(status) {
                SinkError::Transient(message)
            } else {
                SinkError::Rejected(message)
            });
        }

        let produced: ProduceResponse = match serde_json::from_slice(&bytes) {
            Ok(produced) => produced,
            Err(err) => {
                // The proxy accepted the request; only per-record results are unknown.
                wc_warn!(
                    "unreadable produce response from {} ({}): {}",
                    self.topic_url,
                    status,
                    err
                );
                ProduceResponse::default()
            }
        };
        let mut retriable = None;
        for offset in produced.offsets {
            let Some(code) = offset.error_code else {
                continue;
            };
            let message = offset.error.unwrap_or_else(|| format!("error code {code}"));
            if code != RETRIABLE_ERROR_CODE {
                return Err(SinkError::Rejected(message));
            }
            if retriable.is_none() {
                retriable = Some(message);
            }
        }
        match retriable {
            // Records that did land are published again on retry.
            Some(message) => {
                wc_warn!("rest proxy reported retriable produce error: {}", message);
                Err(SinkError::Transient(message))
            }
            None => Ok(()),
        }
    }
}

fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

fn classify_source_status(status: StatusCode, body: &[u8]) -> SourceError {
    let message = error_message(status, body);
    if is_transient_status(status) {
        SourceError::Unavailable(message)
    } else {
        SourceError::Fatal(message)
    }
}

fn source_transport_error(err: reqwest::Error) -> SourceError {
    SourceError::Unavailable(err.to_string())
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(body) => format!("{status}: {}", body.message),
        Err(_) => status.to_string(),
    }
}
