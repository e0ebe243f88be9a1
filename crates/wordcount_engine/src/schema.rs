use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use url::Url;
use wordcount_logging::wc_info;

/// Avro schema of input values.
pub const WORDS_SCHEMA: &str =
    r#"{"type":"record","name":"Words","fields":[{"name":"words","type":"string"}]}"#;

/// Avro schema of output values.
pub const WORD_COUNT_SCHEMA: &str = r#"{"type":"record","name":"WordCount","fields":[{"name":"word","type":"string"},{"name":"count","type":"long"}]}"#;

const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema registry unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },
    #[error("schema registry returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected schema registry response: {0}")]
    InvalidResponse(String),
}

#[derive(Deserialize)]
struct RegisteredSchema {
    id: u32,
}

#[derive(Debug, Clone)]
pub struct SchemaRegistryClient {
    client: reqwest::Client,
    base_url: Url,
}

impl SchemaRegistryClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, SchemaError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| SchemaError::Unreachable {
                url: base_url.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    /// Lists subjects; any successful answer counts as reachable.
    pub async fn check_reachable(&self) -> Result<(), SchemaError> {
        let url = self.endpoint(&["subjects"])?;
        let response = self
            .client
            .get(url)
            .header(ACCEPT, REGISTRY_CONTENT_TYPE)
            .send()
            .await
            .map_err(|err| self.unreachable(err))?;
        expect_success(response).await.map(drop)
    }

    /// Registers `schema` under `subject` and returns its global id.
    ///
    /// Registering an identical schema again returns the existing id.
    pub async fn register(&self, subject: &str, schema: &str) -> Result<u32, SchemaError> {
        let url = self.endpoint(&["subjects", subject, "versions"])?;
        let body = json!({ "schema": schema }).to_string();
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, REGISTRY_CONTENT_TYPE)
            .header(ACCEPT, REGISTRY_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|err| self.unreachable(err))?;
        let bytes = expect_success(response).await?;
        let registered: RegisteredSchema = serde_json::from_slice(&bytes)
            .map_err(|err| SchemaError::InvalidResponse(err.to_string()))?;
        wc_info!("schema for {} registered with id {}", subject, registered.id);
        Ok(registered.id)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SchemaError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SchemaError::InvalidResponse(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn unreachable(&self, err: reqwest::Error) -> SchemaError {
        SchemaError::Unreachable {
            url: self.base_url.to_string(),
            message: err.to_string(),
        }
    }
}

async fn expect_success(response: reqwest::Response) -> Result<Vec<u8>, SchemaError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| SchemaError::InvalidResponse(err.to_string()))?;
    if status.is_success() {
        return Ok(bytes.to_vec());
    }
    Err(SchemaError::Rejected {
        status: status.as_u16(),
        message: error_message(status, &bytes),
    })
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_slice::<ErrorBody>(body)
        .map(|body| body.message)
        .unwrap_or_else(|_| status.to_string())
}
