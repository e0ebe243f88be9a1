use std::time::Duration;

use reqwest::Url;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wordcount_engine::{SchemaError, SchemaRegistryClient, WORDS_SCHEMA};

fn client(uri: &str) -> SchemaRegistryClient {
    SchemaRegistryClient::new(Url::parse(uri).unwrap(), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn registers_schema_under_subject() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/subjects/streams-plaintext-input-value/versions"))
        .and(header("content-type", "application/vnd.schemaregistry.v1+json"))
        .and(body_json(json!({ "schema": WORDS_SCHEMA })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 21 })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client(&server.uri())
        .register("streams-plaintext-input-value", WORDS_SCHEMA)
        .await
        .unwrap();
    assert_eq!(id, 21);
}

#[tokio::test]
async fn incompatible_schema_is_rejected_with_registry_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error_code": 409,
            "message": "Schema being registered is incompatible with an earlier schema"
        })))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .register("out-value", WORDS_SCHEMA)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SchemaError::Rejected {
            status: 409,
            message: "Schema being registered is incompatible with an earlier schema".into(),
        }
    );
}

#[tokio::test]
async fn reachability_check_lists_subjects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    client(&server.uri()).check_reachable().await.unwrap();
}

#[tokio::test]
async fn unreachable_registry_is_reported() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = client(&format!("http://127.0.0.1:{port}"))
        .check_reachable()
        .await
        .unwrap_err();
    assert!(matches!(err, SchemaError::Unreachable { .. }), "{err}");
}
