use std::time::Duration;

use tokio::net::TcpListener;
use wordcount_engine::{probe_brokers, ProbeError};

async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn first_reachable_broker_wins() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live = listener.local_addr().unwrap().to_string();
    let dead = closed_port().await;

    let found = probe_brokers(&[dead, live.clone()], Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(found, live);
}

#[tokio::test]
async fn all_brokers_down_is_an_error() {
    let dead = closed_port().await;
    let err = probe_brokers(&[dead.clone()], Duration::from_secs(1))
        .await
        .unwrap_err();
    match err {
        ProbeError::Unreachable(detail) => assert!(detail.contains(&dead), "{detail}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn empty_broker_list_is_an_error() {
    assert_eq!(
        probe_brokers(&[], Duration::from_secs(1)).await.unwrap_err(),
        ProbeError::NoBrokers
    );
}
