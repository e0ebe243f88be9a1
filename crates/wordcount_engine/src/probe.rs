use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;
use wordcount_logging::{wc_debug, wc_info};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("no broker addresses configured")]
    NoBrokers,
    #[error("no broker reachable: {0}")]
    Unreachable(String),
}

/// Connects to each `host:port` in order and returns the first one that answers.
pub async fn probe_brokers(brokers: &[String], timeout: Duration) -> Result<String, ProbeError> {
    if brokers.is_empty() {
        return Err(ProbeError::NoBrokers);
    }
    let mut failures = Vec::with_capacity(brokers.len());
    for broker in brokers {
        match time::timeout(timeout, TcpStream::connect(broker.as_str())).await {
            Ok(Ok(_stream)) => {
                wc_info!("broker {} reachable", broker);
                return Ok(broker.clone());
            }
            Ok(Err(err)) => {
                wc_debug!("broker {} refused: {}", broker, err);
                failures.push(format!("{broker}: {err}"));
            }
            Err(_) => {
                wc_debug!("broker {} timed out after {:?}", broker, timeout);
                failures.push(format!("{broker}: timed out"));
            }
        }
    }
    Err(ProbeError::Unreachable(failures.join("; ")))
}
