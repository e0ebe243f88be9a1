use serde_json::json;
use tokio::sync::mpsc;

use crate::RawRecord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source may recover; the caller backs off and polls again.
    #[error("source temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("source failed: {0}")]
    Fatal(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// Ordered record stream. `Ok(None)` marks the end of the stream; an empty
/// batch only means nothing arrived yet.
#[async_trait::async_trait]
pub trait RecordSource: Send {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawRecord>>, SourceError>;

    /// Releases any server-side resources held by the source.
    async fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// In-process source fed through a [`SourceFeeder`].
///
/// The stream ends once every feeder has been dropped and the queue is empty.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<RawRecord>,
}

#[derive(Clone)]
pub struct SourceFeeder {
    tx: mpsc::UnboundedSender<RawRecord>,
}

impl ChannelSource {
    pub fn new() -> (Self, SourceFeeder) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, SourceFeeder { tx })
    }
}

impl SourceFeeder {
    /// Queues a well-formed `Words` record. Returns false once the source is gone.
    pub fn send_line(&self, partition: u32, offset: u64, line: &str) -> bool {
        self.send_raw(RawRecord {
            key: None,
            value: json!({ "words": line }),
            partition,
            offset,
        })
    }

    pub fn send_raw(&self, record: RawRecord) -> bool {
        self.tx.send(record).is_ok()
    }
}

#[async_trait::async_trait]
impl RecordSource for ChannelSource {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawRecord>>, SourceError> {
        let Some(first) = self.rx.recv().await else {
            return Ok(None);
        };
        let mut batch = vec![first];
        while let Ok(record) = self.rx.try_recv() {
            batch.push(record);
        }
        Ok(Some(batch))
    }
}
