use std::sync::{Arc, Mutex};

use wordcount_core::CountUpdate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink delivery failed: {0}")]
    Transient(String),
    #[error("sink rejected updates: {0}")]
    Rejected(String),
}

impl SinkError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Transient(_))
    }
}

/// Destination for count updates. A call either accepts the whole slice or fails.
#[async_trait::async_trait]
pub trait CountSink: Send + Sync {
    async fn publish(&self, updates: &[CountUpdate]) -> Result<(), SinkError>;
}

/// Collects every published update in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    updates: Arc<Mutex<Vec<CountUpdate>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<CountUpdate> {
        self.lock().clone()
    }

    pub fn take(&self) -> Vec<CountUpdate> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CountUpdate>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl CountSink for MemorySink {
    async fn publish(&self, updates: &[CountUpdate]) -> Result<(), SinkError> {
        self.lock().extend_from_slice(updates);
        Ok(())
    }
}
