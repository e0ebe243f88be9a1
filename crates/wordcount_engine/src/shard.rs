use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use wordcount_core::{CountState, CountUpdate, Counter, Msg, Token};
use wordcount_logging::{wc_debug, wc_error, wc_warn};

use crate::{CountSink, RetryPolicy, SinkError};

/// Stable word to shard mapping; the same word lands on the same shard in
/// every process.
pub fn shard_for(word: &str, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    let digest = Sha256::digest(word.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % shards as u64) as usize
}

/// Splits a state into `shards` disjoint slices along [`shard_for`].
pub fn split_state(state: CountState, shards: usize) -> Vec<CountState> {
    let shards = shards.max(1);
    let mut buckets: Vec<Vec<(String, u64)>> = vec![Vec::new(); shards];
    for (word, count) in state {
        buckets[shard_for(&word, shards)].push((word, count));
    }
    buckets.into_iter().map(CountState::from_counts).collect()
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ShardOptions {
    pub commit_interval: Duration,
    pub max_batch: usize,
    pub retry: RetryPolicy,
}

#[derive(Debug)]
pub(crate) struct ShardOutcome {
    pub state: CountState,
    pub emitted: u64,
}

/// Owns one slice of the counts. Updates are buffered for the commit window
/// and flushed in mutation order.
pub(crate) async fn run_shard(
    id: usize,
    counter: Counter,
    mut rx: mpsc::Receiver<Token>,
    sink: Arc<dyn CountSink>,
    options: ShardOptions,
    events: mpsc::UnboundedSender<Msg>,
) -> ShardOutcome {
    let mut shard = Shard {
        id,
        counter,
        pending: Vec::with_capacity(options.max_batch),
        emitted: 0,
        sink,
        options,
    };

    let mut commit = time::interval_at(
        Instant::now() + options.commit_interval,
        options.commit_interval,
    );
    commit.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            token = rx.recv() => match token {
                Some(word) => {
                    shard.apply(word);
                    if shard.pending.len() >= options.max_batch {
                        if let Err(err) = shard.flush().await {
                            break Err(err);
                        }
                    }
                }
                None => break shard.flush().await,
            },
            _ = commit.tick() => {
                if let Err(err) = shard.flush().await {
                    break Err(err);
                }
            }
        }
    };

    if let Err(err) = result {
        wc_error!(
            "shard {} giving up with {} undelivered updates: {}",
            id,
            shard.pending.len(),
            err
        );
        let _ = events.send(Msg::SinkFailed(format!("shard {id}: {err}")));
    }

    ShardOutcome {
        state: shard.counter.into_state(),
        emitted: shard.emitted,
    }
}

struct Shard {
    id: usize,
    counter: Counter,
    pending: Vec<CountUpdate>,
    emitted: u64,
    sink: Arc<dyn CountSink>,
    options: ShardOptions,
}

impl Shard {
    fn apply(&mut self, word: Token) {
        let count = self.counter.apply(&word);
        self.pending.push(CountUpdate { word, count });
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let retry = self.options.retry;
        let mut attempt = 0;
        loop {
            match self.sink.publish(&self.pending).await {
                Ok(()) => break,
                Err(err) if err.is_retryable() && retry.allows(attempt) => {
                    let backoff = retry.backoff(attempt);
                    attempt += 1;
                    wc_warn!(
                        "shard {} publish failed (attempt {}/{}), retrying in {:?}: {}",
                        self.id,
                        attempt,
                        retry.max_retries.saturating_add(1),
                        backoff,
                        err
                    );
                    time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
        wc_debug!("shard {} committed {} updates", self.id, self.pending.len());
        self.emitted += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_shard_takes_everything() {
        assert_eq!(shard_for("anything", 1), 0);
        assert_eq!(shard_for("anything", 0), 0);
    }

    #[test]
    fn assignment_is_stable_and_in_range() {
        for word in ["hello", "kafka", "streams", "summit", "größe"] {
            let shard = shard_for(word, 4);
            assert!(shard < 4);
            assert_eq!(shard, shard_for(word, 4));
        }
    }

    #[test]
    fn split_state_is_disjoint_and_complete() {
        let state = CountState::from_counts([("a", 1u64), ("b", 2), ("c", 3), ("d", 4)]);
        let slices = split_state(state.clone(), 3);
        assert_eq!(slices.len(), 3);
        for (idx, slice) in slices.iter().enumerate() {
            for (word, _) in slice.iter() {
                assert_eq!(shard_for(word, 3), idx);
            }
        }
        let mut merged = CountState::new();
        for slice in slices {
            merged.merge(slice);
        }
        assert_eq!(merged, state);
    }
}
