use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;
use wordcount_core::{
    tokens, update, CountState, Counter, Effect, Lifecycle, Msg, Phase, StopReason, Token,
};
use wordcount_logging::{wc_debug, wc_error, wc_info, wc_warn};

use crate::shard::{run_shard, ShardOptions, ShardOutcome};
use crate::{decode_record, split_state, shard_for, CountSink, RecordSource, RetryPolicy};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Number of counter shards; words are routed by [`shard_for`].
    pub shards: usize,
    /// Upper bound on how long an update waits in a shard before it is published.
    pub commit_interval: Duration,
    /// Shards publish early once this many updates are pending.
    pub max_batch: usize,
    /// Bound of each dispatcher to shard queue.
    pub channel_capacity: usize,
    pub sink_retry: RetryPolicy,
    pub source_retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            shards: 1,
            commit_interval: Duration::from_secs(10),
            max_batch: 500,
            channel_capacity: 1024,
            sink_retry: RetryPolicy::default(),
            source_retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub records_read: u64,
    pub records_skipped: u64,
    pub tokens_counted: u64,
    pub updates_emitted: u64,
    pub stop_reason: StopReason,
    pub state: CountState,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline stopped after failure: {reason:?}")]
    Failed {
        reason: StopReason,
        report: Box<PipelineReport>,
    },
    #[error("pipeline worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Source -> tokenizer -> sharded counters -> sink.
///
/// Built in `Created`; [`Pipeline::run`] drives it through `Running` to
/// `Stopped`.
pub struct Pipeline {
    settings: PipelineSettings,
    source: Box<dyn RecordSource>,
    sink: Arc<dyn CountSink>,
    state: CountState,
    lifecycle: Lifecycle,
    status: watch::Sender<Phase>,
}

#[derive(Debug, Default)]
struct DispatchStats {
    records_read: u64,
    records_skipped: u64,
    tokens_counted: u64,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        source: Box<dyn RecordSource>,
        sink: Arc<dyn CountSink>,
        state: CountState,
    ) -> Self {
        let (status, _) = watch::channel(Phase::Created);
        Self {
            settings,
            source,
            sink,
            state,
            lifecycle: Lifecycle::new(),
            status,
        }
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Observes phase changes while [`Pipeline::run`] owns the pipeline.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.status.subscribe()
    }

    /// Runs until the source ends, `cancel` fires, or a worker fails.
    ///
    /// The record being dispatched when `cancel` fires is completed and every
    /// shard flushes before this returns.
    pub async fn run(self, cancel: CancellationToken) -> Result<PipelineReport, PipelineError> {
        let Pipeline {
            settings,
            source,
            sink,
            state,
            lifecycle,
            status,
        } = self;
        let intake = CancellationToken::new();
        let mut supervisor = Supervisor {
            lifecycle,
            status,
            failure: None,
        };
        supervisor.dispatch(Msg::Start, &intake);

        let shards = settings.shards.max(1);
        let options = ShardOptions {
            commit_interval: settings.commit_interval.max(Duration::from_millis(1)),
            max_batch: settings.max_batch.max(1),
            retry: settings.sink_retry,
        };
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut senders = Vec::with_capacity(shards);
        let mut shard_tasks = Vec::with_capacity(shards);
        for (id, seed) in split_state(state, shards).into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));
            senders.push(tx);
            shard_tasks.push(tokio::spawn(run_shard(
                id,
                Counter::new(seed),
                rx,
                sink.clone(),
                options,
                events_tx.clone(),
            )));
        }
        wc_info!("pipeline running with {} shard(s)", shards);

        let dispatcher = tokio::spawn(dispatch_records(
            source,
            senders,
            intake.clone(),
            events_tx,
            settings.source_retry,
        ));

        let mut stop_seen = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled(), if !stop_seen => {
                    stop_seen = true;
                    wc_info!("stop requested; finishing in-flight record");
                    supervisor.dispatch(Msg::StopRequested, &intake);
                }
                msg = events_rx.recv() => match msg {
                    Some(msg) => supervisor.dispatch(msg, &intake),
                    // Every worker has dropped its sender.
                    None => break,
                },
            }
        }

        // Shards drain even when the dispatcher died, so join them first.
        let dispatched = dispatcher.await;
        let shard_outcomes = join_all(shard_tasks).await;
        let stats = dispatched.map_err(|err| PipelineError::WorkerPanicked(err.to_string()))?;
        let mut state = CountState::new();
        let mut updates_emitted = 0;
        for outcome in shard_outcomes {
            let ShardOutcome {
                state: slice,
                emitted,
            } = outcome.map_err(|err| PipelineError::WorkerPanicked(err.to_string()))?;
            state.merge(slice);
            updates_emitted += emitted;
        }

        supervisor.dispatch(Msg::Drained, &intake);
        let report = PipelineReport {
            records_read: stats.records_read,
            records_skipped: stats.records_skipped,
            tokens_counted: stats.tokens_counted,
            updates_emitted,
            stop_reason: supervisor
                .lifecycle
                .stop_reason()
                .cloned()
                .unwrap_or(StopReason::Requested),
            state,
        };

        match supervisor.failure {
            Some(reason) => Err(PipelineError::Failed {
                reason,
                report: Box::new(report),
            }),
            None => Ok(report),
        }
    }
}

/// Applies lifecycle messages and executes the resulting effects.
struct Supervisor {
    lifecycle: Lifecycle,
    status: watch::Sender<Phase>,
    failure: Option<StopReason>,
}

impl Supervisor {
    fn dispatch(&mut self, msg: Msg, intake: &CancellationToken) {
        let lifecycle = std::mem::take(&mut self.lifecycle);
        let (lifecycle, effects) = update(lifecycle, msg);
        self.lifecycle = lifecycle;

        for effect in effects {
            match effect {
                // Workers are spawned by `run` right after `Start`.
                Effect::SpawnWorkers => {}
                Effect::HaltIntake => intake.cancel(),
                Effect::ReportFailure(reason) => {
                    wc_error!("pipeline failure: {:?}", reason);
                    if self.failure.is_none() {
                        self.failure = Some(reason);
                    }
                }
                Effect::ReleaseResources => {
                    wc_info!("pipeline stopped: {:?}", self.lifecycle.stop_reason());
                }
            }
        }
        self.status.send_replace(self.lifecycle.phase());
    }
}

async fn dispatch_records(
    mut source: Box<dyn RecordSource>,
    senders: Vec<mpsc::Sender<Token>>,
    intake: CancellationToken,
    events: mpsc::UnboundedSender<Msg>,
    retry: RetryPolicy,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    let mut attempt = 0;

    'intake: while !intake.is_cancelled() {
        let polled = tokio::select! {
            biased;
            _ = intake.cancelled() => break,
            polled = source.next_batch() => polled,
        };

        let batch = match polled {
            Ok(Some(batch)) => {
                attempt = 0;
                batch
            }
            Ok(None) => {
                wc_info!("source exhausted after {} records", stats.records_read);
                let _ = events.send(Msg::SourceExhausted);
                break;
            }
            Err(err) if err.is_transient() && retry.allows(attempt) => {
                let backoff = retry.backoff(attempt);
                attempt += 1;
                wc_warn!(
                    "source poll failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt,
                    retry.max_retries.saturating_add(1),
                    backoff,
                    err
                );
                tokio::select! {
                    _ = intake.cancelled() => break,
                    _ = time::sleep(backoff) => continue,
                }
            }
            Err(err) => {
                wc_error!("source failed: {}", err);
                let _ = events.send(Msg::SourceFailed(err.to_string()));
                break;
            }
        };

        for raw in batch {
            // Checked between records only, so a record is never half counted.
            if intake.is_cancelled() {
                break 'intake;
            }
            stats.records_read += 1;
            let record = match decode_record(raw) {
                Ok(record) => record,
                Err(err) => {
                    stats.records_skipped += 1;
                    wc_warn!("skipping record: {}", err);
                    continue;
                }
            };
            for word in tokens(&record.value) {
                let shard = shard_for(&word, senders.len());
                if senders[shard].send(word).await.is_err() {
                    // The shard already reported why it exited.
                    wc_debug!("shard {} is gone; stopping intake", shard);
                    break 'intake;
                }
                stats.tokens_counted += 1;
            }
        }
    }

    if let Err(err) = source.close().await {
        wc_warn!("failed to close source: {}", err);
    }
    stats
}
