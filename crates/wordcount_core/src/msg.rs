#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Embedder started the pipeline.
    Start,
    /// Explicit stop or termination signal.
    StopRequested,
    /// Source returned end of stream.
    SourceExhausted,
    /// Source can no longer make progress.
    SourceFailed(String),
    /// A shard gave up delivering updates.
    SinkFailed(String),
    /// Dispatcher and every shard have finished and flushed.
    Drained,
}
