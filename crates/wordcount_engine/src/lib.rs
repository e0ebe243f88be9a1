//! Wordcount engine: sources, sinks and the sharded pipeline runner.
mod decode;
mod engine;
mod persist;
mod probe;
mod rest_proxy;
mod retry;
mod schema;
mod shard;
mod sink;
mod source;

pub use decode::{decode_record, DecodeError, RawRecord};
pub use engine::{Pipeline, PipelineError, PipelineReport, PipelineSettings};
pub use persist::{ensure_state_dir, read_state_file, reset_state_dir, write_state_file, PersistError};
pub use probe::{probe_brokers, ProbeError};
pub use rest_proxy::{RestProxy, RestProxyError, RestProxySettings, RestProxySink, RestProxySource};
pub use retry::RetryPolicy;
pub use schema::{SchemaError, SchemaRegistryClient, WORDS_SCHEMA, WORD_COUNT_SCHEMA};
pub use shard::{shard_for, split_state};
pub use sink::{CountSink, MemorySink, SinkError};
pub use source::{ChannelSource, RecordSource, SourceError, SourceFeeder};
