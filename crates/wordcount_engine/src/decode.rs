use serde::Deserialize;
use wordcount_core::Record;

/// A record as delivered by a source, before the value is checked against
/// the `Words` schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub key: Option<String>,
    pub value: serde_json::Value,
    pub partition: u32,
    pub offset: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record {partition}/{offset} does not match the Words schema: {message}")]
    SchemaMismatch {
        partition: u32,
        offset: u64,
        message: String,
    },
}

#[derive(Deserialize)]
struct WordsValue {
    words: String,
}

/// Extracts the `words` text field from a raw record.
pub fn decode_record(raw: RawRecord) -> Result<Record, DecodeError> {
    let RawRecord {
        key,
        value,
        partition,
        offset,
    } = raw;
    let words: WordsValue =
        serde_json::from_value(value).map_err(|err| DecodeError::SchemaMismatch {
            partition,
            offset,
            message: err.to_string(),
        })?;
    Ok(Record::new(key, words.words).at(partition, offset))
}
