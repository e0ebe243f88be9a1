/// One input record as read from a source partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Option<String>,
    pub value: String,
    pub partition: u32,
    pub offset: u64,
}

impl Record {
    pub fn new(key: Option<String>, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
            partition: 0,
            offset: 0,
        }
    }

    pub fn at(mut self, partition: u32, offset: u64) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }
}

/// Latest cumulative count for a word, emitted once per processed token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountUpdate {
    pub word: String,
    pub count: u64,
}

impl CountUpdate {
    pub fn new(word: impl Into<String>, count: u64) -> Self {
        Self {
            word: word.into(),
            count,
        }
    }
}
