use std::collections::btree_map::{self, BTreeMap};

use crate::CountUpdate;

/// Word to cumulative count mapping. Counts only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountState {
    counts: BTreeMap<String, u64>,
}

impl CountState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from previously saved `(word, count)` pairs.
    ///
    /// Duplicate words keep the larger count.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut state = Self::new();
        for (word, count) in counts {
            state.raise(word.into(), count);
        }
        state
    }

    pub fn get(&self, word: &str) -> Option<u64> {
        self.counts.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterates words in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(word, count)| (word.as_str(), *count))
    }

    /// Folds another state into this one. Shards own disjoint words, so a
    /// word present on both sides only happens with stale snapshots; the
    /// larger count wins to keep counts monotonic.
    pub fn merge(&mut self, other: CountState) {
        for (word, count) in other.counts {
            self.raise(word, count);
        }
    }

    fn raise(&mut self, word: String, count: u64) {
        match self.counts.entry(word) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(count);
            }
            btree_map::Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                *current = (*current).max(count);
            }
        }
    }
}

impl IntoIterator for CountState {
    type Item = (String, u64);
    type IntoIter = btree_map::IntoIter<String, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}

/// Single-writer counter over an owned [`CountState`].
#[derive(Debug, Default)]
pub struct Counter {
    state: CountState,
}

impl Counter {
    pub fn new(state: CountState) -> Self {
        Self { state }
    }

    /// Increments `word` and returns its new count.
    pub fn apply(&mut self, word: &str) -> u64 {
        if let Some(count) = self.state.counts.get_mut(word) {
            *count += 1;
            return *count;
        }
        self.state.counts.insert(word.to_owned(), 1);
        1
    }

    /// Applies every token in order and returns the resulting updates.
    pub fn apply_all<I, S>(&mut self, tokens: I) -> Vec<CountUpdate>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .map(|token| {
                let word = token.as_ref();
                let count = self.apply(word);
                CountUpdate::new(word, count)
            })
            .collect()
    }

    pub fn state(&self) -> &CountState {
        &self.state
    }

    pub fn into_state(self) -> CountState {
        self.state
    }
}
