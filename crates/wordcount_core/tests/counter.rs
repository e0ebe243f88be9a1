use pretty_assertions::assert_eq;
use wordcount_core::{tokenize, CountState, CountUpdate, Counter};

fn updates(pairs: &[(&str, u64)]) -> Vec<CountUpdate> {
    pairs
        .iter()
        .map(|(word, count)| CountUpdate::new(*word, *count))
        .collect()
}

#[test]
fn counts_for_one_word_increase_by_one_from_one() {
    let mut counter = Counter::default();
    let counts: Vec<u64> = (0..5).map(|_| counter.apply("kafka")).collect();
    assert_eq!(counts, vec![1, 2, 3, 4, 5]);
}

#[test]
fn lines_from_the_demo_produce_expected_updates() {
    let mut counter = Counter::default();

    assert_eq!(
        counter.apply_all(tokenize("hello kafka streams")),
        updates(&[("hello", 1), ("kafka", 1), ("streams", 1)])
    );
    assert_eq!(
        counter.apply_all(tokenize("all streams lead to kafka")),
        updates(&[("all", 1), ("streams", 2), ("lead", 1), ("to", 1), ("kafka", 2)])
    );
    assert_eq!(
        counter.apply_all(tokenize("join kafka summit")),
        updates(&[("join", 1), ("kafka", 3), ("summit", 1)])
    );
    assert!(counter.apply_all(tokenize("")).is_empty());
    assert_eq!(counter.state().get("kafka"), Some(3));
    assert_eq!(counter.state().len(), 8);
}

#[test]
fn mixed_case_and_punctuation_count_as_one_word() {
    let mut counter = Counter::default();
    assert_eq!(
        counter.apply_all(tokenize("Kafka, KAFKA!! kafka?")),
        updates(&[("kafka", 1), ("kafka", 2), ("kafka", 3)])
    );
}

#[test]
fn replaying_input_on_fresh_state_gives_identical_mapping() {
    let lines = ["hello kafka streams", "all streams lead to kafka", "join kafka summit"];
    let run = || {
        let mut counter = Counter::new(CountState::new());
        for line in lines {
            counter.apply_all(tokenize(line));
        }
        counter.into_state()
    };
    assert_eq!(run(), run());
}

#[test]
fn seeded_state_continues_counting() {
    let mut counter = Counter::new(CountState::from_counts([("kafka", 41u64)]));
    assert_eq!(counter.apply("kafka"), 42);
    assert_eq!(counter.apply("new"), 1);
}

#[test]
fn merge_keeps_disjoint_words_and_larger_counts() {
    let mut left = CountState::from_counts([("a", 1u64), ("b", 5)]);
    let right = CountState::from_counts([("b", 3u64), ("c", 2)]);
    left.merge(right);

    let merged: Vec<(&str, u64)> = left.iter().collect();
    assert_eq!(merged, vec![("a", 1), ("b", 5), ("c", 2)]);
}
