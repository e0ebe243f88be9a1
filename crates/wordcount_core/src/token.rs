use std::sync::LazyLock;

use regex::Regex;

pub type Token = String;

/// Runs of characters outside the Unicode word class (letters, marks,
/// decimal digits, connector punctuation and join controls).
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("separator pattern is valid"));

/// Lower-cases `text` and splits it on runs of non-word characters.
///
/// Empty pieces are never yielded, so `""` and `"?!"` produce nothing.
pub fn tokens(text: &str) -> impl Iterator<Item = Token> {
    tokenize(text).into_iter()
}

pub fn tokenize(text: &str) -> Vec<Token> {
    let lowered = text.to_lowercase();
    SEPARATOR_RE
        .split(&lowered)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}
