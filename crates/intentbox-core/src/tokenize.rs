//! Text normalization and vocabulary lookup.
//!
//! 1. Lowercase the whole input.
//! 2. Collapse every run of Unicode punctuation (`P*`) or symbol (`S*`)
//!    characters into a single space.
//! 3. Split on the space separator.
//! 4. Map each word through the vocabulary; unknown words are dropped.
//!
//! Dropping is lossy on purpose: the model was trained on sequences that
//! never contained an "unknown" marker.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::{Code, Vocabulary};

const SEPARATOR: &str = " ";

static PUNCT_OR_SYMBOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{P}\p{S}]+").unwrap());

/// Lowercase `text` and replace punctuation/symbol runs with the separator.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    PUNCT_OR_SYMBOL.replace_all(&lowered, SEPARATOR).into_owned()
}

/// Split normalized text into non-empty words, in order.
pub fn words(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split(SEPARATOR).filter(|w| !w.is_empty())
}

/// Turn raw text into the ordered sequence of known vocabulary codes.
pub fn tokenize(text: &str, vocabulary: &Vocabulary) -> Vec<Code> {
    let normalized = normalize(text);
    let codes: Vec<Code> = words(&normalized)
        .filter_map(|w| vocabulary.code(w))
        .collect();
    debug!(question = %normalized, ?codes, "tokenized");
    codes
}

/// Whether `word` is something [`tokenize`] can produce and look up.
pub fn is_normalized_word(word: &str) -> bool {
    !word.is_empty()
        && !word.contains(SEPARATOR)
        && word.to_lowercase() == word
        && !PUNCT_OR_SYMBOL.is_match(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vocab() -> Vocabulary {
        Vocabulary::new(HashMap::from([
            ("dataframe".to_string(), 1),
            ("the".to_string(), 2),
            ("of".to_string(), 3),
            ("pandas".to_string(), 4),
            ("index".to_string(), 5),
        ]))
        .unwrap()
    }

    #[test]
    fn keeps_known_words_in_order() {
        let codes = tokenize("What is the index of a dataframe?", &vocab());
        assert_eq!(codes, vec![2, 5, 3, 1]);
    }

    #[test]
    fn lowercases_before_lookup() {
        assert_eq!(tokenize("PANDAS DataFrame", &vocab()), vec![4, 1]);
    }

    #[test]
    fn punctuation_runs_become_one_separator() {
        assert_eq!(normalize("the...index!?"), "the index ");
        assert_eq!(tokenize("pandas.dataframe.index", &vocab()), vec![4, 1, 5]);
    }

    #[test]
    fn symbols_split_words() {
        // `+`, `$`, `€` and `^` are symbols, not punctuation.
        assert_eq!(tokenize("the+index$of€pandas^", &vocab()), vec![2, 5, 3, 4]);
    }

    #[test]
    fn unknown_words_dropped_without_placeholder() {
        assert!(tokenize("how do I sort a list", &vocab()).is_empty());
        assert_eq!(tokenize("sort the list", &vocab()), vec![2]);
    }

    #[test]
    fn empty_and_blank_input() {
        assert!(tokenize("", &vocab()).is_empty());
        assert!(tokenize("   ", &vocab()).is_empty());
        assert!(tokenize("?!", &vocab()).is_empty());
    }

    #[test]
    fn repeated_spaces_do_not_produce_words() {
        let collected: Vec<&str> = words("the   index").collect();
        assert_eq!(collected, vec!["the", "index"]);
    }

    #[test]
    fn only_space_separates() {
        // Tabs are not punctuation, so the fused word is unknown.
        assert!(tokenize("the\tindex", &vocab()).is_empty());
    }

    #[test]
    fn normalized_word_check() {
        assert!(is_normalized_word("dataframe"));
        assert!(is_normalized_word("numpy2"));
        assert!(!is_normalized_word("DataFrame"));
        assert!(!is_normalized_word("data.frame"));
        assert!(!is_normalized_word("a b"));
        assert!(!is_normalized_word(""));
    }
}
