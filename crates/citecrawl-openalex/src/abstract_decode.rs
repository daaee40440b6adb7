//! Decode OpenAlex abstract inverted index to plaintext
//!
//! OpenAlex ships abstracts as inverted indexes:
//! ```json
//! {"Despite": [0], "growing": [1], "interest": [2, 50], ...}
//! ```
//! This module reconstructs the original word order.

use serde_json::{Map, Value};

/// Decode inverted index to plaintext abstract
///
/// Input: JSON object mapping words to position arrays.
/// Output: space-joined words sorted by position.
pub fn decode_inverted_index(index: &Map<String, Value>) -> String {
    // One slot per occurrence, not per word
    let occurrences: usize = index
        .values()
        .filter_map(Value::as_array)
        .map(Vec::len)
        .sum();
    let mut slots: Vec<(u64, &str)> = Vec::with_capacity(occurrences);

    for (word, positions) in index {
        let Some(positions) = positions.as_array() else {
            continue;
        };
        for pos in positions {
            if let Some(p) = pos.as_u64() {
                slots.push((p, word.as_str()));
            }
        }
    }

    slots.sort_unstable_by_key(|&(pos, _)| pos);

    let mut text = String::new();
    for (i, (_, word)) in slots.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(word);
    }
    text
}

/// Decode an optional inverted index value, treating null, non-object, and
/// empty results as absent.
pub fn decode_abstract(value: Option<&Value>) -> Option<String> {
    let text = decode_inverted_index(value?.as_object()?);
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> String {
        decode_inverted_index(v.as_object().unwrap())
    }

    #[test]
    fn empty_index_gives_empty_text() {
        assert_eq!(decode(json!({})), "");
    }

    #[test]
    fn words_ordered_by_position() {
        // object key order differs from position order
        let text = decode(json!({"cascade": [1], "Citation": [0], "extraction": [2]}));
        assert_eq!(text, "Citation cascade extraction");
    }

    #[test]
    fn repeated_word_at_multiple_positions() {
        let text = decode(json!({"the": [0, 3], "graph": [1], "spans": [2], "corpus": [4]}));
        assert_eq!(text, "the graph spans the corpus");
    }

    #[test]
    fn non_numeric_positions_skipped() {
        let text = decode(json!({"kept": [0], "broken": ["x", null], "also": [1]}));
        assert_eq!(text, "kept also");
    }

    #[test]
    fn decode_abstract_absent() {
        assert_eq!(decode_abstract(None), None);
        assert_eq!(decode_abstract(Some(&Value::Null)), None);
        assert_eq!(decode_abstract(Some(&json!("not an object"))), None);
        assert_eq!(decode_abstract(Some(&json!({}))), None);
    }

    #[test]
    fn decode_abstract_present() {
        let v = json!({"level": [1], "One": [0], "synchronized": [2]});
        assert_eq!(
            decode_abstract(Some(&v)),
            Some("One level synchronized".to_string())
        );
    }
}
