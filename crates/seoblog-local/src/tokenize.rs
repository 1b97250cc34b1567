//! Coarse token extraction used for all frequency counting.
//!
//! This is not a morphological analyzer. Particles stay attached (`키워드가`, `키워드는` are
//! distinct tokens); downstream matching uses "equals/contains/starts-with" to fold them back.
//! The frequency bands in `analyzer` are tuned against exactly this behavior.

use regex::Regex;
use std::sync::OnceLock;

/// Separators between pieces. Anything else that is not a token char is dropped inside a piece.
const PUNCTUATION: &str = ".,!?;:'\"()[]{}-_=+|\\/~`@#$%^&*<>";

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[가-힣A-Za-z0-9]+").expect("static token regex"))
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || PUNCTUATION.contains(ch)
}

/// Split `text` into tokens, in source order.
pub fn extract_tokens(text: &str) -> Vec<String> {
    let re = token_re();
    text.split(is_separator)
        .filter(|piece| !piece.is_empty())
        .flat_map(|piece| re.find_iter(piece).map(|m| m.as_str().to_string()))
        .collect()
}

/// Lowercased tokens, for case-insensitive matching.
pub fn extract_tokens_lower(text: &str) -> Vec<String> {
    extract_tokens(text)
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Number of characters excluding whitespace.
pub fn character_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Sentence-ish fragments: split on `.`, `!`, `?`, trimmed, keeping those longer than `min_chars`.
pub fn sentences(text: &str, min_chars: usize) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() > min_chars)
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn particles_stay_attached() {
        let t = extract_tokens("키워드가 좋고, 키워드는 중요하며 키워드를 씁니다.");
        assert_eq!(
            t,
            vec!["키워드가", "좋고", "키워드는", "중요하며", "키워드를", "씁니다"]
        );
    }

    #[test]
    fn mixed_script_runs_are_one_token() {
        let t = extract_tokens("BMW코딩을 (2024년) 진행!");
        assert_eq!(t, vec!["BMW코딩을", "2024년", "진행"]);
    }

    #[test]
    fn other_symbols_split_inside_a_piece() {
        // '·' is neither whitespace nor listed punctuation: it is dropped, not kept in a token.
        let t = extract_tokens("엔진·오일");
        assert_eq!(t, vec!["엔진", "오일"]);
    }

    #[test]
    fn empty_and_symbol_only_inputs() {
        assert!(extract_tokens("").is_empty());
        assert!(extract_tokens("  ...!!  ").is_empty());
    }

    #[test]
    fn character_count_ignores_whitespace_only() {
        assert_eq!(character_count("가 나\n다\t."), 4);
        assert_eq!(character_count(""), 0);
    }

    #[test]
    fn sentences_keep_long_fragments() {
        let s = sentences("짧다. 이 문장은 열 글자를 확실히 넘습니다! 응?", 10);
        assert_eq!(s, vec!["이 문장은 열 글자를 확실히 넘습니다"]);
    }

    proptest! {
        #[test]
        fn tokens_are_nonempty_and_only_token_chars(s in any::<String>()) {
            for t in extract_tokens(&s) {
                prop_assert!(!t.is_empty());
                prop_assert!(t.chars().all(|c| ('가'..='힣').contains(&c) || c.is_ascii_alphanumeric()));
            }
        }

        #[test]
        fn tokenization_ignores_extra_whitespace(words in prop::collection::vec("[가-힣a-z]{1,6}", 0..20)) {
            let tight = words.join(" ");
            let loose = words.join("  \n\t ");
            prop_assert_eq!(extract_tokens(&tight), extract_tokens(&loose));
        }
    }
}
