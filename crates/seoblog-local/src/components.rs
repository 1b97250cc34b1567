//! Keyword decomposition into the sub-words whose frequencies are constrained.

use regex::Regex;
use seoblog_core::{DecompositionSource, KeywordComponents};
use std::sync::OnceLock;

struct KnownCompound {
    keyword: &'static str,
    components: &'static [&'static str],
    /// Extra surface forms that count toward a component (component, allowances).
    synonyms: &'static [(&'static str, &'static [&'static str])],
}

/// Special-cased compounds. Keep this table small and explicit; the general path is
/// script-boundary splitting.
const KNOWN_COMPOUNDS: &[KnownCompound] = &[
    KnownCompound {
        keyword: "BMW코딩",
        components: &["BMW", "코딩"],
        synonyms: &[("코딩", &["튜닝", "설정"])],
    },
    KnownCompound {
        keyword: "엔진오일교체",
        components: &["엔진", "오일", "교체"],
        synonyms: &[],
    },
];

fn known(keyword: &str) -> Option<&'static KnownCompound> {
    let k = keyword.trim();
    KNOWN_COMPOUNDS
        .iter()
        .find(|c| c.keyword.eq_ignore_ascii_case(k))
}

fn hangul_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[가-힣]+").expect("static hangul regex"))
}

fn latin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]+").expect("static latin regex"))
}

/// Decompose `keyword`. Pure; the same keyword always yields the same components.
pub fn resolve_components(keyword: &str) -> KeywordComponents {
    let keyword = keyword.trim();
    if let Some(c) = known(keyword) {
        return KeywordComponents {
            keyword: keyword.to_string(),
            components: c.components.iter().map(|s| s.to_string()).collect(),
            source: DecompositionSource::KnownCompound,
        };
    }

    let mut components: Vec<String> = Vec::new();
    let runs = hangul_re()
        .find_iter(keyword)
        .chain(latin_re().find_iter(keyword))
        .map(|m| m.as_str());
    for run in runs {
        if run.chars().count() >= 2 && !components.iter().any(|c| c == run) {
            components.push(run.to_string());
        }
    }

    if components.is_empty() {
        return KeywordComponents {
            keyword: keyword.to_string(),
            components: vec![keyword.to_string()],
            source: DecompositionSource::Whole,
        };
    }
    KeywordComponents {
        keyword: keyword.to_string(),
        components,
        source: DecompositionSource::ScriptBoundary,
    }
}

/// Synonym allowances for `component` under `keyword` (empty for anything not in the table).
pub fn synonyms_for(keyword: &str, component: &str) -> &'static [&'static str] {
    known(keyword)
        .and_then(|c| c.synonyms.iter().find(|(comp, _)| *comp == component))
        .map(|(_, syn)| *syn)
        .unwrap_or(&[])
}

/// Does a lowercased token count toward `component` (also lowercased)?
pub fn token_matches(token_lower: &str, component_lower: &str, synonyms: &[&str]) -> bool {
    if component_lower.is_empty() {
        return false;
    }
    token_lower == component_lower
        || token_lower.contains(component_lower)
        || synonyms
            .iter()
            .any(|s| token_lower.contains(&s.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_compounds_use_the_table() {
        let c = resolve_components("BMW코딩");
        assert_eq!(c.components, vec!["BMW", "코딩"]);
        assert_eq!(c.source, DecompositionSource::KnownCompound);

        let c = resolve_components("엔진오일교체");
        assert_eq!(c.components, vec!["엔진", "오일", "교체"]);
        assert_eq!(c.source, DecompositionSource::KnownCompound);
    }

    #[test]
    fn script_boundaries_split_mixed_keywords() {
        let c = resolve_components("아우디A6수리");
        // Hangul runs first, then Latin runs; "A" is a single letter and is dropped.
        assert_eq!(c.components, vec!["아우디", "수리"]);
        assert_eq!(c.source, DecompositionSource::ScriptBoundary);

        let c = resolve_components("강남 헬스PT");
        assert_eq!(c.components, vec!["강남", "헬스", "PT"]);
    }

    #[test]
    fn short_keyword_is_its_own_component() {
        let c = resolve_components("a");
        assert_eq!(c.components, vec!["a"]);
        assert_eq!(c.source, DecompositionSource::Whole);
    }

    #[test]
    fn duplicate_runs_collapse() {
        let c = resolve_components("수리 수리점 수리");
        assert_eq!(c.components, vec!["수리", "수리점"]);
    }

    #[test]
    fn synonyms_are_scoped_to_their_compound() {
        assert_eq!(synonyms_for("BMW코딩", "코딩"), &["튜닝", "설정"]);
        assert!(synonyms_for("BMW코딩", "BMW").is_empty());
        assert!(synonyms_for("벤츠코딩", "코딩").is_empty());
    }

    #[test]
    fn matching_is_equals_or_contains() {
        assert!(token_matches("교체", "교체", &[]));
        assert!(token_matches("교체는", "교체", &[]));
        assert!(token_matches("오일교체", "교체", &[]));
        assert!(!token_matches("교환", "교체", &[]));
        assert!(token_matches("튜닝을", "코딩", &["튜닝", "설정"]));
    }
}
