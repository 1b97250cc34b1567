//! Frequency analysis: counts, constraint evaluation and the human-readable issue list.
//!
//! Issue strings are part of the contract with `incremental`, which parses them back:
//! overuse issues contain `과다`/`초과` and quote the word (`'교체'`), dominance issues contain
//! `우위성 미달` and list `'word'(N회)` pairs.

use crate::components::{resolve_components, synonyms_for, token_matches};
use crate::config::AnalyzerConfig;
use crate::terms::check_terms;
use crate::tokenize::{character_count, extract_tokens_lower};
use seoblog_core::{
    ComponentCount, ConstraintKind, ConstraintResult, OptimizationReport, WordCount,
};
use std::collections::HashMap;

/// Dominance issues list at most this many words.
const MAX_DOMINANT_LISTED: usize = 5;

/// Count tokens equal to or starting with `keyword` (case-insensitive).
pub fn count_complete_keyword(tokens_lower: &[String], keyword: &str) -> usize {
    let k = keyword.trim().to_lowercase();
    if k.is_empty() {
        return 0;
    }
    tokens_lower.iter().filter(|t| t.starts_with(&k)).count()
}

/// Count tokens that equal or contain `component` (or one of its synonym allowances).
pub fn count_component(tokens_lower: &[String], keyword: &str, component: &str) -> usize {
    let c = component.to_lowercase();
    let syn = synonyms_for(keyword, component);
    tokens_lower
        .iter()
        .filter(|t| token_matches(t, &c, syn))
        .count()
}

/// Per-component counts straight from the text, without building a report.
pub fn component_counts(content: &str, keyword: &str) -> Vec<(String, usize)> {
    let tokens = extract_tokens_lower(content);
    resolve_components(keyword)
        .components
        .into_iter()
        .map(|c| {
            let n = count_component(&tokens, keyword, &c);
            (c, n)
        })
        .collect()
}

/// Frequencies of words that are neither a keyword component nor the keyword itself,
/// most frequent first (ties by word).
pub fn other_word_frequencies(
    tokens_lower: &[String],
    keyword: &str,
    components: &[String],
    min_chars: usize,
) -> Vec<WordCount> {
    let k = keyword.trim().to_lowercase();
    let comps: Vec<(String, &'static [&'static str])> = components
        .iter()
        .map(|c| (c.to_lowercase(), synonyms_for(keyword, c)))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in tokens_lower {
        if t.chars().count() < min_chars {
            continue;
        }
        if !k.is_empty() && t.starts_with(&k) {
            continue;
        }
        if comps.iter().any(|(c, syn)| token_matches(t, c, syn)) {
            continue;
        }
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }

    let mut out: Vec<WordCount> = counts
        .into_iter()
        .map(|(w, n)| WordCount {
            word: w.to_string(),
            count: n,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    out
}

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(
        &self,
        content: &str,
        keyword: &str,
        custom_terms: Option<&str>,
    ) -> OptimizationReport {
        let cfg = &self.config;
        let tokens = extract_tokens_lower(content);
        let character_count = character_count(content);
        let complete_keyword_count = count_complete_keyword(&tokens, keyword);
        let decomposition = resolve_components(keyword);

        let components: Vec<ComponentCount> = decomposition
            .components
            .iter()
            .map(|c| {
                let count = count_component(&tokens, keyword, c);
                ComponentCount {
                    component: c.clone(),
                    count,
                    in_band: cfg.component_band.contains(count),
                }
            })
            .collect();

        let others = other_word_frequencies(
            &tokens,
            keyword,
            &decomposition.components,
            cfg.min_word_chars,
        );
        let overused_words: Vec<WordCount> = others
            .iter()
            .filter(|w| w.count > cfg.overuse_limit)
            .cloned()
            .collect();
        let strongest_component = components.iter().map(|c| c.count).max().unwrap_or(0);
        let dominant_words: Vec<WordCount> = others
            .iter()
            .filter(|w| w.count > strongest_component)
            .take(MAX_DOMINANT_LISTED)
            .cloned()
            .collect();

        let custom_terms = check_terms(content, custom_terms);

        let mut constraints = Vec::new();
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        // Complete keyword.
        let kw_ok = complete_keyword_count >= cfg.min_complete_keyword;
        let kw_target = format!("{}회 이상", cfg.min_complete_keyword);
        constraints.push(ConstraintResult {
            kind: ConstraintKind::CompleteKeywordFrequency,
            subject: Some(keyword.to_string()),
            passed: kw_ok,
            current: complete_keyword_count,
            target: kw_target.clone(),
            description: format!(
                "완전 키워드 '{keyword}' 사용 횟수: {complete_keyword_count}회 (목표: {kw_target})"
            ),
        });
        if !kw_ok {
            issues.push(format!(
                "완전 키워드 '{keyword}' 부족: 현재 {complete_keyword_count}회 (목표: {kw_target})"
            ));
            suggestions.push(format!(
                "'{keyword}'를 {}회 더 자연스럽게 포함하세요",
                cfg.min_complete_keyword - complete_keyword_count
            ));
        }

        // Components.
        let band = cfg.component_band;
        for c in &components {
            let target = format!("{band}회");
            constraints.push(ConstraintResult {
                kind: ConstraintKind::ComponentFrequency,
                subject: Some(c.component.clone()),
                passed: c.in_band,
                current: c.count,
                target: target.clone(),
                description: format!(
                    "키워드 구성요소 '{}' 사용 횟수: {}회 (목표: {target})",
                    c.component, c.count
                ),
            });
            if c.count < band.min {
                issues.push(format!(
                    "키워드 구성요소 '{}' 부족: 현재 {}회 (목표: {target})",
                    c.component, c.count
                ));
                suggestions.push(format!(
                    "'{}'를 {}회 더 사용하세요",
                    c.component,
                    band.deficit(c.count)
                ));
            } else if c.count > band.max {
                issues.push(format!(
                    "키워드 구성요소 '{}' 과다 사용: 현재 {}회 (목표: {target})",
                    c.component, c.count
                ));
                suggestions.push(format!(
                    "'{}' 사용을 {}회 줄이세요 (동의어 치환 또는 반복 문장 정리)",
                    c.component,
                    band.excess(c.count)
                ));
            }
        }
        let is_keyword_optimized = kw_ok && components.iter().all(|c| c.in_band);

        // Character count.
        let cb = cfg.char_band;
        let is_length_optimized = cb.contains(character_count);
        constraints.push(ConstraintResult {
            kind: ConstraintKind::CharacterCount,
            subject: None,
            passed: is_length_optimized,
            current: character_count,
            target: format!("{cb}자"),
            description: format!("글자수(공백 제외): {character_count}자 (목표: {cb}자)"),
        });
        if character_count < cb.min {
            issues.push(format!(
                "글자수 부족: 현재 {character_count}자 (목표: {cb}자)"
            ));
            suggestions.push(format!(
                "약 {}자 분량을 보강하세요",
                cb.deficit(character_count)
            ));
        } else if character_count > cb.max {
            issues.push(format!(
                "글자수 초과: 현재 {character_count}자 (목표: {cb}자)"
            ));
            suggestions.push(format!("약 {}자를 줄이세요", cb.excess(character_count)));
        }

        // Word frequency health.
        for w in &overused_words {
            constraints.push(ConstraintResult {
                kind: ConstraintKind::ComponentDominance,
                subject: Some(w.word.clone()),
                passed: false,
                current: w.count,
                target: format!("{}회 이하", cfg.overuse_limit),
                description: format!(
                    "단어 '{}' 사용 횟수: {}회 (최대 {}회)",
                    w.word, w.count, cfg.overuse_limit
                ),
            });
            issues.push(format!(
                "단어 '{}' 과다 사용: 현재 {}회 (최대 {}회)",
                w.word, w.count, cfg.overuse_limit
            ));
            suggestions.push(format!("'{}'를 동의어로 5-7회 바꾸세요", w.word));
        }
        let dominance_ok = dominant_words.is_empty();
        constraints.push(ConstraintResult {
            kind: ConstraintKind::ComponentDominance,
            subject: None,
            passed: dominance_ok,
            current: dominant_words.first().map(|w| w.count).unwrap_or(0),
            target: format!("{strongest_component}회 이하"),
            description: "키워드 구성요소가 가장 많이 쓰인 단어여야 함".to_string(),
        });
        if !dominance_ok {
            let listed = dominant_words
                .iter()
                .map(|w| format!("'{}'({}회)", w.word, w.count))
                .collect::<Vec<_>>()
                .join(", ");
            issues.push(format!(
                "키워드 우위성 미달: {listed} 단어가 모든 키워드 구성요소(최대 {strongest_component}회)보다 많이 사용됨"
            ));
            suggestions.push(
                "우위 단어들을 각각 10회 이하로 줄이고 키워드 구성요소는 유지하세요".to_string(),
            );
        }
        let is_frequency_balanced = overused_words.is_empty() && dominance_ok;

        // Custom terms.
        let is_custom_morphemes_optimized = custom_terms.is_complete();
        for t in custom_terms.used.iter().chain(custom_terms.missing.iter()) {
            let passed = custom_terms.used.contains(t);
            constraints.push(ConstraintResult {
                kind: ConstraintKind::CustomTermPresence,
                subject: Some(t.clone()),
                passed,
                current: usize::from(passed),
                target: "1회 이상".to_string(),
                description: format!("필수 사용어 '{t}'"),
            });
        }
        if !is_custom_morphemes_optimized {
            let missing = custom_terms.missing.join(", ");
            issues.push(format!("필수 사용어 누락: {missing}"));
            suggestions.push(format!("다음 단어를 본문에 포함하세요: {missing}"));
        }

        // Word-frequency health is advisory; it feeds the repair loop but never gates success.
        let is_optimized =
            is_keyword_optimized && is_length_optimized && is_custom_morphemes_optimized;

        tracing::debug!(
            keyword,
            character_count,
            complete_keyword_count,
            components = ?components.iter().map(|c| (&c.component, c.count)).collect::<Vec<_>>(),
            issues = issues.len(),
            is_optimized,
            "analyzed content"
        );

        OptimizationReport {
            is_optimized,
            is_keyword_optimized,
            is_length_optimized,
            is_custom_morphemes_optimized,
            is_frequency_balanced,
            character_count,
            char_band: cb,
            complete_keyword_count,
            components,
            overused_words,
            dominant_words,
            custom_terms,
            constraints,
            issues,
            suggestions,
        }
    }
}

/// Analyze with the default thresholds (character band 1500-1700).
pub fn analyze(content: &str, keyword: &str, custom_terms: Option<&str>) -> OptimizationReport {
    Analyzer::default().analyze(content, keyword, custom_terms)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Synthetic Korean content with exact token counts.

    use crate::tokenize::character_count;

    /// Syllables that never form any component used in tests.
    const FILLER_SYLLABLES: [char; 16] = [
        '하', '루', '바', '다', '나', '무', '구', '름', '시', '간', '사', '람', '마', '음', '노', '을',
    ];

    /// A distinct 3-syllable filler word for each `i` (< 4096).
    pub fn filler_word(i: usize) -> String {
        let n = FILLER_SYLLABLES.len();
        [i / (n * n) % n, i / n % n, i % n]
            .iter()
            .map(|&d| FILLER_SYLLABLES[d])
            .collect()
    }

    /// Interleave `parts` (word, times) with unique filler words into sentences, then pad with a
    /// single `흠…` word so the non-whitespace character count is exactly `target_chars`.
    pub fn synthetic(parts: &[(&str, usize)], target_chars: usize) -> String {
        let mut queue: Vec<String> = Vec::new();
        let max = parts.iter().map(|(_, n)| *n).max().unwrap_or(0);
        for round in 0..max {
            for (w, n) in parts {
                if round < *n {
                    queue.push(w.to_string());
                }
            }
        }

        let mut words: Vec<String> = Vec::new();
        let mut filler = 0usize;
        for w in queue {
            words.push(w);
            words.push(filler_word(filler));
            filler += 1;
        }
        let mut out = sentences_from(&words);
        // Leave room for the pad word (and its trailing period).
        while character_count(&out) + 3 + 1 + 8 < target_chars {
            words.push(filler_word(filler));
            filler += 1;
            out = sentences_from(&words);
        }
        let have = character_count(&out);
        assert!(have < target_chars, "parts alone exceed target: {have}");
        let pad = target_chars - have - 1;
        out.push(' ');
        out.push_str(&"흠".repeat(pad));
        out.push('.');
        assert_eq!(character_count(&out), target_chars);
        out
    }

    fn sentences_from(words: &[String]) -> String {
        words
            .chunks(6)
            .map(|c| format!("{}.", c.join(" ")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Scenario content for `엔진오일교체`: the complete keyword `kw` times (each use also counts
    /// toward every component) plus standalone uses so each component totals `comp`.
    pub fn engine_oil(kw: usize, engine: usize, oil: usize, swap: usize, chars: usize) -> String {
        synthetic(
            &[
                ("엔진오일교체", kw),
                ("엔진", engine - kw),
                ("오일", oil - kw),
                ("교체", swap - kw),
            ],
            chars,
        )
    }
}
