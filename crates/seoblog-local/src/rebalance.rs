//! Local, deterministic rebalancing.
//!
//! Decides *what* to change from the counts alone: which sentences to edit, which words to
//! swap, which sections to grow or shrink. Simple token swaps and structure restoration are
//! applied here; anything that needs fluent Korean is handed to the rewriter as an explicit
//! edit list.

use crate::analyzer::Analyzer;
use crate::components::{synonyms_for, token_matches};
use crate::tokenize::{character_count, extract_tokens_lower};
use regex::Regex;
use seoblog_core::{OptimizationReport, WordCount};
use std::sync::OnceLock;

/// Built-in substitutions for filler words that commonly crowd out keywords in blog prose.
const LOCAL_SYNONYMS: &[(&str, &str)] = &[
    ("정말", "참"),
    ("매우", "무척"),
    ("가장", "제일"),
    ("많은", "여러"),
    ("다양한", "여러 가지"),
    ("중요한", "핵심적인"),
    ("좋은", "훌륭한"),
    ("방법", "방안"),
    ("경우", "때"),
    ("사용", "활용"),
    ("확인", "점검"),
    ("고객", "손님"),
    ("문제", "어려움"),
    ("추천", "권장"),
    ("필요합니다", "요구됩니다"),
    ("있습니다", "있어요"),
    ("합니다", "해요"),
    ("때문에", "덕분에"),
];

fn local_synonym(word: &str) -> Option<&'static str> {
    LOCAL_SYNONYMS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, s)| *s)
}

fn is_token_char(c: char) -> bool {
    ('가'..='힣').contains(&c) || c.is_ascii_alphanumeric()
}

/// Byte offsets of whole-token occurrences of `word` in `text`.
fn token_occurrences(text: &str, word: &str) -> Vec<usize> {
    text.match_indices(word)
        .filter(|(i, _)| {
            let before = text[..*i].chars().next_back();
            let after = text[i + word.len()..].chars().next();
            !before.is_some_and(is_token_char) && !after.is_some_and(is_token_char)
        })
        .map(|(i, _)| i)
        .collect()
}

/// A deterministic word swap that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub word: String,
    pub replacement: String,
    pub replaced: usize,
}

/// Replace every other whole-token occurrence of each overused word (from the second on)
/// until it is at or under `limit`. Replacements never introduce a keyword component.
pub fn apply_local_substitutions(
    content: &str,
    overused: &[WordCount],
    limit: usize,
    keyword: &str,
    components: &[String],
) -> (String, Vec<Substitution>) {
    let mut text = content.to_string();
    let mut applied = Vec::new();
    for w in overused {
        let Some(replacement) = local_synonym(&w.word) else {
            continue;
        };
        let repl_tokens = extract_tokens_lower(replacement);
        let clashes = components.iter().any(|c| {
            let cl = c.to_lowercase();
            let syn = synonyms_for(keyword, c);
            repl_tokens.iter().any(|t| token_matches(t, &cl, syn))
        });
        if clashes {
            continue;
        }

        let need = w.count.saturating_sub(limit);
        let occ = token_occurrences(&text, &w.word);
        let chosen: Vec<usize> = occ.iter().skip(1).step_by(2).take(need).copied().collect();
        if chosen.is_empty() {
            continue;
        }
        // Replace back to front so earlier offsets stay valid.
        for &i in chosen.iter().rev() {
            text.replace_range(i..i + w.word.len(), replacement);
        }
        applied.push(Substitution {
            word: w.word.clone(),
            replacement: replacement.to_string(),
            replaced: chosen.len(),
        });
    }
    (text, applied)
}

/// Split into sentences, keeping terminal punctuation.
fn split_sentences_keep(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        cur.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|n| n.is_whitespace()) {
            let s = cur.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
            cur.clear();
        }
    }
    let s = cur.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
    out
}

fn is_header(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn header_level(line: &str) -> usize {
    line.trim_start().chars().take_while(|c| *c == '#').count()
}

fn header_text(line: &str) -> &str {
    line.trim_start().trim_start_matches('#').trim()
}

fn numbering_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\s*[.)]\s*").expect("static numbering regex"))
}

/// Header text without a leading `1.` / `2)` the model may have added.
fn heading_key(text: &str) -> &str {
    let t = text.trim();
    match numbering_re().find(t) {
        Some(m) => t[m.end()..].trim(),
        None => t,
    }
}

/// For each subtitle, the section header (level 2 or deeper) that stands for it, as
/// `(line index, header text)`. Exact matches are claimed before containing ones and a
/// header stands for at most one subtitle. Level-1 headers are titles and never match.
fn claim_headers<'c>(content: &'c str, subtitles: &[&str]) -> Vec<Option<(usize, &'c str)>> {
    let headers: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, l)| header_level(l) >= 2)
        .map(|(i, l)| (i, header_text(l)))
        .collect();
    let mut taken = vec![false; headers.len()];
    let mut claimed = vec![None; subtitles.len()];
    for exact in [true, false] {
        for (si, sub) in subtitles.iter().enumerate() {
            if claimed[si].is_some() {
                continue;
            }
            let hit = headers.iter().enumerate().position(|(hi, (_, h))| {
                let key = heading_key(h);
                !taken[hi] && if exact { key == *sub } else { key.contains(sub) }
            });
            if let Some(hi) = hit {
                taken[hi] = true;
                claimed[si] = Some(headers[hi]);
            }
        }
    }
    claimed
}

fn trimmed_subtitles(subtitles: &[String]) -> Vec<&str> {
    subtitles
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Subtitles that no section header stands for.
pub fn missing_subtitles<'a>(content: &str, subtitles: &'a [String]) -> Vec<&'a str> {
    let subs = trimmed_subtitles(subtitles);
    let claimed = claim_headers(content, &subs);
    subs.into_iter()
        .zip(claimed)
        .filter(|(_, c)| c.is_none())
        .map(|(s, _)| s)
        .collect()
}

/// Split `units` into `k` contiguous, near-equal groups.
fn distribute(units: Vec<String>, k: usize) -> Vec<Vec<String>> {
    let n = units.len();
    let mut groups = vec![Vec::new(); k];
    for (i, u) in units.into_iter().enumerate() {
        groups[i * k / n.max(1)].push(u);
    }
    groups
}

/// Paragraphs, with every header line split out as its own block.
fn blocks(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    for para in body.split("\n\n") {
        let mut cur: Vec<&str> = Vec::new();
        for line in para.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if is_header(line) {
                if !cur.is_empty() {
                    out.push(cur.join("\n"));
                    cur.clear();
                }
                out.push(line.to_string());
            } else {
                cur.push(line);
            }
        }
        if !cur.is_empty() {
            out.push(cur.join("\n"));
        }
    }
    out
}

/// Join units with `sep`, but always put header lines on their own paragraph.
fn join_units(units: &[String], sep: &str) -> String {
    let mut out = String::new();
    for (i, u) in units.iter().enumerate() {
        if i > 0 {
            if is_header(u) || is_header(&units[i - 1]) {
                out.push_str("\n\n");
            } else {
                out.push_str(sep);
            }
        }
        out.push_str(u);
    }
    out
}

/// Rebuild `intro / ## subtitle x N / conclusion` if any subtitle header went missing.
/// Returns `None` when nothing needs restoring.
///
/// Only headers that stand for a known subtitle are moved; their text (numbering included) is
/// reused for the rebuilt section. Titles and other headers before the first paragraph stay on
/// top, and any other header stays with the text around it.
pub fn restore_structure(content: &str, subtitles: &[String]) -> Option<String> {
    let subs = trimmed_subtitles(subtitles);
    if subs.is_empty() {
        return None;
    }
    let claimed = claim_headers(content, &subs);
    if claimed.iter().all(Option::is_some) {
        return None;
    }
    let moved: Vec<usize> = claimed.iter().flatten().map(|(i, _)| *i).collect();

    let mut lead: Vec<&str> = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if moved.contains(&i) {
            continue;
        }
        if body.is_empty() && (is_header(line) || line.trim().is_empty()) {
            if is_header(line) {
                lead.push(line.trim());
            }
            continue;
        }
        body.push(line);
    }
    let body = body.join("\n");

    let k = subs.len() + 2;
    let mut units = blocks(&body);
    let mut sep = "\n\n";
    if units.len() < k {
        units = units
            .into_iter()
            .flat_map(|u| {
                if is_header(&u) {
                    vec![u]
                } else {
                    split_sentences_keep(&u)
                }
            })
            .collect();
        sep = " ";
    }

    let groups = distribute(units, k);
    let mut sections: Vec<String> = Vec::new();
    if !lead.is_empty() {
        sections.push(lead.join("\n"));
    }
    for (i, g) in groups.into_iter().enumerate() {
        if (1..=subs.len()).contains(&i) {
            let heading = claimed[i - 1].map(|(_, h)| h).unwrap_or(subs[i - 1]);
            sections.push(format!("## {heading}"));
        }
        if !g.is_empty() {
            sections.push(join_units(&g, sep));
        }
    }
    Some(sections.join("\n\n"))
}

/// Edits the rewriter should realize, decided locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalancePlan {
    /// (component, how many uses to remove, sentences to edit)
    pub reduce: Vec<(String, usize, Vec<String>)>,
    /// (component, how many uses to add)
    pub add: Vec<(String, usize)>,
    pub keyword_additions: usize,
    /// Sentences to drop or condense when over the character band.
    pub trim_sentences: Vec<String>,
    /// Characters to add when under the band.
    pub expand_chars: usize,
    pub missing_terms: Vec<String>,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        self.reduce.is_empty()
            && self.add.is_empty()
            && self.keyword_additions == 0
            && self.trim_sentences.is_empty()
            && self.expand_chars == 0
            && self.missing_terms.is_empty()
    }
}

fn sentence_hits(sentence: &str, keyword: &str, component: &str) -> usize {
    let c = component.to_lowercase();
    let syn = synonyms_for(keyword, component);
    extract_tokens_lower(sentence)
        .iter()
        .filter(|t| token_matches(t, &c, syn))
        .count()
}

/// Decide the edit list from the report. Never calls out.
pub fn plan(content: &str, report: &OptimizationReport, keyword: &str, analyzer: &Analyzer) -> RebalancePlan {
    let cfg = analyzer.config();
    let band = cfg.component_band;
    let sentences = split_sentences_keep(content);
    let complete = keyword.trim().to_lowercase();
    let mut plan = RebalancePlan::default();

    for c in &report.components {
        if c.count > band.max {
            let excess = c.count - band.max;
            // Sentences with the most hits first; never touch ones carrying the complete keyword.
            let mut candidates: Vec<(usize, &String)> = sentences
                .iter()
                .filter(|s| {
                    !extract_tokens_lower(s)
                        .iter()
                        .any(|t| t.starts_with(&complete))
                })
                .map(|s| (sentence_hits(s, keyword, &c.component), s))
                .filter(|(h, _)| *h > 0)
                .collect();
            candidates.sort_by(|a, b| b.0.cmp(&a.0));
            let mut picked = Vec::new();
            let mut covered = 0;
            for (h, s) in candidates {
                if covered >= excess {
                    break;
                }
                picked.push(s.clone());
                covered += h;
            }
            plan.reduce.push((c.component.clone(), excess, picked));
        } else if c.count < band.min {
            plan.add.push((c.component.clone(), band.midpoint() - c.count));
        }
    }

    plan.keyword_additions = cfg
        .min_complete_keyword
        .saturating_sub(report.complete_keyword_count);

    let chars = report.character_count;
    let cb = report.char_band;
    if chars > cb.max {
        let excess = chars - cb.midpoint();
        let mut candidates: Vec<&String> = sentences
            .iter()
            .filter(|s| {
                report
                    .components
                    .iter()
                    .all(|c| sentence_hits(s, keyword, &c.component) == 0)
            })
            .collect();
        candidates.sort_by_key(|s| std::cmp::Reverse(character_count(s)));
        let mut covered = 0;
        for s in candidates {
            if covered >= excess {
                break;
            }
            covered += character_count(s);
            plan.trim_sentences.push(s.clone());
        }
    } else if chars < cb.min {
        plan.expand_chars = cb.midpoint() - chars;
    }

    plan.missing_terms = report.custom_terms.missing.clone();
    plan
}

/// Instruction text for realizing `plan` in one rewrite.
pub fn realization_instruction(content: &str, plan: &RebalancePlan, keyword: &str) -> String {
    let mut out = String::from("아래 편집 목록만 그대로 적용하세요. 목록에 없는 부분은 바꾸지 마세요.\n\n[편집 목록]\n");
    let mut n = 0;
    let mut item = |out: &mut String, s: String| {
        n += 1;
        out.push_str(&format!("{n}. {s}\n"));
    };
    for (c, k, sentences) in &plan.reduce {
        item(
            &mut out,
            format!("'{c}'를 {k}회 줄이세요. 다음 문장에서만 동의어로 바꾸거나 표현을 줄이세요:"),
        );
        for s in sentences {
            out.push_str(&format!("   - {s}\n"));
        }
    }
    for (c, k) in &plan.add {
        item(&mut out, format!("'{c}'를 자연스러운 문장으로 {k}회 더 사용하세요."));
    }
    if plan.keyword_additions > 0 {
        item(
            &mut out,
            format!("'{keyword}'를 정확히 {}회 더 넣으세요.", plan.keyword_additions),
        );
    }
    if !plan.trim_sentences.is_empty() {
        item(&mut out, "다음 문장을 삭제하거나 절반 길이로 줄이세요:".to_string());
        for s in &plan.trim_sentences {
            out.push_str(&format!("   - {s}\n"));
        }
    }
    if plan.expand_chars > 0 {
        item(
            &mut out,
            format!(
                "각 소제목 아래 내용을 고르게 보강해 전체 약 {}자를 늘리세요.",
                plan.expand_chars
            ),
        );
    }
    if !plan.missing_terms.is_empty() {
        item(
            &mut out,
            format!("다음 단어를 1회 이상 넣으세요: {}", plan.missing_terms.join(", ")),
        );
    }
    out.push_str(&format!(
        "\n소제목(## 로 시작하는 줄)과 문단 순서, 키워드 '{keyword}'는 그대로 유지하고 수정된 전체 본문만 출력하세요.\n\n[본문]\n{content}"
    ));
    out
}
