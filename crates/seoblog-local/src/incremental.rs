//! Bounded analyze -> fix -> re-analyze loop over existing content.

use crate::analyzer::Analyzer;
use crate::config::{AnalyzerConfig, EngineConfig};
use crate::fixers::{fix_label, IssueFixer};
use regex::Regex;
use seoblog_core::{
    IncrementalOutcome, IssueKind, OptimizationIssue, OptimizationReport, Rewriter, WordCount,
};
use std::sync::{Arc, OnceLock};

/// Overused words taken from the analyzer's issue list per iteration.
const MAX_OVERUSED_PER_ROUND: usize = 3;
/// Ceiling requested for words that out-rank the keyword components.
const DOMINANT_WORD_CEILING: usize = 10;

fn quoted_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'([^']+)'.*?(\d+)회").expect("static overuse regex"))
}

fn dominance_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'([^']+)'\((\d+)회\)").expect("static dominance regex"))
}

/// Overused words named in `초과`/`과다` issue strings, most frequent first.
fn parse_overused(issues: &[String]) -> Vec<WordCount> {
    let mut out: Vec<WordCount> = issues
        .iter()
        .filter(|s| (s.contains("초과") || s.contains("과다")) && !s.contains("우위성"))
        .filter_map(|s| {
            let caps = quoted_count_re().captures(s)?;
            Some(WordCount {
                word: caps[1].to_string(),
                count: caps[2].parse().ok()?,
            })
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// `(word, count)` pairs out of `우위성 미달` issue strings.
fn parse_dominant(issues: &[String]) -> Vec<WordCount> {
    issues
        .iter()
        .filter(|s| s.contains("우위성 미달"))
        .flat_map(|s| {
            dominance_pair_re()
                .captures_iter(s)
                .filter_map(|c| {
                    Some(WordCount {
                        word: c[1].to_string(),
                        count: c[2].parse().ok()?,
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Turn a report into the concrete issues this loop knows how to repair.
pub fn enumerate_issues(
    report: &OptimizationReport,
    keyword: &str,
    cfg: &AnalyzerConfig,
) -> Vec<OptimizationIssue> {
    let mut out = Vec::new();
    let band = report.char_band;

    if report.character_count < band.min {
        out.push(OptimizationIssue {
            kind: IssueKind::CharacterDeficit,
            description: format!(
                "글자수 {}자 부족 (현재 {}자)",
                band.max - report.character_count,
                report.character_count
            ),
            target: band.max,
            current: report.character_count,
            word: None,
            dominant_words: Vec::new(),
        });
    } else if report.character_count > band.max {
        out.push(OptimizationIssue {
            kind: IssueKind::CharacterExcess,
            description: format!(
                "글자수 {}자 초과 (현재 {}자)",
                report.character_count - band.max,
                report.character_count
            ),
            target: band.max,
            current: report.character_count,
            word: None,
            dominant_words: Vec::new(),
        });
    }

    if report.complete_keyword_count < cfg.min_complete_keyword {
        out.push(OptimizationIssue {
            kind: IssueKind::KeywordDeficit,
            description: format!(
                "키워드 '{keyword}' {}회 부족",
                cfg.min_complete_keyword - report.complete_keyword_count
            ),
            target: cfg.min_complete_keyword,
            current: report.complete_keyword_count,
            word: None,
            dominant_words: Vec::new(),
        });
    }

    for c in &report.components {
        if c.count < cfg.component_band.min {
            out.push(OptimizationIssue {
                kind: IssueKind::ComponentDeficit,
                description: format!("'{}' {}회 부족", c.component, cfg.component_band.min - c.count),
                target: cfg.component_band.min,
                current: c.count,
                word: Some(c.component.clone()),
                dominant_words: Vec::new(),
            });
        }
    }

    for w in parse_overused(&report.issues)
        .into_iter()
        .take(MAX_OVERUSED_PER_ROUND)
    {
        let is_component = report.components.iter().any(|c| c.component == w.word);
        let target = if is_component {
            cfg.component_band.max
        } else {
            cfg.overuse_limit
        };
        out.push(OptimizationIssue {
            kind: IssueKind::OverusedWord,
            description: format!("'{}' 과다 사용 ({}회)", w.word, w.count),
            target,
            current: w.count,
            word: Some(w.word),
            dominant_words: Vec::new(),
        });
    }

    let dominant = parse_dominant(&report.issues);
    if !dominant.is_empty() {
        out.push(OptimizationIssue {
            kind: IssueKind::ComponentDominance,
            description: format!("키워드보다 많이 쓰인 단어 {}개", dominant.len()),
            target: DOMINANT_WORD_CEILING,
            current: dominant.iter().map(|w| w.count).max().unwrap_or(0),
            word: None,
            dominant_words: dominant,
        });
    }

    if !report.custom_terms.missing.is_empty() {
        out.push(OptimizationIssue {
            kind: IssueKind::MissingTerms,
            description: format!("필수 사용어 {}개 누락", report.custom_terms.missing.len()),
            target: report.custom_terms.missing.len(),
            current: 0,
            word: Some(report.custom_terms.missing.join(", ")),
            dominant_words: Vec::new(),
        });
    }

    out
}

/// The "re-optimize existing content" entry point.
#[derive(Clone)]
pub struct IncrementalOptimizer {
    fixer: IssueFixer,
    analyzer: Analyzer,
    max_iterations: u32,
}

impl IncrementalOptimizer {
    pub fn new(rewriter: Arc<dyn Rewriter>) -> Self {
        Self::from_config(rewriter, &EngineConfig::default())
    }

    pub fn from_config(rewriter: Arc<dyn Rewriter>, cfg: &EngineConfig) -> Self {
        Self {
            fixer: IssueFixer::new(rewriter).with_sampling(cfg.fix_temperature, cfg.max_tokens),
            analyzer: Analyzer::new(cfg.analyzer),
            max_iterations: cfg.max_incremental_iterations.max(1),
        }
    }

    pub async fn optimize(
        &self,
        content: &str,
        keyword: &str,
        custom_terms: Option<&str>,
    ) -> IncrementalOutcome {
        let mut content = content.to_string();
        let mut fixed: Vec<String> = Vec::new();

        for iteration in 1..=self.max_iterations {
            let report = self.analyzer.analyze(&content, keyword, custom_terms);
            let issues = enumerate_issues(&report, keyword, self.analyzer.config());
            if issues.is_empty() {
                tracing::info!(iteration, "incremental optimization converged");
                return IncrementalOutcome {
                    content,
                    success: report.is_optimized,
                    issues: Vec::new(),
                    fixed,
                    iterations: iteration - 1,
                };
            }

            if let [issue] = issues.as_slice() {
                tracing::info!(iteration, kind = ?issue.kind, "single-issue fix");
                content = self.fixer.fix_single(&content, issue, keyword).await;
                fixed.push(fix_label(issue, keyword));
            } else {
                tracing::info!(iteration, issues = issues.len(), "batch fix");
                content = self.fixer.fix_batch(&content, &issues, keyword).await;
                let labels = issues
                    .iter()
                    .map(|i| fix_label(i, keyword))
                    .collect::<Vec<_>>()
                    .join(", ");
                fixed.push(format!("복합 수정 ({}건): {labels}", issues.len()));
            }
        }

        let final_report = self.analyzer.analyze(&content, keyword, custom_terms);
        tracing::info!(
            success = final_report.is_optimized,
            remaining = final_report.issues.len(),
            "incremental optimization exhausted"
        );
        // Exhaustion reports no outstanding issues; `success` carries the failure.
        IncrementalOutcome {
            content,
            success: final_report.is_optimized,
            issues: Vec::new(),
            fixed,
            iterations: self.max_iterations,
        }
    }
}
