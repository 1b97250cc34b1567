//! Targeted fix for keyword components above the band ceiling.

use crate::analyzer::{count_component, Analyzer};
use crate::components::{synonyms_for, token_matches};
use crate::fixers::EDITOR_SYSTEM;
use crate::rewrite::rewrite_text;
use crate::tokenize::{extract_tokens_lower, sentences};
use seoblog_core::{ComponentAdjustment, OptimizationReport, OveruseResolution, RewriteRequest, Rewriter};
use std::sync::Arc;

/// Sentence fragments at or below this length are not worth pointing at.
const MIN_SENTENCE_CHARS: usize = 10;
/// Cap on sentences quoted per component to keep the instruction bounded.
const MAX_SENTENCES_PER_COMPONENT: usize = 12;

#[derive(Debug, Clone)]
struct Offender {
    component: String,
    count: usize,
    sentences: Vec<String>,
}

fn offending_sentences(content: &str, keyword: &str, component: &str) -> Vec<String> {
    let c = component.to_lowercase();
    let syn = synonyms_for(keyword, component);
    sentences(content, MIN_SENTENCE_CHARS)
        .into_iter()
        .filter(|s| {
            extract_tokens_lower(s)
                .iter()
                .any(|t| token_matches(t, &c, syn))
        })
        .take(MAX_SENTENCES_PER_COMPONENT)
        .collect()
}

#[derive(Clone)]
pub struct OveruseResolver {
    rewriter: Arc<dyn Rewriter>,
    analyzer: Analyzer,
    temperature: f64,
    max_tokens: u64,
}

impl OveruseResolver {
    pub fn new(rewriter: Arc<dyn Rewriter>, analyzer: Analyzer) -> Self {
        Self {
            rewriter,
            analyzer,
            temperature: 0.4,
            max_tokens: 4_096,
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u64) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn ceiling(&self) -> usize {
        self.analyzer.config().component_band.max
    }

    fn offenders(&self, content: &str, keyword: &str, report: &OptimizationReport) -> Vec<Offender> {
        report
            .components
            .iter()
            .filter(|c| c.count > self.ceiling())
            .map(|c| Offender {
                component: c.component.clone(),
                count: c.count,
                sentences: offending_sentences(content, keyword, &c.component),
            })
            .collect()
    }

    fn instruction(
        &self,
        content: &str,
        keyword: &str,
        report: &OptimizationReport,
        offenders: &[Offender],
    ) -> String {
        let cfg = self.analyzer.config();
        let ceiling = self.ceiling();
        let mut out = String::from("아래 본문에서 일부 키워드 구성요소가 너무 자주 쓰였습니다.\n\n");
        for o in offenders {
            out.push_str(&format!(
                "- '{}': 현재 {}회 -> {}회 이하로 줄이기 ({}회 이상 감소)\n",
                o.component,
                o.count,
                ceiling,
                o.count - ceiling
            ));
            if !o.sentences.is_empty() {
                out.push_str("  해당 단어가 들어간 문장:\n");
                for s in &o.sentences {
                    out.push_str(&format!("  * {s}\n"));
                }
            }
        }
        let others = report
            .components
            .iter()
            .filter(|c| !offenders.iter().any(|o| o.component == c.component))
            .map(|c| format!("'{}' {}회", c.component, c.count))
            .collect::<Vec<_>>();

        out.push_str(
            "\n위 문장들에서 동의어로 바꾸거나 반복되는 표현을 정리해 사용 횟수를 줄이세요.\n\n[반드시 유지할 것]\n",
        );
        out.push_str(&format!(
            "- 완전 키워드 '{keyword}' {}회 이상 (현재 {}회)\n",
            cfg.min_complete_keyword, report.complete_keyword_count
        ));
        if !others.is_empty() {
            out.push_str(&format!(
                "- 다른 구성요소의 사용 횟수: {}\n",
                others.join(", ")
            ));
        }
        out.push_str(&format!(
            "- 글자수(공백 제외) {}자 범위\n- 소제목 구조와 글의 흐름\n\n수정된 전체 본문만 출력하세요.\n\n[본문]\n{content}",
            cfg.char_band
        ));
        out
    }

    /// Reduce over-ceiling components in one rewrite, then verify each of them.
    pub async fn resolve(&self, content: &str, keyword: &str) -> OveruseResolution {
        let report = self.analyzer.analyze(content, keyword, None);
        let offenders = self.offenders(content, keyword, &report);
        if offenders.is_empty() {
            return OveruseResolution {
                content: content.to_string(),
                success: true,
                adjustments: Vec::new(),
            };
        }

        let req = RewriteRequest::new(self.instruction(content, keyword, &report, &offenders))
            .with_system(EDITOR_SYSTEM)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let revised = match rewrite_text(self.rewriter.as_ref(), &req).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "overuse rewrite failed; keeping content");
                return OveruseResolution {
                    content: content.to_string(),
                    success: false,
                    adjustments: offenders
                        .iter()
                        .map(|o| ComponentAdjustment {
                            component: o.component.clone(),
                            before: o.count,
                            after: o.count,
                            resolved: false,
                        })
                        .collect(),
                };
            }
        };

        let tokens = extract_tokens_lower(&revised);
        let adjustments: Vec<ComponentAdjustment> = offenders
            .iter()
            .map(|o| {
                let after = count_component(&tokens, keyword, &o.component);
                ComponentAdjustment {
                    component: o.component.clone(),
                    before: o.count,
                    after,
                    resolved: after <= self.ceiling(),
                }
            })
            .collect();
        for a in &adjustments {
            tracing::info!(component = %a.component, before = a.before, after = a.after, resolved = a.resolved, "overuse adjustment");
        }
        let success = adjustments.iter().all(|a| a.resolved);
        OveruseResolution {
            content: revised,
            success,
            adjustments,
        }
    }
}
