//! Strict generation: draft, bounded repair cascade, one last-resort draft.
//!
//! The best candidate seen so far is carried explicitly through the run and every repair
//! works on it. A run never fails outright: the worst case is a placeholder with
//! `success = false`.

use crate::analyzer::Analyzer;
use crate::cascade::{default_strategies, Candidate, RepairContext, RepairStrategy};
use crate::config::{AnalyzerConfig, EngineConfig};
use crate::prompts::{draft_request, last_resort_request, SeoTargets};
use crate::rewrite::rewrite_text;
use seoblog_core::{GenerationOutcome, GenerationRequest, OptimizationReport, RewriteRequest, Rewriter};
use std::sync::Arc;

const INITIAL_DRAFT: &str = "initial_draft";
const LAST_RESORT: &str = "last_resort_draft";

/// Ordering key: lower is better.
fn rank(report: &OptimizationReport, cfg: &AnalyzerConfig) -> (bool, usize, usize) {
    let keyword_deviation = report
        .components
        .iter()
        .map(|c| cfg.component_band.deviation(c.count))
        .sum::<usize>()
        + cfg
            .min_complete_keyword
            .saturating_sub(report.complete_keyword_count);
    let length_deviation = report.char_band.deviation(report.character_count);
    (!report.is_optimized, keyword_deviation, length_deviation)
}

/// Whether `candidate` should replace `best`.
pub fn is_better(candidate: &OptimizationReport, best: &OptimizationReport, cfg: &AnalyzerConfig) -> bool {
    rank(candidate, cfg) < rank(best, cfg)
}

/// Returned when no rewrite call ever produced text.
fn placeholder(keyword: &str) -> String {
    format!(
        "'{keyword}' 블로그 글 생성에 실패했습니다. 글쓰기 서비스에 연결할 수 없거나 응답이 비어 있었습니다. \
잠시 후 다시 시도해 주세요."
    )
}

pub struct Orchestrator {
    rewriter: Arc<dyn Rewriter>,
    config: EngineConfig,
    analyzer: Analyzer,
    strategies: Vec<Box<dyn RepairStrategy>>,
}

impl Orchestrator {
    pub fn new(rewriter: Arc<dyn Rewriter>, config: EngineConfig) -> Self {
        Self {
            rewriter,
            analyzer: Analyzer::new(config.generation_analyzer()),
            config,
            strategies: default_strategies(),
        }
    }

    /// Replace the repair cascade.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn RepairStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    async fn draft(&self, req: &RewriteRequest, keyword: &str, custom: Option<&str>) -> Option<Candidate> {
        match rewrite_text(self.rewriter.as_ref(), req).await {
            Ok(content) => {
                let report = self.analyzer.analyze(&content, keyword, custom);
                Some(Candidate { content, report })
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.rewriter.name(),
                    transient = e.is_transient(),
                    error = %e,
                    "draft failed"
                );
                None
            }
        }
    }

    fn finish(&self, c: Candidate, attempts: u32, applied: Vec<String>) -> GenerationOutcome {
        GenerationOutcome {
            success: c.report.is_optimized,
            content: c.content,
            analysis: c.report,
            attempts,
            strategies_applied: applied,
        }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let keyword = request.keyword.trim();
        let custom = request.custom_terms.as_deref();
        let targets = SeoTargets::new(keyword, &self.config);
        let ctx = RepairContext {
            rewriter: self.rewriter.clone(),
            request,
            targets: &targets,
            config: &self.config,
            analyzer: &self.analyzer,
        };
        let cfg = self.analyzer.config();

        let mut best: Option<Candidate> = None;
        let mut used = vec![false; self.strategies.len()];
        let mut applied: Vec<String> = Vec::new();
        let mut attempts = 0;

        for attempt in 1..=self.config.max_generation_attempts.max(1) {
            attempts = attempt;
            let Some(current) = best.clone() else {
                tracing::info!(attempt, keyword, "drafting");
                applied.push(INITIAL_DRAFT.to_string());
                let draft = draft_request(request, &targets, &self.config);
                if let Some(c) = self.draft(&draft, keyword, custom).await {
                    if c.report.is_optimized {
                        tracing::info!(attempt, "draft met every target");
                        return self.finish(c, attempts, applied);
                    }
                    best = Some(c);
                }
                continue;
            };

            for (i, strategy) in self.strategies.iter().enumerate() {
                if used[i] || !strategy.applies(&current, &ctx) {
                    continue;
                }
                used[i] = true;
                applied.push(strategy.name().to_string());
                tracing::info!(attempt, strategy = strategy.name(), "repairing");

                let Some(content) = strategy.attempt(&ctx, &current).await else {
                    continue;
                };
                let report = self.analyzer.analyze(&content, keyword, custom);
                let candidate = Candidate { content, report };
                if candidate.report.is_optimized {
                    tracing::info!(attempt, strategy = strategy.name(), "repair met every target");
                    return self.finish(candidate, attempts, applied);
                }
                if is_better(&candidate.report, &current.report, cfg) {
                    tracing::info!(attempt, strategy = strategy.name(), "repair improved best candidate");
                    best = Some(candidate);
                    break;
                }
            }
        }

        attempts += 1;
        tracing::info!(attempt = attempts, "last-resort draft");
        applied.push(LAST_RESORT.to_string());
        let last = self
            .draft(&last_resort_request(request, &targets, &self.config), keyword, custom)
            .await;
        let chosen = match (best, last) {
            (_, Some(l)) if l.report.is_optimized => l,
            (Some(b), Some(l)) => {
                if is_better(&b.report, &l.report, cfg) {
                    b
                } else {
                    l
                }
            }
            (Some(b), None) => b,
            (None, Some(l)) => l,
            (None, None) => {
                tracing::warn!(keyword, "no content was produced");
                let content = placeholder(keyword);
                let report = self.analyzer.analyze(&content, keyword, custom);
                Candidate { content, report }
            }
        };
        self.finish(chosen, attempts, applied)
    }
}
