//! Repair strategies tried, in order, against the best candidate so far.

use crate::analyzer::{component_counts, Analyzer};
use crate::config::EngineConfig;
use crate::fixers::EDITOR_SYSTEM;
use crate::overuse::OveruseResolver;
use crate::prompts::{readability_rewrite_request, seo_rewrite_request, SeoTargets};
use crate::rebalance::{apply_local_substitutions, plan, realization_instruction, restore_structure};
use crate::rewrite::rewrite_text;
use async_trait::async_trait;
use seoblog_core::{GenerationRequest, OptimizationReport, RewriteRequest, Rewriter};
use std::sync::Arc;

/// A piece of content together with its analysis.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub content: String,
    pub report: OptimizationReport,
}

/// Everything a strategy may read during one generation run.
pub struct RepairContext<'a> {
    pub rewriter: Arc<dyn Rewriter>,
    pub request: &'a GenerationRequest,
    pub targets: &'a SeoTargets,
    pub config: &'a EngineConfig,
    pub analyzer: &'a Analyzer,
}

impl RepairContext<'_> {
    pub fn keyword(&self) -> &str {
        &self.targets.keyword
    }
}

#[async_trait]
pub trait RepairStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies(&self, _best: &Candidate, _ctx: &RepairContext<'_>) -> bool {
        true
    }

    /// New content derived from `best`, or `None` when nothing usable came back.
    async fn attempt(&self, ctx: &RepairContext<'_>, best: &Candidate) -> Option<String>;
}

/// The standard cascade order.
pub fn default_strategies() -> Vec<Box<dyn RepairStrategy>> {
    vec![
        Box::new(OveruseStrategy),
        Box::new(SeoRewriteStrategy),
        Box::new(ReadabilityRewriteStrategy),
        Box::new(LocalRebalanceStrategy),
    ]
}

fn changed(best: &Candidate, text: String) -> Option<String> {
    (text != best.content).then_some(text)
}

async fn whole_rewrite(ctx: &RepairContext<'_>, req: RewriteRequest, strategy: &str) -> Option<String> {
    match rewrite_text(ctx.rewriter.as_ref(), &req).await {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(strategy, error = %e, "repair rewrite failed");
            None
        }
    }
}

/// Runs whenever a component is above the band ceiling, read straight from the counts.
pub struct OveruseStrategy;

#[async_trait]
impl RepairStrategy for OveruseStrategy {
    fn name(&self) -> &'static str {
        "overuse_resolution"
    }

    fn applies(&self, best: &Candidate, ctx: &RepairContext<'_>) -> bool {
        let ceiling = ctx.config.analyzer.component_band.max;
        component_counts(&best.content, ctx.keyword())
            .iter()
            .any(|(_, n)| *n > ceiling)
    }

    async fn attempt(&self, ctx: &RepairContext<'_>, best: &Candidate) -> Option<String> {
        let resolver = OveruseResolver::new(ctx.rewriter.clone(), ctx.analyzer.clone())
            .with_sampling(ctx.config.fix_temperature, ctx.config.max_tokens);
        let out = resolver.resolve(&best.content, ctx.keyword()).await;
        changed(best, out.content)
    }
}

pub struct SeoRewriteStrategy;

#[async_trait]
impl RepairStrategy for SeoRewriteStrategy {
    fn name(&self) -> &'static str {
        "seo_rewrite"
    }

    async fn attempt(&self, ctx: &RepairContext<'_>, best: &Candidate) -> Option<String> {
        let req = seo_rewrite_request(&best.content, &best.report, ctx.targets, ctx.config);
        whole_rewrite(ctx, req, self.name()).await
    }
}

pub struct ReadabilityRewriteStrategy;

#[async_trait]
impl RepairStrategy for ReadabilityRewriteStrategy {
    fn name(&self) -> &'static str {
        "readability_rewrite"
    }

    async fn attempt(&self, ctx: &RepairContext<'_>, best: &Candidate) -> Option<String> {
        let req = readability_rewrite_request(&best.content, &best.report, ctx.targets, ctx.config);
        whole_rewrite(ctx, req, self.name()).await
    }
}

/// Structure restoration and synonym swaps done locally, then one rewrite realizing the
/// computed edit list. Local edits survive a failed rewrite.
pub struct LocalRebalanceStrategy;

#[async_trait]
impl RepairStrategy for LocalRebalanceStrategy {
    fn name(&self) -> &'static str {
        "local_rebalance"
    }

    async fn attempt(&self, ctx: &RepairContext<'_>, best: &Candidate) -> Option<String> {
        let keyword = ctx.keyword();
        let mut content = best.content.clone();

        if let Some(restored) = restore_structure(&content, &ctx.request.subtitles) {
            tracing::info!("restored missing subtitle headers");
            content = restored;
        }

        let (swapped, subs) = apply_local_substitutions(
            &content,
            &best.report.overused_words,
            ctx.analyzer.config().overuse_limit,
            keyword,
            &ctx.targets.components,
        );
        if !subs.is_empty() {
            tracing::info!(swaps = subs.len(), "applied local synonym swaps");
            content = swapped;
        }

        let custom = ctx.request.custom_terms.as_deref();
        let report = ctx.analyzer.analyze(&content, keyword, custom);
        let edits = plan(&content, &report, keyword, ctx.analyzer);
        if edits.is_empty() {
            return changed(best, content);
        }

        let req = RewriteRequest::new(realization_instruction(&content, &edits, keyword))
            .with_system(EDITOR_SYSTEM)
            .with_temperature(ctx.config.fix_temperature)
            .with_max_tokens(ctx.config.max_tokens);
        match whole_rewrite(ctx, req, self.name()).await {
            Some(t) => Some(t),
            None => changed(best, content),
        }
    }
}
