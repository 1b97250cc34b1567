//! Plumbing around the external rewriting capability (bounded, never panics).
//!
//! - `RetryingRewriter`: retries an explicit overload signal a fixed number of times.
//! - `rewrite_text`: one call plus reply cleanup; empty replies are `MalformedResponse`.
//! - `rewrite_or_keep`: the no-op fallback every fixer uses.

use crate::config::RetryPolicy;
use seoblog_core::{Error, Result, RewriteRequest, Rewriter};
use std::future::Future;

/// Run `op` up to `policy.attempts` times, sleeping `policy.delay()` between attempts.
/// Only `Error::Overloaded` is retried.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_overloaded() && attempt < attempts => {
                tracing::info!(attempt, error = %e, "rewriter overloaded; retrying");
                tokio::time::sleep(policy.delay()).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Decorator applying `with_retry` to every call of the wrapped rewriter.
#[derive(Debug, Clone)]
pub struct RetryingRewriter<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: Rewriter> RetryingRewriter<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl<R: Rewriter> Rewriter for RetryingRewriter<R> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn rewrite(&self, req: &RewriteRequest) -> Result<String> {
        with_retry(&self.policy, || self.inner.rewrite(req)).await
    }
}

/// Strip a surrounding markdown code fence and outer whitespace.
pub fn clean_reply(raw: &str) -> String {
    let s = raw.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s.to_string();
    };
    // Drop the info string (```markdown) up to the first newline.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

/// One rewrite call with reply cleanup.
pub async fn rewrite_text(rewriter: &dyn Rewriter, req: &RewriteRequest) -> Result<String> {
    let raw = rewriter.rewrite(req).await?;
    let text = clean_reply(&raw);
    if text.chars().all(char::is_whitespace) {
        return Err(Error::MalformedResponse(format!(
            "{} returned empty text",
            rewriter.name()
        )));
    }
    Ok(text)
}

/// Rewrite, or hand back `original` unchanged on any failure.
pub async fn rewrite_or_keep(
    rewriter: &dyn Rewriter,
    req: &RewriteRequest,
    original: &str,
    purpose: &str,
) -> String {
    match rewrite_text(rewriter, req).await {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(
                provider = rewriter.name(),
                purpose,
                transient = e.is_transient(),
                error = %e,
                "rewrite failed; keeping content"
            );
            original.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRewriter;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            attempts: 2,
            delay_ms: 1,
        }
    }

    #[test]
    fn clean_reply_strips_fences() {
        assert_eq!(clean_reply("  본문  "), "본문");
        assert_eq!(clean_reply("```markdown\n## 제목\n본문\n```"), "## 제목\n본문");
        assert_eq!(clean_reply("```\n본문\n```\n"), "본문");
        assert_eq!(clean_reply("```"), "");
    }

    #[tokio::test]
    async fn overload_is_retried_once() {
        let r = ScriptedRewriter::new(vec![
            Err(Error::Overloaded("529".into())),
            Ok("두 번째".into()),
        ]);
        let rr = RetryingRewriter::new(r.clone(), fast());
        let out = rr.rewrite(&RewriteRequest::new("x")).await.unwrap();
        assert_eq!(out, "두 번째");
        assert_eq!(r.calls(), 2);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let r = ScriptedRewriter::new(vec![
            Err(Error::Overloaded("1".into())),
            Err(Error::Overloaded("2".into())),
            Ok("never".into()),
        ]);
        let rr = RetryingRewriter::new(r.clone(), fast());
        let err = rr.rewrite(&RewriteRequest::new("x")).await.unwrap_err();
        assert!(err.is_overloaded());
        assert_eq!(r.calls(), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let r = ScriptedRewriter::new(vec![Err(Error::Llm("500".into())), Ok("no".into())]);
        let rr = RetryingRewriter::new(r.clone(), fast());
        assert!(rr.rewrite(&RewriteRequest::new("x")).await.is_err());
        assert_eq!(r.calls(), 1);
    }

    #[tokio::test]
    async fn empty_reply_keeps_original() {
        let r = ScriptedRewriter::new(vec![Ok("```\n   \n```".into())]);
        let err = rewrite_text(&r, &RewriteRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));

        let r = ScriptedRewriter::failing();
        let out = rewrite_or_keep(&r, &RewriteRequest::new("x"), "원문", "test").await;
        assert_eq!(out, "원문");
    }
}
