use seoblog_core::{Error, Result, Rewriter};
use std::sync::Arc;
use std::time::Duration;

pub mod analyzer;
pub mod cascade;
pub mod claude;
pub mod components;
pub mod config;
pub mod fixers;
pub mod gemini;
pub mod incremental;
pub mod openai_compat;
pub mod orchestrator;
pub mod overuse;
pub mod perplexity;
pub mod prompts;
pub mod rebalance;
pub mod rewrite;
pub mod terms;
pub mod tokenize;

#[cfg(test)]
mod testing;

pub use analyzer::{analyze, Analyzer};
pub use config::{AnalyzerConfig, EngineConfig, RetryPolicy};
pub use incremental::IncrementalOptimizer;
pub use orchestrator::Orchestrator;
pub use overuse::OveruseResolver;
pub use rewrite::RetryingRewriter;
pub use terms::check_terms;

/// Provider names accepted by [`rewriter_from_env`], in `auto` preference order.
pub const PROVIDERS: [&str; 4] = ["claude", "gemini", "openai_compat", "perplexity"];

/// Shared HTTP client for every provider.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("seoblog/", env!("CARGO_PKG_VERSION")))
        // Avoid hanging forever on DNS/TLS stalls; per-request timeouts cover slow generations.
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::Config(e.to_string()))
}

/// Per-request timeout for rewrite calls (`SEOBLOG_LLM_TIMEOUT_MS`, default 120s).
pub(crate) fn timeout_from_env() -> Duration {
    let ms = config::env("SEOBLOG_LLM_TIMEOUT_MS")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(120_000)
        .clamp(1_000, 600_000);
    Duration::from_millis(ms)
}

pub(crate) fn send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Llm(e.to_string())
    }
}

/// Map a non-success HTTP status. 429/503/529 and `overloaded_error` bodies are overload
/// signals; everything else is a plain failure. The body is clipped, never echoed whole.
pub(crate) fn status_error(what: &str, status: reqwest::StatusCode, body: &str) -> Error {
    let overloaded = matches!(status.as_u16(), 429 | 503 | 529) || body.contains("overloaded_error");
    let snippet: String = body.chars().take(200).collect();
    let msg = format!("{what} HTTP {status}: {snippet}");
    if overloaded {
        Error::Overloaded(msg)
    } else {
        Error::Llm(msg)
    }
}

/// Whether each provider has what it needs in the environment.
pub fn provider_status() -> Vec<(&'static str, bool)> {
    vec![
        ("claude", claude::claude_api_key_from_env().is_some()),
        ("gemini", gemini::gemini_api_key_from_env().is_some()),
        ("openai_compat", openai_compat::openai_compat_configured()),
        ("perplexity", perplexity::perplexity_configured()),
    ]
}

fn build(provider: &str, client: reqwest::Client) -> Result<Arc<dyn Rewriter>> {
    let rewriter: Arc<dyn Rewriter> = match provider {
        "claude" => Arc::new(claude::ClaudeClient::from_env(client)?),
        "gemini" => Arc::new(gemini::GeminiClient::from_env(client)?),
        "openai_compat" => Arc::new(openai_compat::OpenAiCompatClient::from_env(client, None)?),
        "perplexity" => Arc::new(perplexity::PerplexityClient::from_env(client)?),
        other => {
            return Err(Error::Config(format!(
                "unknown provider '{other}' (expected auto, {})",
                PROVIDERS.join(", ")
            )))
        }
    };
    Ok(rewriter)
}

/// Build a rewriter by name (or `auto`: the first configured in [`PROVIDERS`] order),
/// wrapped in the overload retry decorator.
pub fn rewriter_from_env(provider: &str, retry: RetryPolicy) -> Result<Arc<dyn Rewriter>> {
    let client = http_client()?;
    let provider = provider.trim().to_ascii_lowercase();
    let inner = if provider == "auto" {
        let name = provider_status()
            .into_iter()
            .find(|(_, ok)| *ok)
            .map(|(n, _)| n)
            .ok_or_else(|| {
                Error::NotConfigured(
                    "no provider configured (set ANTHROPIC_API_KEY, GEMINI_API_KEY, \
SEOBLOG_OPENAI_COMPAT_BASE_URL or PERPLEXITY_API_KEY)"
                        .to_string(),
                )
            })?;
        tracing::info!(provider = name, "auto-selected provider");
        build(name, client)?
    } else {
        build(&provider, client)?
    };
    Ok(Arc::new(RetryingRewriter::new(inner, retry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EnvGuard, ENV_LOCK};
    use reqwest::StatusCode;

    const PROVIDER_KEYS: [&str; 8] = [
        "SEOBLOG_ANTHROPIC_API_KEY",
        "ANTHROPIC_API_KEY",
        "SEOBLOG_GEMINI_API_KEY",
        "GEMINI_API_KEY",
        "GOOGLE_API_KEY",
        "SEOBLOG_OPENAI_COMPAT_BASE_URL",
        "SEOBLOG_PERPLEXITY_API_KEY",
        "PERPLEXITY_API_KEY",
    ];

    #[test]
    fn status_mapping() {
        assert!(status_error("x", StatusCode::from_u16(529).unwrap(), "").is_overloaded());
        assert!(status_error("x", StatusCode::SERVICE_UNAVAILABLE, "").is_overloaded());
        assert!(status_error("x", StatusCode::BAD_REQUEST, r#"{"type":"overloaded_error"}"#)
            .is_overloaded());
        let e = status_error("x", StatusCode::UNAUTHORIZED, &"a".repeat(1000));
        assert!(!e.is_overloaded());
        assert!(e.to_string().len() < 300);
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let r = rewriter_from_env("mystery", RetryPolicy::default());
        assert!(matches!(r, Err(Error::Config(_))));
    }

    #[test]
    fn auto_picks_first_configured() {
        let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guards: Vec<EnvGuard> = PROVIDER_KEYS.into_iter().map(EnvGuard::unset).collect();

        let r = rewriter_from_env("auto", RetryPolicy::default());
        assert!(matches!(r, Err(Error::NotConfigured(_))));

        let _g = EnvGuard::set("GEMINI_API_KEY", "k");
        let Ok(r) = rewriter_from_env("auto", RetryPolicy::default()) else {
            panic!("gemini should be selected");
        };
        assert_eq!(r.name(), "gemini");
        assert_eq!(
            provider_status(),
            vec![
                ("claude", false),
                ("gemini", true),
                ("openai_compat", false),
                ("perplexity", false)
            ]
        );
    }
}
