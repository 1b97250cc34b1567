//! Engine knobs: bands, limits, attempt budgets, temperatures, retry policy.
//!
//! Precedence: defaults < JSON config file < `SEOBLOG_*` environment variables.

use seoblog_core::{CountBand, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env(key).and_then(|s| s.parse::<T>().ok())
}

/// Parses `1500-1700` / `1500..1700`.
fn env_band(key: &str) -> Option<CountBand> {
    let s = env(key)?;
    let (a, b) = s.split_once("..").or_else(|| s.split_once('-'))?;
    let min = a.trim().parse::<usize>().ok()?;
    let max = b.trim().parse::<usize>().ok()?;
    (min <= max).then_some(CountBand::new(min, max))
}

/// Thresholds used by one analyzer instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub char_band: CountBand,
    pub component_band: CountBand,
    pub min_complete_keyword: usize,
    /// A non-component word above this count is reported as overused.
    pub overuse_limit: usize,
    /// Words shorter than this (in chars) are ignored for overuse/dominance.
    pub min_word_chars: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            char_band: CountBand::new(1500, 1700),
            component_band: CountBand::new(15, 17),
            min_complete_keyword: 5,
            overuse_limit: 14,
            min_word_chars: 2,
        }
    }
}

impl AnalyzerConfig {
    pub fn with_char_band(mut self, band: CountBand) -> Self {
        self.char_band = band;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Used by the standalone analyzer, the incremental loop and the overuse resolver.
    pub analyzer: AnalyzerConfig,
    /// Character band the orchestrator scores and prompts against.
    pub generation_char_band: CountBand,
    /// Upper bound on complete-keyword uses requested in generation prompts.
    pub max_complete_keyword: usize,
    pub max_incremental_iterations: u32,
    pub max_generation_attempts: u32,
    pub draft_temperature: f64,
    pub seo_rewrite_temperature: f64,
    pub readability_temperature: f64,
    pub fix_temperature: f64,
    pub max_tokens: u64,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            generation_char_band: CountBand::new(1700, 2000),
            max_complete_keyword: 7,
            max_incremental_iterations: 3,
            max_generation_attempts: 3,
            draft_temperature: 0.7,
            seo_rewrite_temperature: 0.8,
            readability_temperature: 0.3,
            fix_temperature: 0.5,
            max_tokens: 4_096,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Analyzer settings the orchestrator uses (same thresholds, generation band).
    pub fn generation_analyzer(&self) -> AnalyzerConfig {
        self.analyzer.with_char_band(self.generation_char_band)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// `$XDG_CONFIG_HOME/seoblog/config.json` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("seoblog").join("config.json"))
    }

    /// Explicit path, else the default path if it exists, else defaults; then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_json_file(p)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => Self::from_json_file(&p)?,
                None => Self::default(),
            },
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(b) = env_band("SEOBLOG_ANALYZER_CHAR_BAND") {
            self.analyzer.char_band = b;
        }
        if let Some(b) = env_band("SEOBLOG_GENERATION_CHAR_BAND") {
            self.generation_char_band = b;
        }
        if let Some(b) = env_band("SEOBLOG_COMPONENT_BAND") {
            self.analyzer.component_band = b;
        }
        if let Some(n) = env_parse::<u32>("SEOBLOG_MAX_ATTEMPTS") {
            self.max_generation_attempts = n.clamp(1, 10);
        }
        if let Some(n) = env_parse::<u32>("SEOBLOG_MAX_ITERATIONS") {
            self.max_incremental_iterations = n.clamp(1, 10);
        }
        if let Some(n) = env_parse::<u32>("SEOBLOG_RETRY_ATTEMPTS") {
            self.retry.attempts = n.clamp(1, 5);
        }
        if let Some(ms) = env_parse::<u64>("SEOBLOG_RETRY_DELAY_MS") {
            self.retry.delay_ms = ms.min(60_000);
        }
        if let Some(n) = env_parse::<u64>("SEOBLOG_MAX_TOKENS") {
            self.max_tokens = n.clamp(256, 32_000);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EnvGuard, ENV_LOCK};

    #[test]
    fn defaults_keep_both_character_bands() {
        let c = EngineConfig::default();
        assert_eq!(c.analyzer.char_band, CountBand::new(1500, 1700));
        assert_eq!(c.generation_char_band, CountBand::new(1700, 2000));
        assert_eq!(c.generation_analyzer().char_band, CountBand::new(1700, 2000));
        assert_eq!(c.generation_analyzer().component_band, CountBand::new(15, 17));
    }

    #[test]
    fn json_file_fills_missing_fields_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("config.json");
        std::fs::write(
            &p,
            r#"{"max_generation_attempts": 5, "analyzer": {"overuse_limit": 12}}"#,
        )
        .unwrap();
        let c = EngineConfig::from_json_file(&p).unwrap();
        assert_eq!(c.max_generation_attempts, 5);
        assert_eq!(c.analyzer.overuse_limit, 12);
        assert_eq!(c.analyzer.char_band, CountBand::new(1500, 1700));
        assert_eq!(c.retry, RetryPolicy::default());
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("config.json");
        std::fs::write(&p, "{not json").unwrap();
        assert!(matches!(
            EngineConfig::from_json_file(&p),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_file(&tmp.path().join("missing.json")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn env_overrides_win() {
        let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _a = EnvGuard::set("SEOBLOG_GENERATION_CHAR_BAND", "1800-2100");
        let _b = EnvGuard::set("SEOBLOG_RETRY_DELAY_MS", "5");
        let _c = EnvGuard::set("SEOBLOG_ANALYZER_CHAR_BAND", "oops");
        let c = EngineConfig::default().with_env_overrides();
        assert_eq!(c.generation_char_band, CountBand::new(1800, 2100));
        assert_eq!(c.retry.delay_ms, 5);
        assert_eq!(c.analyzer.char_band, CountBand::new(1500, 1700));
    }
}
