use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("llm overloaded: {0}")]
    Overloaded(String),
    #[error("llm timed out: {0}")]
    Timeout(String),
    #[error("malformed llm response: {0}")]
    MalformedResponse(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    /// Errors a caller may reasonably see succeed on a later call.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Llm(_) | Error::Overloaded(_) | Error::Timeout(_))
    }

    /// Only an explicit overload signal is retried in place; everything else degrades to a no-op.
    pub fn is_overloaded(&self) -> bool {
        matches!(self, Error::Overloaded(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Inclusive numeric band (`min..=max`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountBand {
    pub min: usize,
    pub max: usize,
}

impl CountBand {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, n: usize) -> bool {
        n >= self.min && n <= self.max
    }

    pub fn midpoint(&self) -> usize {
        (self.min + self.max) / 2
    }

    pub fn deficit(&self, n: usize) -> usize {
        self.min.saturating_sub(n)
    }

    pub fn excess(&self, n: usize) -> usize {
        n.saturating_sub(self.max)
    }

    /// Absolute distance from the band midpoint.
    pub fn deviation(&self, n: usize) -> usize {
        n.abs_diff(self.midpoint())
    }
}

impl std::fmt::Display for CountBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// How a keyword's components were obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionSource {
    /// Looked up in the known-compound table.
    KnownCompound,
    /// Derived by splitting on Hangul/Latin script boundaries.
    ScriptBoundary,
    /// Nothing splittable; the keyword is its own single component.
    Whole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordComponents {
    pub keyword: String,
    pub components: Vec<String>,
    pub source: DecompositionSource,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    CharacterCount,
    CompleteKeywordFrequency,
    ComponentFrequency,
    ComponentDominance,
    CustomTermPresence,
}

/// One evaluated constraint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintResult {
    pub kind: ConstraintKind,
    /// Component, word or term this row is about (if any).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub passed: bool,
    pub current: usize,
    /// Human-readable target, e.g. `15-17회` or `5회 이상`.
    pub target: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentCount {
    pub component: String,
    pub count: usize,
    pub in_band: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermCheck {
    pub used: Vec<String>,
    pub missing: Vec<String>,
}

impl TermCheck {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Result of one analysis pass. Always rebuilt, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptimizationReport {
    pub is_optimized: bool,
    pub is_keyword_optimized: bool,
    pub is_length_optimized: bool,
    pub is_custom_morphemes_optimized: bool,
    /// No non-component word is overused or out-ranks the keyword components.
    pub is_frequency_balanced: bool,
    pub character_count: usize,
    pub char_band: CountBand,
    pub complete_keyword_count: usize,
    pub components: Vec<ComponentCount>,
    pub overused_words: Vec<WordCount>,
    pub dominant_words: Vec<WordCount>,
    pub custom_terms: TermCheck,
    pub constraints: Vec<ConstraintResult>,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl OptimizationReport {
    pub fn component_count(&self, component: &str) -> Option<usize> {
        self.components
            .iter()
            .find(|c| c.component == component)
            .map(|c| c.count)
    }

    pub fn failed_constraints(&self) -> impl Iterator<Item = &ConstraintResult> {
        self.constraints.iter().filter(|c| !c.passed)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessInfo {
    pub business_name: String,
    pub business_type: String,
    pub expertise: String,
    pub differentiators: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchData {
    pub content: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceLink {
    pub url: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub description: String,
}

impl ReferenceLink {
    /// Host for display in instructions; falls back to the raw string.
    pub fn display_host(&self) -> String {
        url::Url::parse(self.url.trim())
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| self.url.trim().to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub keyword: String,
    /// Four by convention.
    #[serde(default)]
    pub subtitles: Vec<String>,
    #[serde(default)]
    pub research: ResearchData,
    #[serde(default)]
    pub business: BusinessInfo,
    #[serde(default)]
    pub reference_links: Vec<ReferenceLink>,
    /// Space-delimited list of mandatory terms.
    #[serde(default)]
    pub custom_terms: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub content: String,
    pub analysis: OptimizationReport,
    pub attempts: u32,
    pub success: bool,
    /// Repair strategies that ran, in order.
    pub strategies_applied: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    CharacterDeficit,
    CharacterExcess,
    KeywordDeficit,
    ComponentDeficit,
    OverusedWord,
    ComponentDominance,
    MissingTerms,
}

/// A concrete, repairable problem derived from a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptimizationIssue {
    pub kind: IssueKind,
    pub description: String,
    pub target: usize,
    pub current: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dominant_words: Vec<WordCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalOutcome {
    pub content: String,
    pub success: bool,
    pub issues: Vec<OptimizationIssue>,
    pub fixed: Vec<String>,
    pub iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentAdjustment {
    pub component: String,
    pub before: usize,
    pub after: usize,
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OveruseResolution {
    pub content: String,
    pub success: bool,
    pub adjustments: Vec<ComponentAdjustment>,
}

/// One request to the external rewriting capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RewriteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
}

impl RewriteRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, t: f64) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn with_max_tokens(mut self, n: u64) -> Self {
        self.max_tokens = Some(n);
        self
    }
}

/// "Rewrite text according to instructions": returns the full revised text.
#[async_trait::async_trait]
pub trait Rewriter: Send + Sync {
    fn name(&self) -> &'static str;
    async fn rewrite(&self, req: &RewriteRequest) -> Result<String>;
}

#[async_trait::async_trait]
impl<T: Rewriter + ?Sized> Rewriter for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn rewrite(&self, req: &RewriteRequest) -> Result<String> {
        (**self).rewrite(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_math() {
        let b = CountBand::new(1500, 1700);
        assert!(b.contains(1500) && b.contains(1700));
        assert!(!b.contains(1499));
        assert_eq!(b.midpoint(), 1600);
        assert_eq!(b.deficit(1400), 100);
        assert_eq!(b.excess(1800), 100);
        assert_eq!(b.deviation(1550), 50);
        assert_eq!(b.to_string(), "1500-1700");
    }

    #[test]
    fn only_overload_is_retryable() {
        assert!(Error::Overloaded("529".into()).is_overloaded());
        assert!(!Error::Llm("x".into()).is_overloaded());
        assert!(Error::Timeout("x".into()).is_transient());
        assert!(!Error::NotConfigured("x".into()).is_transient());
    }

    #[test]
    fn reference_link_host_falls_back_to_raw() {
        let l = ReferenceLink {
            url: "https://example.com/a?b=c".into(),
            purpose: String::new(),
            description: String::new(),
        };
        assert_eq!(l.display_host(), "example.com");
        let bad = ReferenceLink {
            url: " not a url ".into(),
            purpose: String::new(),
            description: String::new(),
        };
        assert_eq!(bad.display_host(), "not a url");
    }
}
