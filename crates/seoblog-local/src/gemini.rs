//! Gemini `generateContent` text backend.

use crate::config::env;
use crate::{send_error, status_error, timeout_from_env};
use serde::Serialize;
use seoblog_core::{Error, Result, RewriteRequest, Rewriter};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub fn gemini_api_key_from_env() -> Option<String> {
    env("SEOBLOG_GEMINI_API_KEY")
        .or_else(|| env("GEMINI_API_KEY"))
        .or_else(|| env("GOOGLE_API_KEY"))
}

pub fn gemini_model_from_env() -> String {
    env("SEOBLOG_GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string())
}

#[derive(Debug, Serialize)]
struct ReqPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct ReqContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<ReqPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenCfg {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiReq {
    contents: Vec<ReqContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ReqContent>,
    generation_config: GenCfg,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = gemini_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing SEOBLOG_GEMINI_API_KEY (or GEMINI_API_KEY)".to_string())
        })?;
        let base_url = env("SEOBLOG_GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(client, api_key, base_url, gemini_model_from_env()))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Concatenate `candidates[0].content.parts[*].text`.
fn first_candidate_text(v: &serde_json::Value) -> Option<String> {
    let parts = v
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");
    Some(text)
}

#[async_trait::async_trait]
impl Rewriter for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn rewrite(&self, req: &RewriteRequest) -> Result<String> {
        let body = GeminiReq {
            contents: vec![ReqContent {
                role: Some("user".to_string()),
                parts: vec![ReqPart {
                    text: req.instruction.clone(),
                }],
            }],
            system_instruction: req.system.as_ref().map(|s| ReqContent {
                role: None,
                parts: vec![ReqPart { text: s.clone() }],
            }),
            generation_config: GenCfg {
                temperature: req.temperature,
                max_output_tokens: req.max_tokens,
            },
        };

        let resp = self
            .client
            .post(self.endpoint())
            .timeout(timeout_from_env())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("gemini generateContent", status, &text));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        first_candidate_text(&v)
            .ok_or_else(|| Error::MalformedResponse("gemini response has no candidates".to_string()))
    }
}
