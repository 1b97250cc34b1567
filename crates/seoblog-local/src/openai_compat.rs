use crate::config::env;
use crate::{send_error, status_error, timeout_from_env};
use serde::{Deserialize, Serialize};
use seoblog_core::{Error, Result, RewriteRequest, Rewriter};

fn openai_compat_base_url_from_env() -> Option<String> {
    env("SEOBLOG_OPENAI_COMPAT_BASE_URL")
}

fn openai_compat_api_key_from_env() -> Option<String> {
    env("SEOBLOG_OPENAI_COMPAT_API_KEY")
}

fn openai_compat_model_from_env() -> Option<String> {
    env("SEOBLOG_OPENAI_COMPAT_MODEL")
}

pub fn openai_compat_configured() -> bool {
    openai_compat_base_url_from_env().is_some()
}

/// Any server speaking `/v1/chat/completions` (vLLM, llama.cpp, LM Studio, OpenAI itself).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: String,
        model: String,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        let base_url = openai_compat_base_url_from_env().ok_or_else(|| {
            Error::NotConfigured("missing SEOBLOG_OPENAI_COMPAT_BASE_URL".to_string())
        })?;
        let model = model_override
            .or_else(openai_compat_model_from_env)
            .ok_or_else(|| {
                Error::NotConfigured("missing SEOBLOG_OPENAI_COMPAT_MODEL".to_string())
            })?;
        Ok(Self::new(
            client,
            openai_compat_api_key_from_env(),
            base_url,
            model,
        ))
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl Rewriter for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn rewrite(&self, req: &RewriteRequest) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(s) = &req.system {
            messages.push(Message {
                role: "system".to_string(),
                content: s.clone(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: req.instruction.clone(),
        });
        let body = ChatCompletionsRequest {
            model: self.model.clone(),
            messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(timeout_from_env())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb.json(&body).send().await.map_err(send_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("openai_compat chat.completions", status, &text));
        }

        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}
