use crate::config::env;
use crate::{send_error, status_error, timeout_from_env};
use serde::{Deserialize, Serialize};
use seoblog_core::{BusinessInfo, Error, ResearchData, Result, RewriteRequest, Rewriter};
use std::time::Instant;

const DEFAULT_MODEL: &str = "sonar";

fn perplexity_api_key_from_env() -> Option<String> {
    env("SEOBLOG_PERPLEXITY_API_KEY").or_else(|| env("PERPLEXITY_API_KEY"))
}

pub fn perplexity_configured() -> bool {
    perplexity_api_key_from_env().is_some()
}

const RESEARCH_SYSTEM: &str = "당신은 블로그 작가를 돕는 리서처입니다. 한국어로, 사실 위주로, \
최신 정보와 구체적인 수치를 포함해 답하세요.";

#[derive(Debug, Clone)]
pub struct PerplexityClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl PerplexityClient {
    pub fn new(client: reqwest::Client, api_key: String, endpoint: String, model: String) -> Self {
        Self {
            client,
            api_key,
            endpoint,
            model,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = perplexity_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing SEOBLOG_PERPLEXITY_API_KEY (or PERPLEXITY_API_KEY)".to_string(),
            )
        })?;
        // Docs: https://docs.perplexity.ai/api-reference/chat-completions-post
        let endpoint = env("SEOBLOG_PERPLEXITY_ENDPOINT")
            .unwrap_or_else(|| "https://api.perplexity.ai/chat/completions".to_string());
        let model = env("SEOBLOG_PERPLEXITY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(client, api_key, endpoint, model))
    }

    pub async fn chat_completions(
        &self,
        req: ChatCompletionsRequest,
    ) -> Result<ChatCompletionsResponse> {
        let t0 = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(timeout_from_env())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("perplexity chat.completions", status, &text));
        }

        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        tracing::debug!(
            model = parsed.model.as_deref().unwrap_or(&self.model),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "perplexity completion"
        );
        Ok(parsed)
    }

    fn request(&self, system: Option<&str>, user: &str) -> ChatCompletionsRequest {
        let mut messages = Vec::new();
        if let Some(s) = system {
            messages.push(Message {
                role: "system".to_string(),
                content: s.to_string(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: user.to_string(),
        });
        ChatCompletionsRequest {
            model: self.model.clone(),
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Background material for a blog post about `keyword`.
    pub async fn research(&self, keyword: &str, business: &BusinessInfo) -> Result<ResearchData> {
        let mut prompt = format!(
            "'{keyword}'에 대한 블로그 글을 쓰려고 합니다. 독자가 궁금해할 핵심 정보, 최신 동향, \
비용이나 주기 같은 구체적인 수치, 흔한 오해와 주의사항을 정리해 주세요."
        );
        if !business.business_type.trim().is_empty() {
            prompt.push_str(&format!(
                "\n글을 쓰는 업체의 업종은 '{}'입니다.",
                business.business_type.trim()
            ));
        }
        let resp = self
            .chat_completions(self.request(Some(RESEARCH_SYSTEM), &prompt))
            .await?;
        let content = resp.first_text();
        if content.trim().is_empty() {
            return Err(Error::MalformedResponse(
                "perplexity research returned empty text".to_string(),
            ));
        }
        Ok(ResearchData {
            content,
            citations: resp.citations.unwrap_or_default(),
        })
    }
}

#[async_trait::async_trait]
impl Rewriter for PerplexityClient {
    fn name(&self) -> &'static str {
        "perplexity"
    }

    async fn rewrite(&self, req: &RewriteRequest) -> Result<String> {
        let mut body = self.request(req.system.as_deref(), &req.instruction);
        body.max_tokens = req.max_tokens;
        body.temperature = req.temperature;
        Ok(self.chat_completions(body).await?.first_text())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionsResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub citations: Option<Vec<String>>,
}

impl ChatCompletionsResponse {
    pub fn first_text(&self) -> String {
        self.choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EnvGuard, ENV_LOCK};
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[test]
    fn empty_key_is_treated_as_missing() {
        let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _a = EnvGuard::set("SEOBLOG_PERPLEXITY_API_KEY", "   ");
        let _b = EnvGuard::unset("PERPLEXITY_API_KEY");
        assert!(perplexity_api_key_from_env().is_none());
        assert!(!perplexity_configured());
    }

    #[tokio::test]
    async fn research_returns_content_and_citations() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("authorization").unwrap(), "Bearer pk");
                let user = body["messages"][1]["content"].as_str().unwrap_or_default();
                assert!(user.contains("'엔진오일교체'"));
                assert!(user.contains("자동차 정비"));
                Json(serde_json::json!({
                    "model": "sonar",
                    "choices": [{"message": {"role": "assistant", "content": "합성유는 1만 km"}}],
                    "citations": ["https://example.com/a"]
                }))
            }),
        );
        let addr = serve(app).await;
        let c = PerplexityClient::new(
            reqwest::Client::new(),
            "pk".into(),
            format!("http://{addr}/chat/completions"),
            "sonar".into(),
        );
        let business = BusinessInfo {
            business_type: "자동차 정비".into(),
            ..Default::default()
        };
        let r = c.research("엔진오일교체", &business).await.unwrap();
        assert_eq!(r.content, "합성유는 1만 km");
        assert_eq!(r.citations, vec!["https://example.com/a"]);
    }

    #[tokio::test]
    async fn rewrite_forwards_sampling() {
        let app = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["temperature"], 0.5);
                assert_eq!(body["max_tokens"], 2048);
                assert_eq!(body["messages"][0]["role"], "user");
                Json(serde_json::json!({"choices": [{"message": {"content": "ok"}}]}))
            }),
        );
        let addr = serve(app).await;
        let c = PerplexityClient::new(
            reqwest::Client::new(),
            "pk".into(),
            format!("http://{addr}/chat/completions"),
            "sonar".into(),
        );
        let req = RewriteRequest::new("x").with_temperature(0.5).with_max_tokens(2048);
        assert_eq!(c.rewrite(&req).await.unwrap(), "ok");
    }
}
