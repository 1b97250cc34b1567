//! Anthropic Messages API backend.

use crate::config::env;
use crate::{send_error, status_error, timeout_from_env};
use serde::{Deserialize, Serialize};
use seoblog_core::{Error, Result, RewriteRequest, Rewriter};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

pub fn claude_api_key_from_env() -> Option<String> {
    env("SEOBLOG_ANTHROPIC_API_KEY").or_else(|| env("ANTHROPIC_API_KEY"))
}

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = claude_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing SEOBLOG_ANTHROPIC_API_KEY (or ANTHROPIC_API_KEY)".to_string(),
            )
        })?;
        // Override is for testing against a local fixture server.
        let base_url = env("SEOBLOG_ANTHROPIC_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = env("SEOBLOG_CLAUDE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(client, api_key, base_url, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_messages(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Rewriter for ClaudeClient {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn rewrite(&self, req: &RewriteRequest) -> Result<String> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: req.max_tokens.unwrap_or(4_096),
            system: req.system.clone(),
            temperature: req.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: req.instruction.clone(),
            }],
        };

        let resp = self
            .client
            .post(self.endpoint_messages())
            .timeout(timeout_from_env())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("claude messages", status, &text));
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        if let Some(err) = parsed.error {
            return Err(if err.kind == "overloaded_error" {
                Error::Overloaded(err.message)
            } else {
                Error::Llm(format!("{}: {}", err.kind, err.message))
            });
        }
        let text = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        Ok(text)
    }
}

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EnvGuard, ENV_LOCK};
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn client(addr: SocketAddr) -> ClaudeClient {
        ClaudeClient::new(
            reqwest::Client::new(),
            "test-key".into(),
            format!("http://{addr}"),
            "test-model".into(),
        )
    }

    #[tokio::test]
    async fn sends_system_and_joins_text_blocks() {
        let app = Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("x-api-key").unwrap(), "test-key");
                assert_eq!(headers.get("anthropic-version").unwrap(), API_VERSION);
                assert_eq!(body["system"], "편집자");
                assert_eq!(body["max_tokens"], 1000);
                assert_eq!(body["messages"][0]["content"], "고쳐 주세요");
                Json(serde_json::json!({
                    "content": [
                        {"type": "text", "text": "첫 줄 "},
                        {"type": "tool_use", "id": "x"},
                        {"type": "text", "text": "둘째 줄"}
                    ]
                }))
            }),
        );
        let addr = serve(app).await;
        let req = RewriteRequest::new("고쳐 주세요")
            .with_system("편집자")
            .with_max_tokens(1000);
        let out = client(addr).rewrite(&req).await.unwrap();
        assert_eq!(out, "첫 줄 둘째 줄");
    }

    #[tokio::test]
    async fn status_529_is_overload() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async {
                (
                    StatusCode::from_u16(529).unwrap(),
                    r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
                )
            }),
        );
        let addr = serve(app).await;
        let err = client(addr).rewrite(&RewriteRequest::new("x")).await.unwrap_err();
        assert!(err.is_overloaded(), "{err}");
    }

    #[tokio::test]
    async fn other_failures_are_not_overload() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async { (StatusCode::BAD_REQUEST, "bad") }),
        );
        let addr = serve(app).await;
        let err = client(addr).rewrite(&RewriteRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)), "{err}");
    }

    #[test]
    fn from_env_requires_a_key() {
        let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _a = EnvGuard::unset("SEOBLOG_ANTHROPIC_API_KEY");
        let _b = EnvGuard::set("ANTHROPIC_API_KEY", "  ");
        let err = ClaudeClient::from_env(reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));

        let _c = EnvGuard::set("ANTHROPIC_API_KEY", "k");
        let _d = EnvGuard::set("SEOBLOG_CLAUDE_MODEL", "m");
        assert_eq!(ClaudeClient::from_env(reqwest::Client::new()).unwrap().model(), "m");
    }
}
