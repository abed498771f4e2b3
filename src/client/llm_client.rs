//! HTTP client for OpenAI-compatible chat-completions endpoints.
//!
//! Works against OpenAI itself, aggregators such as OpenRouter, and
//! on-prem servers (vLLM, Ollama, llama.cpp) exposing `/chat/completions`.
//!
//! Each request is bounded by the client timeout. Failures are reported
//! once; there is no retry loop here.

use crate::models::BackendError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request payload.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Backend-specific fields merged into the request body
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// API error response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Response from a completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content; empty when the endpoint returned none
    pub content: String,
    /// Model used (may differ from requested)
    pub model: Option<String>,
    pub usage: Usage,
    /// Request duration
    pub duration: Duration,
}

/// Client for one chat-completions endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    /// API key sent as a bearer token
    api_key: String,
    /// Base URL for the API, without trailing slash
    base_url: String,
    /// Request timeout
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client.
    pub fn new(api_key: String, base_url: &str, timeout_secs: u64) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(timeout_secs.max(1));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Network)?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build headers for a request.
    fn headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| BackendError::InvalidHeader("Authorization"))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // OpenRouter attribution headers (ignored by other providers)
        headers.insert("X-Title", HeaderValue::from_static("analogia"));

        Ok(headers)
    }

    /// Send one chat completion request.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<f64>().ok());

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !(200..300).contains(&status) {
            return Err(error_from_status(status, &body, &request.model, retry_after));
        }

        let mut parsed = parse_completion(&body)?;
        parsed.duration = start.elapsed();

        debug!(
            model = %request.model,
            prompt_tokens = parsed.usage.prompt_tokens,
            completion_tokens = parsed.usage.completion_tokens,
            duration_ms = parsed.duration.as_millis() as u64,
            "Completion received"
        );

        Ok(parsed)
    }

    fn transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::Network(e)
        }
    }
}

/// Parse a successful response body.
///
/// A missing choice or a `null` message content yields empty text.
fn parse_completion(body: &str) -> Result<CompletionResponse, BackendError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {e}")))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        model: parsed.model,
        usage: parsed.usage.unwrap_or_default(),
        duration: Duration::ZERO,
    })
}

/// Map a non-success status to a backend error.
fn error_from_status(
    status: u16,
    body: &str,
    model: &str,
    retry_after_secs: Option<f64>,
) -> BackendError {
    match status {
        401 => BackendError::AuthenticationFailed,
        404 => BackendError::ModelNotFound(model.to_string()),
        429 => BackendError::RateLimited { retry_after_secs },
        _ => {
            let message = serde_json::from_str::<ApiErrorResponse>(body)
                .map(|api_error| api_error.error.message)
                .unwrap_or_else(|_| body.to_string());
            BackendError::Api { status, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_completion_content_and_usage() {
        let body = json!({
            "model": "gpt-4.1-mini-2025-04-14",
            "choices": [{"message": {"role": "assistant", "content": "  An analogy.  "}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        })
        .to_string();

        let response = parse_completion(&body).unwrap();
        assert_eq!(response.content, "  An analogy.  ");
        assert_eq!(response.model.as_deref(), Some("gpt-4.1-mini-2025-04-14"));
        assert_eq!(response.usage.total_tokens, 17);
    }

    #[test]
    fn test_parse_completion_without_content_is_empty() {
        let null_content = json!({"choices": [{"message": {"content": null}}]}).to_string();
        assert_eq!(parse_completion(&null_content).unwrap().content, "");

        let no_choices = json!({"choices": []}).to_string();
        assert_eq!(parse_completion(&no_choices).unwrap().content, "");
    }

    #[test]
    fn test_parse_completion_rejects_garbage() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(
            error_from_status(401, "", "m", None),
            BackendError::AuthenticationFailed
        ));
        assert!(matches!(
            error_from_status(404, "", "gpt-x", None),
            BackendError::ModelNotFound(ref m) if m == "gpt-x"
        ));
        assert!(matches!(
            error_from_status(429, "", "m", Some(3.0)),
            BackendError::RateLimited { retry_after_secs: Some(s) } if s == 3.0
        ));

        let body = json!({"error": {"message": "quota exceeded", "type": "insufficient_quota"}})
            .to_string();
        match error_from_status(402, &body, "m", None) {
            BackendError::Api { status, message } => {
                assert_eq!(status, 402);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        match error_from_status(500, "upstream down", "m", None) {
            BackendError::Api { message, .. } => assert_eq!(message, "upstream down"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_request_flattens_extra_fields() {
        let mut extra = serde_json::Map::new();
        extra.insert("top_p".to_string(), json!(0.9));
        let request = CompletionRequest {
            model: "gpt-4.1-mini".to_string(),
            messages: vec![Message::user("hi")],
            temperature: 0.4,
            max_tokens: None,
            extra,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["top_p"], json!(0.9));
        assert_eq!(body["temperature"], json!(0.4));
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["messages"][0]["role"], json!("user"));
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        // Connections are accepted by the kernel but never answered.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        let client = ChatClient::new("k".to_string(), &base_url, 1).unwrap();

        let request = CompletionRequest {
            model: "gpt-4.1-mini".to_string(),
            messages: vec![Message::user("hello")],
            temperature: 0.0,
            max_tokens: None,
            extra: serde_json::Map::new(),
        };
        let err = client.complete(&request).await.unwrap_err();
        assert!(
            matches!(err, BackendError::Timeout(d) if d == Duration::from_secs(1)),
            "unexpected error: {err:?}"
        );
        drop(listener);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ChatClient::new("k".to_string(), "https://openrouter.ai/api/v1/", 30).unwrap();
        assert_eq!(client.base_url(), "https://openrouter.ai/api/v1");
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }
}
