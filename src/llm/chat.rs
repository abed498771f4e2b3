//! Chat-completions backend.

use crate::client::{ChatClient, CompletionRequest, Message};
use crate::llm::{GenerateOptions, LlmModel, ModelProfile};
use crate::models::{AnalogiaError, DeploymentConfig, ModelConfig, Result};
use async_trait::async_trait;
use tracing::debug;

/// Model backed by an OpenAI-compatible chat-completions endpoint.
///
/// The prompt is sent as a single user message.
pub struct ChatModel {
    profile: ModelProfile,
    client: ChatClient,
}

impl ChatModel {
    /// Registry key of this backend.
    pub const BACKEND: &'static str = "openai_chat";
    /// Backend key used by configs written for the LangChain-based tooling.
    pub const LEGACY_BACKEND: &'static str = "langchain_chat_openai";

    /// Build from config, resolving credentials from the process environment.
    ///
    /// Fails with `MissingCredential` if no API key can be found.
    pub fn from_config(config: &ModelConfig, deployment: &DeploymentConfig) -> Result<Self> {
        let api_key = config.resolve_api_key(deployment)?;
        let base_url = config.resolve_base_url(deployment);
        Self::with_credentials(config, api_key, &base_url, config.timeout_secs(deployment))
    }

    /// Build from config with an already-resolved key and endpoint.
    pub fn with_credentials(
        config: &ModelConfig,
        api_key: String,
        base_url: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = ChatClient::new(api_key, base_url, timeout_secs)
            .map_err(|e| AnalogiaError::invocation(&config.name, e))?;

        debug!(
            model = %config.name,
            model_id = %config.model_id,
            base_url = %client.base_url(),
            "Chat model ready"
        );

        Ok(Self {
            profile: ModelProfile::from(config),
            client,
        })
    }

    fn request(&self, prompt: &str, overrides: &GenerateOptions) -> CompletionRequest {
        CompletionRequest {
            model: self.profile.model_id.clone(),
            messages: vec![Message::user(prompt)],
            temperature: overrides.temperature.unwrap_or(self.profile.temperature),
            max_tokens: overrides.max_tokens.or(self.profile.max_tokens),
            extra: self
                .profile
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl LlmModel for ChatModel {
    fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    async fn generate(&self, prompt: &str, overrides: &GenerateOptions) -> Result<String> {
        let request = self.request(prompt, overrides);
        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AnalogiaError::invocation(&self.profile.name, e))?;

        Ok(response.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendError;
    use serde_json::json;

    fn config() -> ModelConfig {
        toml::from_str(
            r#"
backend = "openai_chat"
name = "teacher"
model_id = "gpt-4.1-mini"
role = "teacher"
temperature = 0.4
max_tokens = 768
seed = 7
"#,
        )
        .unwrap()
    }

    fn model() -> ChatModel {
        ChatModel::with_credentials(&config(), "sk-test".to_string(), "http://localhost:1/v1", 5)
            .unwrap()
    }

    #[test]
    fn test_request_uses_profile_defaults() {
        let request = model().request("prompt", &GenerateOptions::default());
        assert_eq!(request.model, "gpt-4.1-mini");
        assert_eq!(request.temperature, 0.4);
        assert_eq!(request.max_tokens, Some(768));
        assert_eq!(request.messages, vec![Message::user("prompt")]);
        assert_eq!(request.extra.get("seed"), Some(&json!(7)));
    }

    #[test]
    fn test_request_honours_overrides() {
        let overrides = GenerateOptions {
            temperature: Some(0.0),
            max_tokens: Some(64),
        };
        let request = model().request("prompt", &overrides);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, Some(64));
    }

    #[test]
    fn test_profile_from_config() {
        let model = model();
        assert_eq!(model.name(), "teacher");
        assert_eq!(model.model_id(), "gpt-4.1-mini");
        assert_eq!(model.role(), crate::models::ModelRole::Teacher);
        assert_eq!(model.temperature(), 0.4);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_invocation_error() {
        let err = model()
            .generate("ping", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_per_item(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_timeout_is_invocation_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        let model = ChatModel::with_credentials(&config(), "sk-test".to_string(), &base_url, 1)
            .unwrap();

        let err = model
            .generate("ping", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_per_item());
        assert!(
            matches!(
                err,
                AnalogiaError::ModelInvocation {
                    source: BackendError::Timeout(_),
                    ..
                }
            ),
            "unexpected error: {err:?}"
        );
        drop(listener);
    }
}
