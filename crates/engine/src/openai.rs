//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;

use stencil_core::config::LlmConfig;
use stencil_core::{ApplicationError, TransportError};

use crate::llm::{CompletionRequest, LlmClient};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionPayload<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiClient {
    /// Builds a client from the llm config section. Config loading tolerates
    /// an absent API key so offline commands keep working; requesting
    /// candidates does not.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ApplicationError::Configuration(
                "llm.api_key is required to request AI candidates (set STENCIL_LLM_API_KEY)"
                    .to_string(),
            )
        })?;

        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            http: Client::new(),
            api_key,
            endpoint: chat_completions_url(base_url),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let payload = ChatCompletionPayload {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &request.system_prompt },
                ChatMessage { role: "user", content: &request.user_prompt },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| TransportError::Network { message: error.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            // Surface the API's own message when the error body carries one.
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| Some(body.get("error")?.get("message")?.as_str()?.to_string()));
            return Err(match message {
                Some(message) => TransportError::Api { message },
                None => TransportError::Http { status: status.as_u16() },
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| TransportError::MalformedResponse { message: error.to_string() })?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified API error")
                .to_string();
            return Err(TransportError::Api { message });
        }

        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| TransportError::MalformedResponse {
                message: "response carries no message content".to_string(),
            })
    }
}

fn chat_completions_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use stencil_core::config::{AppConfig, LlmConfig};
    use stencil_core::ApplicationError;

    use super::{chat_completions_url, OpenAiClient, DEFAULT_BASE_URL};

    fn llm_config(api_key: Option<&str>) -> LlmConfig {
        let mut llm = AppConfig::default().llm;
        llm.api_key = api_key.map(|key| key.to_string().into());
        llm
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let error = OpenAiClient::from_config(&llm_config(None)).expect_err("key is required");

        match error {
            ApplicationError::Configuration(message) => {
                assert!(message.contains("llm.api_key"), "{message}");
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn client_builds_once_a_key_is_present() {
        let client = OpenAiClient::from_config(&llm_config(Some("sk-test"))).expect("client builds");
        assert_eq!(client.endpoint, chat_completions_url(DEFAULT_BASE_URL));
        assert_eq!(client.model, "gpt-3.5-turbo");
    }

    #[test]
    fn endpoint_join_tolerates_trailing_slashes() {
        assert_eq!(
            chat_completions_url("http://localhost:8080/"),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("https://api.openai.com"),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
