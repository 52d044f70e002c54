use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{LlmError, TextModel};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub timeout: Duration,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiTextModel {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiTextModel {
    /// Builds the client. A missing key is only reported per request, so
    /// callers fall back instead of refusing to start.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_keys.is_empty() {
            warn!(target: "openai", "no OpenAI API key configured; every completion will fail");
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| LlmError::NotConfigured(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextModel for OpenAiTextModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        if self.config.api_keys.is_empty() {
            return Err(LlmError::NotConfigured(
                "missing OpenAI API key (set OPENAI_API_KEY or llm.api_key)".to_string(),
            ));
        }
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let keys = self.config.api_keys.len();
        let mut last_error: Option<LlmError> = None;
        for (index, key) in self.config.api_keys.iter().enumerate() {
            let sent = self
                .client
                .post(&url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .await;
            let failure = match sent {
                Ok(response) if response.status().is_success() => {
                    return parse_completion(response, &self.config.model).await;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response unavailable>".to_string());
                    LlmError::Status {
                        status,
                        body: error_message(&text),
                    }
                }
                Err(err) => LlmError::Request(err.to_string()),
            };

            if !failure.is_retryable() {
                return Err(failure);
            }
            if index + 1 < keys {
                warn!(
                    target: "openai",
                    attempt = index + 1,
                    remaining = keys - index - 1,
                    error = %failure,
                    "OpenAI request failed; switching API key"
                );
            }
            last_error = Some(failure);
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Request("request exhausted all API keys".to_string())))
    }
}

async fn parse_completion(response: reqwest::Response, model: &str) -> Result<String, LlmError> {
    let response: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
    let content = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_text())
        .ok_or_else(|| LlmError::InvalidResponse("response missing content".into()))?;
    debug!(target: "openai", model, chars = content.len(), "completion received");
    Ok(content)
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                (!text.is_empty()).then_some(text)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorMessage {
    message: Option<String>,
}

fn error_message(raw: &str) -> String {
    serde_json::from_str::<OpenAiErrorEnvelope>(raw)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .map(|message| message.trim().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(keys: &[&str]) -> OpenAiConfig {
        OpenAiConfig {
            api_keys: keys.iter().map(|key| key.to_string()).collect(),
            model: "gpt-4o-mini".into(),
            api_base: "https://api.openai.com/v1".into(),
            temperature: 0.0,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_each_completion_not_construction() {
        let model = OpenAiTextModel::new(config(&[])).unwrap();
        let err = model.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn content_parts_are_joined() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":[{"type":"text","text":"Euro"},{"type":"text","text":"(EUR)"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            response.choices[0].message.content.as_text().as_deref(),
            Some("Euro\n(EUR)")
        );
    }

    #[test]
    fn error_envelope_message_is_preferred() {
        assert_eq!(
            error_message(r#"{"error":{"message":" Rate limit reached "}}"#),
            "Rate limit reached"
        );
        assert_eq!(error_message("bad gateway"), "bad gateway");
    }
}
