//! Chat transports: one request in, the model's text out.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::{Credentials, Provider};
use crate::error::LlmError;
use crate::models::config::LlmConfig;

/// Conversation role of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything needed for one completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub turns: &'a [Turn],
    pub max_output_tokens: u32,
}

/// Sends a chat request to a provider and returns the raw reply text.
///
/// Implementations perform exactly one network round trip per call.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest<'_>, credentials: &Credentials) -> Result<String, LlmError>;
}

/// `reqwest`-backed transport for Gemini and OpenAI.
pub struct HttpTransport {
    client: Client,
    google_base_url: String,
    openai_base_url: String,
}

impl HttpTransport {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            google_base_url: config.google_base_url.trim_end_matches('/').to_string(),
            openai_base_url: config.openai_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn complete_google(&self, request: &ChatRequest<'_>, api_key: &str) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.google_base_url, request.model);
        let body = GeminiRequest::from_chat(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let reply: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseInvalid(format!("malformed Gemini response body: {e}")))?;

        reply.into_text()
    }

    async fn complete_openai(&self, request: &ChatRequest<'_>, api_key: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.openai_base_url);
        let body = OpenAiRequest::from_chat(request);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let reply: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseInvalid(format!("malformed OpenAI response body: {e}")))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::ResponseInvalid("empty response from OpenAI".to_string()))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn complete(&self, request: &ChatRequest<'_>, credentials: &Credentials) -> Result<String, LlmError> {
        debug!(provider = %credentials.provider, model = request.model, turns = request.turns.len(), "sending chat request");

        match credentials.provider {
            Provider::Google => self.complete_google(request, credentials.api_key()).await,
            Provider::OpenAi => self.complete_openai(request, credentials.api_key()).await,
        }
    }
}

fn transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Unavailable("request timed out".to_string())
    } else {
        LlmError::Unavailable(format!("request failed: {err}"))
    }
}

/// Map non-success statuses: auth, rate limits and server errors make the
/// provider unavailable; other client errors are reported by the provider.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(%status, "LLM provider returned an error");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(LlmError::Unavailable(format!("authentication rejected ({status})")))
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            Err(LlmError::Unavailable(format!("provider throttled the request ({status})")))
        }
        s if s.is_server_error() => Err(LlmError::Unavailable(format!("provider error ({status})"))),
        _ => Err(LlmError::Provider {
            status: status.as_u16(),
            message: truncate_for_log(&body, 500),
        }),
    }
}

fn truncate_for_log(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

// Gemini wire format

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl GeminiRequest {
    /// Gemini `v1` has no system role; the instruction leads the first user turn.
    fn from_chat(request: &ChatRequest<'_>) -> Self {
        let contents = request
            .turns
            .iter()
            .enumerate()
            .map(|(idx, turn)| {
                let text = if idx == 0 {
                    format!("{}\n\n{}", request.system, turn.content)
                } else {
                    turn.content.clone()
                };
                GeminiContent {
                    role: Some(match turn.role {
                        Role::User => "user".to_string(),
                        Role::Assistant => "model".to_string(),
                    }),
                    parts: vec![GeminiPart { text: Some(text) }],
                }
            })
            .collect();

        Self {
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: 0.0,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiResponse {
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Provider {
                status: 200,
                message: format!("prompt blocked: {reason}"),
            });
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::ResponseInvalid("empty response from Gemini".to_string()));
        }
        Ok(text)
    }
}

// OpenAI wire format

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl<'a> OpenAiRequest<'a> {
    fn from_chat(request: &ChatRequest<'a>) -> Self {
        let mut messages = vec![OpenAiMessage {
            role: "system".to_string(),
            content: Some(request.system.to_string()),
        }];
        messages.extend(request.turns.iter().map(|turn| OpenAiMessage {
            role: match turn.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: Some(turn.content.clone()),
        }));

        Self {
            model: request.model,
            messages,
            temperature: 0.0,
            max_tokens: request.max_output_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request<'a>(turns: &'a [Turn]) -> ChatRequest<'a> {
        ChatRequest {
            model: "m",
            system: "SYSTEM",
            turns,
            max_output_tokens: 4000,
        }
    }

    #[test]
    fn test_gemini_body_folds_system_into_first_turn() {
        let turns = [Turn::user("extract"), Turn::assistant("oops"), Turn::user("again")];
        let body = serde_json::to_value(GeminiRequest::from_chat(&request(&turns))).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "SYSTEM\n\nextract");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4000);
    }

    #[test]
    fn test_openai_body_has_system_message() {
        let turns = [Turn::user("extract")];
        let body = serde_json::to_value(OpenAiRequest::from_chat(&request(&turns))).unwrap();

        assert_eq!(
            body["messages"],
            json!([
                {"role": "system", "content": "SYSTEM"},
                {"role": "user", "content": "extract"}
            ])
        );
        assert_eq!(body["max_tokens"], 4000);
    }

    #[test]
    fn test_gemini_response_text() {
        let reply: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
        }))
        .unwrap();
        assert_eq!(reply.into_text().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_gemini_blocked_prompt_is_provider_error() {
        let reply: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(reply.into_text(), Err(LlmError::Provider { .. })));
    }
}
