//! Chat-completion answer synthesizer for OpenAI-compatible endpoints.
//!
//! This module is only available when the `openai` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{NlqError, Result};
use crate::record::SearchResult;
use crate::synthesizer::{AnswerSynthesizer, system_prompt, user_prompt};

/// The default chat completions endpoint.
pub const DEFAULT_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// The default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

/// Requests are abandoned after this long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An [`AnswerSynthesizer`] that posts a system + user message pair to a chat
/// completions endpoint and returns the first choice's content.
///
/// Responses without `choices` are returned as their raw JSON text, which
/// keeps proxies with non-standard payloads usable.
///
/// # Example
///
/// ```rust,ignore
/// use nlq_rag::chat::ChatSynthesizer;
///
/// let synthesizer = ChatSynthesizer::new("https://my-proxy/api/chat")?
///     .with_model("gpt-4o")
///     .with_api_key(std::env::var("AI_API_KEY")?);
/// ```
pub struct ChatSynthesizer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatSynthesizer {
    /// Create a synthesizer posting to `api_url`.
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        let api_url = api_url.into();
        if api_url.is_empty() {
            return Err(NlqError::ConfigError("chat api_url must not be empty".into()));
        }
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(|e| {
            NlqError::ConfigError(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self { client, api_url, api_key: None, model: DEFAULT_CHAT_MODEL.into() })
    }

    /// Set the model name sent with each request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send `Authorization: Bearer <key>` with each request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    fn failure(message: String) -> NlqError {
        NlqError::SynthesizerError { synthesizer: "chat".into(), message }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// `choices[0].message.content`, or the whole body as text.
fn extract_answer(body: &Value) -> String {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl AnswerSynthesizer for ChatSynthesizer {
    async fn generate(
        &self,
        question: &str,
        results: &[SearchResult],
        context: &str,
    ) -> Result<String> {
        let user = user_prompt(question, results)?;
        let request_body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system_prompt(context) },
                ChatMessage { role: "user", content: &user },
            ],
        };

        debug!(model = %self.model, result_count = results.len(), "requesting chat completion");

        let mut request = self.client.post(&self.api_url).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "chat request failed");
            Self::failure(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "chat API error");
            return Err(Self::failure(format!("{status}: {body}")));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!(error = %e, "failed to parse chat response");
            Self::failure(format!("failed to parse response: {e}"))
        })?;

        Ok(extract_answer(&body))
    }

    fn name(&self) -> &str {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Two lofts."}}]});
        assert_eq!(extract_answer(&body), "Two lofts.");
    }

    #[test]
    fn non_standard_bodies_are_returned_verbatim() {
        let body = json!({"message": "rate limited"});
        assert_eq!(extract_answer(&body), r#"{"message":"rate limited"}"#);
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(ChatSynthesizer::new(""), Err(NlqError::ConfigError(_))));
    }

    #[test]
    fn blank_api_key_is_not_sent() {
        let synthesizer = ChatSynthesizer::new(DEFAULT_CHAT_URL).unwrap().with_api_key("");
        assert!(synthesizer.api_key.is_none());
    }

    #[test]
    fn request_serializes_system_then_user() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: [
                ChatMessage { role: "system", content: "s" },
                ChatMessage { role: "user", content: "u" },
            ],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"model": "gpt-4o", "messages": [
                {"role": "system", "content": "s"},
                {"role": "user", "content": "u"},
            ]})
        );
    }
}
