//! Answer synthesizer trait for phrasing retrieved records as an answer.

use async_trait::async_trait;

use crate::error::{NlqError, Result};
use crate::record::SearchResult;

/// Prefix of every answer produced in place of a failed synthesis.
pub const ERROR_ANSWER_PREFIX: &str = "Error generating response: ";

/// System prompt used when no context is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful database assistant. \
Answer user questions based on the provided data.

When responding:
- Be conversational and friendly
- Highlight the most relevant results
- Mention key details from the data
- If no good matches, suggest alternatives
- Use natural language, not robotic responses";

/// Produces a natural-language answer from a question and its search results.
///
/// Errors returned here never fail a query: the [`QueryService`](crate::QueryService)
/// renders them with [`error_answer`].
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Generate an answer for `question` grounded in `results`.
    ///
    /// `context` replaces the default system prompt when non-empty.
    async fn generate(
        &self,
        question: &str,
        results: &[SearchResult],
        context: &str,
    ) -> Result<String>;

    /// The synthesizer name for diagnostics.
    fn name(&self) -> &str;
}

/// Render a synthesis failure as a degraded textual answer.
pub fn error_answer(error: &NlqError) -> String {
    match error {
        NlqError::SynthesizerError { message, .. } => format!("{ERROR_ANSWER_PREFIX}{message}"),
        other => format!("{ERROR_ANSWER_PREFIX}{other}"),
    }
}

/// The system prompt for `context`: the context itself, or the default.
pub fn system_prompt(context: &str) -> &str {
    if context.trim().is_empty() { DEFAULT_SYSTEM_PROMPT } else { context }
}

/// The user message sent alongside the system prompt.
pub fn user_prompt(question: &str, results: &[SearchResult]) -> Result<String> {
    let data = serde_json::to_string_pretty(results).map_err(|e| NlqError::SynthesizerError {
        synthesizer: "prompt".to_string(),
        message: format!("failed to serialize results: {e}"),
    })?;
    Ok(format!("User Question: {question}\n\nRelevant Data:\n{data}"))
}
