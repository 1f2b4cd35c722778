//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{CompletionModel, Message};
use rig::message::AssistantContent;

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Anthropic rejects requests without a token ceiling.
const DEFAULT_MAX_TOKENS: u64 = 2048;

/// Adapter over any rig completion model (Anthropic, OpenAI).
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Flatten the non-system turns into one prompt. Email tasks only ever send a
/// single user turn, so this is lossless for them.
fn flatten_prompt(request: &CompletionRequest) -> String {
    let turns: Vec<&crate::llm::ChatMessage> = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .collect();

    if turns.len() == 1 {
        return turns[0].content.clone();
    }

    turns
        .iter()
        .map(|m| match m.role {
            Role::Assistant => format!("Assistant: {}", m.content),
            _ => format!("User: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Classify a rig error by its message; rig wraps transport and provider
/// failures in a handful of string-carrying variants.
fn classify_error(provider: &str, message: String) -> LlmError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("quota") {
        LlmError::QuotaExceeded {
            provider: provider.to_string(),
            reason: message,
        }
    } else if lower.contains("401") || lower.contains("authentication") || lower.contains("api key") {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else if lower.contains("error sending request")
        || lower.contains("connect")
        || lower.contains("timed out")
        || lower.contains("dns")
    {
        LlmError::Unreachable {
            provider: provider.to_string(),
            reason: message,
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: message,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = flatten_prompt(&request);

        let mut builder = self
            .model
            .completion_request(Message::user(prompt))
            .max_tokens(
                request
                    .max_tokens
                    .map(u64::from)
                    .unwrap_or(DEFAULT_MAX_TOKENS),
            );
        if let Some(system) = request.system_text() {
            builder = builder.preamble(system);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&self.model_name, e.to_string()))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}
