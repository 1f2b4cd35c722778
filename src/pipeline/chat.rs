//! Free-form questions about the inbox.

use std::sync::Arc;

use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, LlmProvider};

const ASSISTANT_PREAMBLE: &str = "You are an AI email assistant helping users manage their inbox.
You can answer questions about emails, help prioritize tasks, and provide insights about the inbox.";

/// Answers user questions with an inbox summary as context.
pub struct InboxChat {
    llm: Arc<dyn LlmProvider>,
}

impl InboxChat {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Ask the model `message`, prefixed with `context` when given.
    pub async fn ask(&self, message: &str, context: Option<&str>) -> Result<String, LlmError> {
        let request = CompletionRequest::from_prompt(build_prompt(message, context));
        let response = self.llm.complete(request).await?;
        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Chat answered"
        );
        Ok(response.content)
    }
}

fn build_prompt(message: &str, context: Option<&str>) -> String {
    let context = context
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("Context: {c}"))
        .unwrap_or_default();
    format!("{ASSISTANT_PREAMBLE}\n\n{context}\n\nUser question: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::executor::tests::ScriptedLlm;

    #[test]
    fn prompt_includes_context_when_present() {
        let prompt = build_prompt("How many unread?", Some("User has 3 emails. 2 unread."));
        assert!(prompt.starts_with("You are an AI email assistant"));
        assert!(prompt.contains("\n\nContext: User has 3 emails. 2 unread.\n\n"));
        assert!(prompt.ends_with("User question: How many unread?"));

        let bare = build_prompt("Hi", Some("  "));
        assert!(!bare.contains("Context:"));
    }

    #[tokio::test]
    async fn ask_returns_raw_text() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::ok("You have 2 unread emails.")]));
        let chat = InboxChat::new(llm.clone());

        let answer = chat.ask("How many unread?", Some("ctx")).await.unwrap();
        assert_eq!(answer, "You have 2 unread emails.");
        assert!(llm.prompts.lock().unwrap()[0].contains("Context: ctx"));
    }

    #[tokio::test]
    async fn ask_propagates_llm_errors() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::quota()]));
        let chat = InboxChat::new(llm);

        let err = chat.ask("Anything urgent?", None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::LlmErrorKind::QuotaExceeded);
    }
}
