//! Task executors: one LLM call per task, normalized into a JSON value.
//!
//! Each task supplies its template variables and the shapes used when the
//! model output is not JSON (fallback) or the call never produced output
//! (error). `TaskExecutor::run` never fails; every problem is folded into
//! the returned value.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::inbox::model::PromptType;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::pipeline::extract::{Extracted, extract};
use crate::pipeline::prompts::{default_template, render_template};
use crate::pipeline::types::{TaskErrorKind, TaskName, TaskOutput, TaskStatus};

/// Email fields a task is run against.
#[derive(Debug, Clone, Copy)]
pub struct TaskInput<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub tone: &'a str,
}

/// Per-task behaviour plugged into `TaskExecutor`.
pub trait EmailTask: Send + Sync {
    fn name(&self) -> TaskName;

    fn prompt_type(&self) -> PromptType;

    fn temperature(&self) -> f32;

    /// Placeholders this task's templates may use.
    fn variables<'a>(&self, input: &TaskInput<'a>) -> Vec<(&'static str, &'a str)> {
        vec![("subject", input.subject), ("body", input.body)]
    }

    /// Shape returned when the model answered with non-JSON text.
    fn fallback(&self, input: &TaskInput<'_>, raw: String) -> Value;

    /// Shape returned when no answer was obtained.
    fn error_shape(&self, input: &TaskInput<'_>, kind: TaskErrorKind, error: String) -> Value;
}

/// Category, priority and sentiment.
pub struct Categorize;

impl EmailTask for Categorize {
    fn name(&self) -> TaskName {
        TaskName::Categorize
    }

    fn prompt_type(&self) -> PromptType {
        PromptType::Categorization
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn fallback(&self, _input: &TaskInput<'_>, raw: String) -> Value {
        json!({
            "category": "Uncategorized",
            "priority": "Medium",
            "sentiment": "Neutral",
            "reasoning": raw,
            "error_kind": TaskErrorKind::MalformedOutput,
        })
    }

    fn error_shape(&self, _input: &TaskInput<'_>, kind: TaskErrorKind, error: String) -> Value {
        json!({
            "category": "Uncategorized",
            "priority": "Medium",
            "sentiment": "Neutral",
            "error": error,
            "error_kind": kind,
        })
    }
}

/// Action items with deadlines and priorities.
pub struct ExtractActionItems;

impl EmailTask for ExtractActionItems {
    fn name(&self) -> TaskName {
        TaskName::ExtractTasks
    }

    fn prompt_type(&self) -> PromptType {
        PromptType::TaskExtraction
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn fallback(&self, _input: &TaskInput<'_>, raw: String) -> Value {
        json!({
            "has_action_items": false,
            "action_items": [],
            "summary": raw,
            "error_kind": TaskErrorKind::MalformedOutput,
        })
    }

    fn error_shape(&self, _input: &TaskInput<'_>, kind: TaskErrorKind, error: String) -> Value {
        json!({
            "has_action_items": false,
            "action_items": [],
            "error": error,
            "error_kind": kind,
        })
    }
}

/// Reply draft in the requested tone.
pub struct DraftReply;

impl DraftReply {
    pub fn reply_subject(subject: &str) -> String {
        format!("Re: {subject}")
    }
}

impl EmailTask for DraftReply {
    fn name(&self) -> TaskName {
        TaskName::GenerateDraft
    }

    fn prompt_type(&self) -> PromptType {
        PromptType::AutoReply
    }

    fn temperature(&self) -> f32 {
        0.7
    }

    fn variables<'a>(&self, input: &TaskInput<'a>) -> Vec<(&'static str, &'a str)> {
        vec![
            ("subject", input.subject),
            ("body", input.body),
            ("tone", input.tone),
        ]
    }

    fn fallback(&self, input: &TaskInput<'_>, raw: String) -> Value {
        json!({
            "subject": Self::reply_subject(input.subject),
            "body": raw,
            "key_points": [],
            "error_kind": TaskErrorKind::MalformedOutput,
        })
    }

    fn error_shape(&self, input: &TaskInput<'_>, kind: TaskErrorKind, error: String) -> Value {
        json!({
            "subject": Self::reply_subject(input.subject),
            "body": "Error generating draft.",
            "key_points": [],
            "error": error,
            "error_kind": kind,
        })
    }
}

/// Runs email tasks against one LLM provider.
pub struct TaskExecutor {
    llm: Arc<dyn LlmProvider>,
}

impl TaskExecutor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Render the template (custom or default), call the model once, and
    /// normalize the answer.
    pub async fn run(
        &self,
        task: &dyn EmailTask,
        input: &TaskInput<'_>,
        custom_template: Option<&str>,
    ) -> TaskOutput {
        let template = custom_template.unwrap_or_else(|| default_template(task.prompt_type()));

        let prompt = match render_template(template, &task.variables(input)) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(task = %task.name(), error = %e, "Prompt template rejected");
                return failed(task, input, TaskErrorKind::TemplateError, e.to_string());
            }
        };

        let request = CompletionRequest::from_prompt(prompt).with_temperature(task.temperature());
        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    task = %task.name(),
                    model = self.llm.model_name(),
                    error = %e,
                    "LLM call failed"
                );
                return failed(task, input, e.kind().into(), e.to_string());
            }
        };

        debug!(
            task = %task.name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "LLM call complete"
        );

        match extract(&response.content) {
            Extracted::Parsed(value) => TaskOutput {
                value,
                status: TaskStatus::Parsed,
            },
            Extracted::Unparsed(raw) => {
                warn!(task = %task.name(), raw = %raw, "Model output was not JSON");
                TaskOutput {
                    value: task.fallback(input, raw),
                    status: TaskStatus::Malformed,
                }
            }
        }
    }
}

fn failed(task: &dyn EmailTask, input: &TaskInput<'_>, kind: TaskErrorKind, error: String) -> TaskOutput {
    TaskOutput {
        value: task.error_shape(input, kind, error),
        status: TaskStatus::Failed(kind),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::provider::{CompletionResponse, FinishReason};

    /// Mock LLM that replays scripted replies in order and records prompts.
    pub(crate) struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn ok(text: &str) -> Result<String, LlmError> {
            Ok(text.to_string())
        }

        pub(crate) fn quota() -> Result<String, LlmError> {
            Err(LlmError::QuotaExceeded {
                provider: "mock".into(),
                reason: "RESOURCE_EXHAUSTED".into(),
            })
        }

        pub(crate) fn unreachable() -> Result<String, LlmError> {
            Err(LlmError::Unreachable {
                provider: "mock".into(),
                reason: "connection refused".into(),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "mock-scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let prompt = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);

            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("{}".to_string()))?;
            Ok(CompletionResponse {
                content: reply,
                input_tokens: 100,
                output_tokens: 50,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    fn input() -> TaskInput<'static> {
        TaskInput {
            subject: "Meeting Request",
            body: "Can we meet Tuesday?",
            tone: "friendly",
        }
    }

    #[tokio::test]
    async fn parsed_output_is_returned_as_is() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::ok(
            "```json\n{\"category\": \"Work\", \"extra\": 1}\n```",
        )]));
        let executor = TaskExecutor::new(llm.clone());

        let out = executor.run(&Categorize, &input(), None).await;
        assert_eq!(out.status, TaskStatus::Parsed);
        assert_eq!(out.value, json!({"category": "Work", "extra": 1}));

        let prompt = &llm.prompts.lock().unwrap()[0];
        assert!(prompt.contains("Email Subject: Meeting Request"));
        assert!(prompt.contains("Email Body: Can we meet Tuesday?"));
    }

    #[tokio::test]
    async fn custom_template_is_used() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::ok("{}")]));
        let executor = TaskExecutor::new(llm.clone());

        executor
            .run(&DraftReply, &input(), Some("Reply {tone}ly to {subject}"))
            .await;
        assert_eq!(
            llm.prompts.lock().unwrap()[0],
            "Reply friendlyly to Meeting Request"
        );
    }

    #[tokio::test]
    async fn malformed_output_uses_fallback_shapes() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::ok("Looks like work."),
            ScriptedLlm::ok("Nothing to do here."),
            ScriptedLlm::ok("Sure, Tuesday works!"),
        ]));
        let executor = TaskExecutor::new(llm);

        let cat = executor.run(&Categorize, &input(), None).await;
        assert_eq!(cat.status, TaskStatus::Malformed);
        assert_eq!(
            cat.value,
            json!({
                "category": "Uncategorized",
                "priority": "Medium",
                "sentiment": "Neutral",
                "reasoning": "Looks like work.",
                "error_kind": "malformed_output"
            })
        );

        let items = executor.run(&ExtractActionItems, &input(), None).await;
        assert_eq!(
            items.value,
            json!({
                "has_action_items": false,
                "action_items": [],
                "summary": "Nothing to do here.",
                "error_kind": "malformed_output"
            })
        );

        let draft = executor.run(&DraftReply, &input(), None).await;
        assert_eq!(
            draft.value,
            json!({
                "subject": "Re: Meeting Request",
                "body": "Sure, Tuesday works!",
                "key_points": [],
                "error_kind": "malformed_output"
            })
        );
    }

    #[tokio::test]
    async fn llm_failure_uses_error_shape_with_kind() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::unreachable(),
            ScriptedLlm::quota(),
            ScriptedLlm::quota(),
        ]));
        let executor = TaskExecutor::new(llm);

        let cat = executor.run(&Categorize, &input(), None).await;
        assert_eq!(cat.status, TaskStatus::Failed(TaskErrorKind::ServiceUnreachable));
        assert_eq!(cat.value["category"], "Uncategorized");
        assert_eq!(cat.value["error_kind"], "service_unreachable");
        assert!(cat.value["error"].as_str().unwrap().contains("connection refused"));
        assert!(cat.value.get("reasoning").is_none());

        let items = executor.run(&ExtractActionItems, &input(), None).await;
        assert_eq!(items.value["has_action_items"], false);
        assert_eq!(items.value["action_items"], json!([]));
        assert_eq!(items.value["error_kind"], "quota_exceeded");

        let draft = executor.run(&DraftReply, &input(), None).await;
        assert_eq!(draft.value["subject"], "Re: Meeting Request");
        assert_eq!(draft.value["body"], "Error generating draft.");
        assert_eq!(draft.value["error_kind"], "quota_exceeded");
    }

    #[tokio::test]
    async fn bad_template_is_reported_without_calling_llm() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let executor = TaskExecutor::new(llm.clone());

        // {tone} is only available to the draft task.
        let out = executor
            .run(&Categorize, &input(), Some("Categorize in a {tone} way: {subject}"))
            .await;
        assert_eq!(out.status, TaskStatus::Failed(TaskErrorKind::TemplateError));
        assert_eq!(out.value["error_kind"], "template_error");
        assert_eq!(out.value["category"], "Uncategorized");
        assert_eq!(llm.calls(), 0);
    }
}
