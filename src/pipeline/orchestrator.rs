//! Email task orchestrator: runs the requested tasks against one email,
//! merges their output onto it, and commits everything as one unit.
//!
//! Flow per request:
//! 1. For each requested task, in fixed order: resolve prompt → run executor → merge
//! 2. One transactional commit of the email fields and any drafts
//! 3. Re-read the email and return it with the per-task results
//!
//! A failing task never stops later tasks; its error shape is merged like
//! any other output.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::inbox::model::{ActionItem, Email, NewDraft, Sentiment};
use crate::llm::provider::LlmProvider;
use crate::pipeline::executor::{
    Categorize, DraftReply, EmailTask, ExtractActionItems, TaskExecutor, TaskInput,
};
use crate::pipeline::prompts::PromptResolver;
use crate::pipeline::types::{ProcessOutcome, TaskName, TaskSelection};
use crate::store::Database;

pub struct EmailTaskOrchestrator {
    db: Arc<dyn Database>,
    prompts: PromptResolver,
    executor: TaskExecutor,
}

impl EmailTaskOrchestrator {
    pub fn new(db: Arc<dyn Database>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            prompts: PromptResolver::new(db.clone()),
            executor: TaskExecutor::new(llm),
            db,
        }
    }

    /// Load an email and process it.
    pub async fn process_by_id(
        &self,
        email_id: i64,
        tasks: &TaskSelection,
        tone: &str,
    ) -> Result<ProcessOutcome, PipelineError> {
        let email = self
            .db
            .get_email(email_id)
            .await?
            .ok_or(PipelineError::EmailNotFound(email_id))?;
        self.process(email, tasks, tone).await
    }

    /// Run `tasks` against `email` and persist the merged result.
    pub async fn process(
        &self,
        email: Email,
        tasks: &TaskSelection,
        tone: &str,
    ) -> Result<ProcessOutcome, PipelineError> {
        info!(
            email_id = email.id,
            subject = %email.subject,
            tasks = ?tasks.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            "Processing email"
        );

        let mut updated = email.clone();
        let mut drafts = Vec::new();
        let mut results = Map::new();
        let input = TaskInput {
            subject: &email.subject,
            body: &email.body,
            tone,
        };

        for task_name in tasks.iter() {
            let task = task_for(task_name);
            let custom = self.prompts.resolve(task.prompt_type()).await;
            let output = self.executor.run(task, &input, custom.as_deref()).await;

            debug!(
                email_id = email.id,
                task = %task_name,
                status = output.status.label(),
                custom_prompt = custom.is_some(),
                "Task finished"
            );

            match task_name {
                TaskName::Categorize => merge_categorization(&mut updated, &output.value),
                TaskName::ExtractTasks => merge_action_items(&mut updated, &output.value),
                TaskName::GenerateDraft => {
                    drafts.push(draft_from_output(&email, &output.value, tone));
                }
            }
            results.insert(task_name.result_key().to_string(), output.value);
        }

        self.db.commit_processing(&updated, &drafts).await?;

        let email = self
            .db
            .get_email(updated.id)
            .await?
            .ok_or(PipelineError::EmailNotFound(updated.id))?;

        info!(
            email_id = email.id,
            category = %email.category,
            priority = %email.priority,
            has_action_items = email.has_action_items,
            drafts = drafts.len(),
            "Email processed"
        );

        Ok(ProcessOutcome { email, results })
    }
}

fn task_for(name: TaskName) -> &'static dyn EmailTask {
    match name {
        TaskName::Categorize => &Categorize,
        TaskName::ExtractTasks => &ExtractActionItems,
        TaskName::GenerateDraft => &DraftReply,
    }
}

/// String field of a JSON object. Non-string scalars are rendered as JSON;
/// null or missing reads as `None`.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn label_field<T: std::str::FromStr + Default>(value: &Value, key: &str) -> T {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn merge_categorization(email: &mut Email, value: &Value) {
    email.category = label_field(value, "category");
    email.priority = label_field(value, "priority");
    email.sentiment = Some(label_field::<Sentiment>(value, "sentiment"));
}

/// `has_action_items` follows the normalized item list; the model's own
/// `has_action_items` key is ignored.
fn merge_action_items(email: &mut Email, value: &Value) {
    let items: Vec<ActionItem> = value
        .get("action_items")
        .and_then(Value::as_array)
        .map(|raw| raw.iter().filter_map(ActionItem::from_loose).collect())
        .unwrap_or_default();

    email.has_action_items = !items.is_empty();
    email.action_items = Some(serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string()));
}

fn draft_from_output(email: &Email, value: &Value, tone: &str) -> NewDraft {
    NewDraft {
        email_id: email.id,
        subject: text_field(value, "subject")
            .unwrap_or_else(|| DraftReply::reply_subject(&email.subject)),
        body: text_field(value, "body").unwrap_or_default(),
        tone: tone.to_string(),
    }
}
