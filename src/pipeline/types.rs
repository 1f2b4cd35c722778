//! Shared types for the email processing pipeline.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::LlmErrorKind;
use crate::inbox::model::Email;

// ── Task names ──────────────────────────────────────────────────────

/// An LLM task that can be requested against an email.
///
/// Variant order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskName {
    Categorize,
    ExtractTasks,
    GenerateDraft,
}

impl TaskName {
    pub const ALL: [TaskName; 3] = [Self::Categorize, Self::ExtractTasks, Self::GenerateDraft];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categorize => "categorize",
            Self::ExtractTasks => "extract_tasks",
            Self::GenerateDraft => "generate_draft",
        }
    }

    /// Key under which this task's output appears in `ProcessOutcome::results`.
    pub fn result_key(&self) -> &'static str {
        match self {
            Self::Categorize => "categorization",
            Self::ExtractTasks => "action_items",
            Self::GenerateDraft => "draft",
        }
    }

    /// Exact-match lookup; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of tasks to run for one request, iterated in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSelection(BTreeSet<TaskName>);

impl TaskSelection {
    /// Every task.
    pub fn all() -> Self {
        Self(TaskName::ALL.into_iter().collect())
    }

    /// Build from request strings. Unknown names are dropped, duplicates
    /// collapse.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            match TaskName::parse(name) {
                Some(task) => {
                    selected.insert(task);
                }
                None => debug!(task = name, "Ignoring unknown task name"),
            }
        }
        Self(selected)
    }

    pub fn contains(&self, task: TaskName) -> bool {
        self.0.contains(&task)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tasks in execution order.
    pub fn iter(&self) -> impl Iterator<Item = TaskName> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<TaskName> for TaskSelection {
    fn from_iter<T: IntoIterator<Item = TaskName>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Task outcomes ───────────────────────────────────────────────────

/// Why a task produced a fallback or error shape instead of parsed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    ServiceUnreachable,
    QuotaExceeded,
    ServiceError,
    TemplateError,
    MalformedOutput,
}

impl TaskErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceUnreachable => "service_unreachable",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ServiceError => "service_error",
            Self::TemplateError => "template_error",
            Self::MalformedOutput => "malformed_output",
        }
    }
}

impl From<LlmErrorKind> for TaskErrorKind {
    fn from(kind: LlmErrorKind) -> Self {
        match kind {
            LlmErrorKind::ServiceUnreachable => Self::ServiceUnreachable,
            LlmErrorKind::QuotaExceeded => Self::QuotaExceeded,
            LlmErrorKind::ServiceError => Self::ServiceError,
        }
    }
}

/// How a single task run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// The model returned parseable JSON.
    Parsed,
    /// The model answered but the text was not JSON; a fallback shape was used.
    Malformed,
    /// No usable answer; an error shape was used.
    Failed(TaskErrorKind),
}

impl TaskStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Malformed => "malformed",
            Self::Failed(kind) => kind.as_str(),
        }
    }
}

/// Output of one task run: the value reported to the caller and how it came
/// about.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput {
    pub value: serde_json::Value,
    pub status: TaskStatus,
}

/// Result of processing one email.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    /// The email as re-read after the commit.
    pub email: Email,
    /// Per-task output keyed by `TaskName::result_key`.
    pub results: serde_json::Map<String, serde_json::Value>,
}
