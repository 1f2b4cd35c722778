//! Inbox data model: emails, prompts, drafts and their label enums.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Labels ──────────────────────────────────────────────────────────

/// Inbox category assigned by the categorization task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Category {
    Work,
    Personal,
    Promotional,
    Social,
    Important,
    Spam,
    Newsletter,
    #[default]
    Uncategorized,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Self::Work,
        Self::Personal,
        Self::Promotional,
        Self::Social,
        Self::Important,
        Self::Spam,
        Self::Newsletter,
        Self::Uncategorized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Personal => "Personal",
            Self::Promotional => "Promotional",
            Self::Social => "Social",
            Self::Important => "Important",
            Self::Spam => "Spam",
            Self::Newsletter => "Newsletter",
            Self::Uncategorized => "Uncategorized",
        }
    }
}

/// Email or action-item priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Tone of an email as judged by the categorization task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Self::Positive, Self::Neutral, Self::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

/// Which email task a stored prompt template drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    Categorization,
    TaskExtraction,
    AutoReply,
}

impl PromptType {
    pub const ALL: [PromptType; 3] = [Self::Categorization, Self::TaskExtraction, Self::AutoReply];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categorization => "categorization",
            Self::TaskExtraction => "task_extraction",
            Self::AutoReply => "auto_reply",
        }
    }
}

/// Error returned when a label string is not part of its closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Case-insensitive match against `as_str()` of each candidate.
fn parse_label<T: Copy>(
    kind: &'static str,
    raw: &str,
    all: &[T],
    as_str: fn(&T) -> &'static str,
) -> Result<T, UnknownLabel> {
    let wanted = raw.trim();
    all.iter()
        .copied()
        .find(|candidate| as_str(candidate).eq_ignore_ascii_case(wanted))
        .ok_or_else(|| UnknownLabel {
            kind,
            value: raw.to_string(),
        })
}

impl FromStr for Category {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("category", s, &Self::ALL, Self::as_str)
    }
}

impl FromStr for Priority {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("priority", s, &Self::ALL, Self::as_str)
    }
}

impl FromStr for Sentiment {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("sentiment", s, &Self::ALL, Self::as_str)
    }
}

impl FromStr for PromptType {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("prompt type", s, &Self::ALL, Self::as_str)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Email ───────────────────────────────────────────────────────────

/// A stored email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: i64,
    pub sender: String,
    pub sender_name: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    pub received_at: DateTime<Utc>,
    pub is_read: bool,
    pub has_action_items: bool,
    /// JSON array of `ActionItem`, as written by the last extraction run.
    #[serde(default)]
    pub action_items: Option<String>,
}

impl Email {
    /// Decode the stored action items. Unreadable payloads decode as empty.
    pub fn parsed_action_items(&self) -> Vec<ActionItem> {
        self.action_items
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// Fields accepted when creating an email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmail {
    pub sender: String,
    pub sender_name: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

impl NewEmail {
    pub fn new(
        sender: impl Into<String>,
        sender_name: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            sender_name: sender_name.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            received_at: None,
        }
    }

    /// Builder: set the received timestamp.
    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = Some(at);
        self
    }
}

/// Filter for listing emails.
#[derive(Debug, Clone, Copy)]
pub struct EmailFilter {
    pub category: Option<Category>,
    pub skip: u32,
    pub limit: u32,
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self {
            category: None,
            skip: 0,
            limit: 100,
        }
    }
}

/// One extracted action item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub task: String,
    pub deadline: Option<String>,
    pub priority: Priority,
}

impl ActionItem {
    /// Read an action item out of loosely-shaped LLM output.
    ///
    /// Non-objects are rejected. Missing or unknown fields fall back to
    /// empty task, no deadline, and Medium priority. A deadline of `"null"`
    /// or an empty string counts as no deadline.
    pub fn from_loose(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;

        let task = match obj.get("task") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let deadline = obj
            .get("deadline")
            .and_then(|d| d.as_str())
            .map(str::trim)
            .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("null"))
            .map(str::to_string);

        let priority = obj
            .get("priority")
            .and_then(|p| p.as_str())
            .and_then(|p| p.parse().ok())
            .unwrap_or_default();

        Some(Self {
            task,
            deadline,
            priority,
        })
    }
}

// ── Prompt ──────────────────────────────────────────────────────────

/// A stored prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: i64,
    pub name: String,
    pub prompt_type: PromptType,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Fields accepted when creating a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrompt {
    pub name: String,
    pub prompt_type: PromptType,
    pub content: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial update for a prompt; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

// ── Draft ───────────────────────────────────────────────────────────

pub const DEFAULT_TONE: &str = "professional";

/// A generated reply draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: i64,
    pub email_id: i64,
    pub subject: String,
    pub body: String,
    pub tone: String,
    pub created_at: DateTime<Utc>,
    pub is_sent: bool,
}

/// A draft waiting to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDraft {
    pub email_id: i64,
    pub subject: String,
    pub body: String,
    pub tone: String,
}

// ── Stats ───────────────────────────────────────────────────────────

/// Aggregate counts over the inbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxStats {
    pub total_emails: i64,
    pub unread_count: i64,
    pub categories: BTreeMap<String, i64>,
    pub priorities: BTreeMap<String, i64>,
    pub action_items_count: i64,
    pub drafts_count: i64,
}

impl InboxStats {
    /// One-line inbox summary handed to the chat model as context.
    pub fn chat_context(&self) -> String {
        let categories = self
            .categories
            .iter()
            .map(|(name, count)| format!("{name}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "User has {} emails. {} unread. Categories: {{{}}}",
            self.total_emails, self.unread_count, categories
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("work".parse::<Category>().unwrap(), Category::Work);
        assert_eq!(" HIGH ".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("negative".parse::<Sentiment>().unwrap(), Sentiment::Negative);
        assert_eq!(
            "task_extraction".parse::<PromptType>().unwrap(),
            PromptType::TaskExtraction
        );
    }

    #[test]
    fn unknown_labels_are_rejected() {
        let err = "Error".parse::<Category>().unwrap_err();
        assert_eq!(err.to_string(), "'Error' is not a valid category");
        assert!("urgent".parse::<Priority>().is_err());
        assert!("summary".parse::<PromptType>().is_err());
    }

    #[test]
    fn labels_serialize_as_display_strings() {
        assert_eq!(serde_json::to_value(Category::Newsletter).unwrap(), "Newsletter");
        assert_eq!(serde_json::to_value(Priority::Low).unwrap(), "Low");
        assert_eq!(serde_json::to_value(PromptType::AutoReply).unwrap(), "auto_reply");
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(Category::default(), Category::Uncategorized);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Sentiment::default(), Sentiment::Neutral);
    }

    #[test]
    fn action_item_from_loose_object() {
        let item = ActionItem::from_loose(&json!({
            "task": "Submit budget analysis",
            "deadline": "Thursday EOD",
            "priority": "high"
        }))
        .unwrap();
        assert_eq!(item.task, "Submit budget analysis");
        assert_eq!(item.deadline.as_deref(), Some("Thursday EOD"));
        assert_eq!(item.priority, Priority::High);
    }

    #[test]
    fn action_item_missing_fields_fall_back() {
        let item = ActionItem::from_loose(&json!({"deadline": "null", "priority": "ASAP"})).unwrap();
        assert_eq!(item.task, "");
        assert_eq!(item.deadline, None);
        assert_eq!(item.priority, Priority::Medium);
        assert!(ActionItem::from_loose(&json!("call Bob")).is_none());
    }

    #[test]
    fn parsed_action_items_tolerates_garbage() {
        let mut email = sample_email();
        email.action_items = Some("not json".into());
        assert!(email.parsed_action_items().is_empty());

        email.action_items = Some(r#"[{"task":"Reply","deadline":null,"priority":"Low"}]"#.into());
        let items = email.parsed_action_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].priority, Priority::Low);
    }

    #[test]
    fn new_prompt_defaults_to_active() {
        let prompt: NewPrompt = serde_json::from_value(json!({
            "name": "Strict categorizer",
            "prompt_type": "categorization",
            "content": "Categorize {subject}"
        }))
        .unwrap();
        assert!(prompt.is_active);
        assert!(
            serde_json::from_value::<NewPrompt>(json!({
                "name": "x", "prompt_type": "summary", "content": "y"
            }))
            .is_err()
        );
    }

    #[test]
    fn chat_context_summary() {
        let mut stats = InboxStats {
            total_emails: 3,
            unread_count: 2,
            ..Default::default()
        };
        stats.categories.insert("Work".into(), 2);
        stats.categories.insert("Spam".into(), 1);
        assert_eq!(
            stats.chat_context(),
            "User has 3 emails. 2 unread. Categories: {Spam: 1, Work: 2}"
        );
    }

    fn sample_email() -> Email {
        Email {
            id: 1,
            sender: "sarah.client@clientco.com".into(),
            sender_name: "Sarah Client".into(),
            recipient: "you@company.com".into(),
            subject: "Meeting Request".into(),
            body: "Can we meet Tuesday?".into(),
            category: Category::Uncategorized,
            priority: Priority::Medium,
            sentiment: None,
            received_at: Utc::now(),
            is_read: false,
            has_action_items: false,
            action_items: None,
        }
    }
}
