//! Prompt templates: built-in defaults, active-prompt lookup, and
//! placeholder substitution.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::TemplateError;
use crate::inbox::model::PromptType;
use crate::store::Database;

pub const DEFAULT_CATEGORIZATION_TEMPLATE: &str = r#"Analyze the following email and categorize it.

Email Subject: {subject}
Email Body: {body}

Respond ONLY with a valid JSON object (no markdown, no extra text) with these exact keys:
{{
  "category": "Work|Personal|Promotional|Social|Important|Spam|Newsletter",
  "priority": "High|Medium|Low",
  "sentiment": "Positive|Neutral|Negative",
  "reasoning": "brief explanation"
}}"#;

pub const DEFAULT_TASK_EXTRACTION_TEMPLATE: &str = r#"Analyze the following email and extract all action items, tasks, or requests.

Email Subject: {subject}
Email Body: {body}

Respond ONLY with a valid JSON object (no markdown, no extra text):
{{
  "has_action_items": true or false,
  "action_items": [
    {{"task": "description", "deadline": "date or null", "priority": "High|Medium|Low"}}
  ],
  "summary": "brief summary"
}}"#;

pub const DEFAULT_AUTO_REPLY_TEMPLATE: &str = r#"Generate a {tone} reply to the following email.

Email Subject: {subject}
Email Body: {body}

Respond ONLY with a valid JSON object (no markdown, no extra text):
{{
  "subject": "reply subject line",
  "body": "reply email body",
  "key_points": ["point 1", "point 2"]
}}"#;

/// Built-in template used when no custom prompt is active.
pub fn default_template(prompt_type: PromptType) -> &'static str {
    match prompt_type {
        PromptType::Categorization => DEFAULT_CATEGORIZATION_TEMPLATE,
        PromptType::TaskExtraction => DEFAULT_TASK_EXTRACTION_TEMPLATE,
        PromptType::AutoReply => DEFAULT_AUTO_REPLY_TEMPLATE,
    }
}

/// Looks up the active custom template for a prompt type.
pub struct PromptResolver {
    db: Arc<dyn Database>,
}

impl PromptResolver {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Content of the active prompt of this type, or `None` to use the
    /// built-in default. Store failures are logged and read as `None`.
    pub async fn resolve(&self, prompt_type: PromptType) -> Option<String> {
        match self.db.active_prompts(prompt_type).await {
            Ok(prompts) => {
                if prompts.len() > 1 {
                    warn!(
                        prompt_type = %prompt_type,
                        count = prompts.len(),
                        "Multiple active prompts, using lowest id"
                    );
                }
                let chosen = prompts.into_iter().next()?;
                debug!(prompt_type = %prompt_type, prompt_id = chosen.id, "Using custom prompt");
                Some(chosen.content)
            }
            Err(e) => {
                warn!(prompt_type = %prompt_type, error = %e, "Prompt lookup failed, using default");
                None
            }
        }
    }
}

/// Substitute `{name}` placeholders from `vars`.
///
/// `{{` and `}}` produce literal braces. Substituted values are inserted
/// verbatim and never re-scanned.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if let Some((_, '{')) = chars.peek() {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, nc) in chars.by_ref() {
                    match nc {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(TemplateError::UnclosedBrace(pos)),
                        other => name.push(other),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnclosedBrace(pos));
                }
                let value = vars
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or(TemplateError::UnknownPlaceholder(name))?;
                out.push_str(value);
            }
            '}' => {
                if let Some((_, '}')) = chars.peek() {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::StrayClosingBrace(pos));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::model::{NewPrompt, PromptUpdate};
    use crate::store::LibSqlBackend;

    #[test]
    fn substitutes_placeholders() {
        let out = render_template(
            "Subject: {subject}\nBody: {body}",
            &[("subject", "Hi"), ("body", "Lunch?")],
        )
        .unwrap();
        assert_eq!(out, "Subject: Hi\nBody: Lunch?");
    }

    #[test]
    fn double_braces_are_literal() {
        let out = render_template(r#"{{"category": "{subject}"}}"#, &[("subject", "x")]).unwrap();
        assert_eq!(out, r#"{"category": "x"}"#);
    }

    #[test]
    fn values_are_not_rescanned() {
        let out = render_template("{body}", &[("body", "{subject} }} {")]).unwrap();
        assert_eq!(out, "{subject} }} {");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        assert_eq!(
            render_template("Hi {sender}", &[("subject", "x")]),
            Err(TemplateError::UnknownPlaceholder("sender".into()))
        );
        assert_eq!(
            render_template("empty {}", &[]),
            Err(TemplateError::UnknownPlaceholder(String::new()))
        );
    }

    #[test]
    fn malformed_braces_are_errors() {
        assert_eq!(
            render_template("oops {subject", &[("subject", "x")]),
            Err(TemplateError::UnclosedBrace(5))
        );
        assert_eq!(
            render_template("a } b", &[]),
            Err(TemplateError::StrayClosingBrace(2))
        );
        assert_eq!(
            render_template("{a{b}", &[("b", "x")]),
            Err(TemplateError::UnclosedBrace(0))
        );
    }

    #[test]
    fn defaults_render_with_their_variables() {
        let email = [("subject", "S"), ("body", "B")];
        render_template(DEFAULT_CATEGORIZATION_TEMPLATE, &email).unwrap();
        render_template(DEFAULT_TASK_EXTRACTION_TEMPLATE, &email).unwrap();
        let draft = render_template(
            DEFAULT_AUTO_REPLY_TEMPLATE,
            &[("subject", "S"), ("body", "B"), ("tone", "friendly")],
        )
        .unwrap();
        assert!(draft.starts_with("Generate a friendly reply"));
        assert!(draft.contains(r#""key_points": ["point 1", "point 2"]"#));
    }

    #[tokio::test]
    async fn resolver_prefers_active_custom_prompt() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let resolver = PromptResolver::new(db.clone());

        assert_eq!(resolver.resolve(PromptType::Categorization).await, None);

        let prompt = db
            .insert_prompt(&NewPrompt {
                name: "Mine".into(),
                prompt_type: PromptType::Categorization,
                content: "Custom {subject}".into(),
                is_active: true,
            })
            .await
            .unwrap();
        assert_eq!(
            resolver.resolve(PromptType::Categorization).await.as_deref(),
            Some("Custom {subject}")
        );
        assert_eq!(resolver.resolve(PromptType::AutoReply).await, None);

        db.update_prompt(
            prompt.id,
            &PromptUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(resolver.resolve(PromptType::Categorization).await, None);
    }
}
