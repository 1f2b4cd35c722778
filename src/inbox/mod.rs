//! Inbox domain: emails, prompts, drafts, and sample data.

pub mod model;
pub mod seed;

pub use model::{
    ActionItem, Category, Draft, Email, EmailFilter, InboxStats, NewDraft, NewEmail, NewPrompt,
    Priority, Prompt, PromptType, PromptUpdate, Sentiment,
};
