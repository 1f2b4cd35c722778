//! Email processing pipeline.
//!
//! A processing request flows through:
//! 1. `PromptResolver::resolve()`: active custom template or the built-in default
//! 2. `TaskExecutor::run()`: render, one LLM call, `extract()` to JSON
//! 3. `EmailTaskOrchestrator`: merge onto the email, commit with drafts
//!
//! No LLM failure escapes as an error; each task reports a fallback or error
//! shape instead.

pub mod chat;
pub mod executor;
pub mod extract;
pub mod orchestrator;
pub mod prompts;
pub mod types;

pub use chat::InboxChat;
pub use extract::{Extracted, extract};
pub use orchestrator::EmailTaskOrchestrator;
pub use prompts::{PromptResolver, render_template};
pub use types::{ProcessOutcome, TaskErrorKind, TaskName, TaskSelection};
