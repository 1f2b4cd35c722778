//! Inbox Assist: email categorization, action-item extraction and reply
//! drafting over an LLM, behind a small REST API.

pub mod api;
pub mod config;
pub mod error;
pub mod inbox;
pub mod llm;
pub mod pipeline;
pub mod store;
