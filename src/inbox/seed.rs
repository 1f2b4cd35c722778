//! Sample inbox content and default prompt templates.
//!
//! Both seeders are no-ops when their table already has rows, so running the
//! seed binary twice does not duplicate data.

use chrono::{Duration, Utc};
use tracing::info;

use crate::error::DatabaseError;
use crate::inbox::model::{NewEmail, NewPrompt, PromptType};
use crate::store::Database;

const RECIPIENT: &str = "you@company.com";

/// (sender, sender_name, subject, body)
const SAMPLE_EMAILS: &[(&str, &str, &str, &str)] = &[
    (
        "priya.lead@company.com",
        "Priya Lead",
        "Q4 Report - sections due Thursday",
        "Hi all,\n\nThe Q4 report goes to leadership on Friday. Please send me your sections by end of day Thursday:\n\n1. Budget variance\n2. Delivery metrics\n3. Risks for next quarter\n\nThanks,\nPriya",
    ),
    (
        "digest@devweekly.io",
        "Dev Weekly",
        "This week in developer tooling",
        "Top stories this week:\n\n- A new release of a popular build tool\n- Database benchmarks revisited\n- Interview: maintaining open source at scale\n\nRead online at devweekly.io",
    ),
    (
        "sarah.client@clientco.com",
        "Sarah Client",
        "Meeting Request - Partnership Discussion",
        "Hi,\n\nCould we set up a call next week to talk through the partnership proposal? Tuesday or Wednesday afternoon would suit us.\n\nBest,\nSarah",
    ),
    (
        "deals@megastore.example",
        "MegaStore",
        "Flash sale: 40% off ends tonight",
        "Everything is 40% off until midnight. Use code NIGHT40 at checkout.\n\nShop now at megastore.example",
    ),
    (
        "people@company.com",
        "People Team",
        "Book your annual review",
        "Hello,\n\nAnnual reviews are open. Please book a one-hour slot with your manager before December 1st and bring a short self-assessment.\n\nPeople Team",
    ),
    (
        "dad@familymail.example",
        "Dad",
        "Sunday lunch?",
        "Hi,\n\nAre you free for lunch on Sunday around 1? Your sister is coming too. Let me know if you want us to pick you up.\n\nDad",
    ),
    (
        "it-security@company.com",
        "IT Security",
        "URGENT: patch your laptop today",
        "A critical vulnerability affects the current OS build. Before 5 PM today:\n\n1. Install pending updates\n2. Restart\n3. Rotate your password\n\nIT Security",
    ),
    (
        "notify@socialnet.example",
        "SocialNet",
        "3 people viewed your profile",
        "You're getting noticed! 3 people viewed your profile this week. Log in to see who.",
    ),
    (
        "omar.dev@company.com",
        "Omar Dev",
        "Review please: auth refactor PR",
        "Hey,\n\nCould you look at my PR for the session refactor? It's around 250 lines. Feedback by tomorrow would be great.\n\nThanks,\nOmar",
    ),
    (
        "billing@saasco.example",
        "SaaSCo Billing",
        "Invoice #4512 due November 25",
        "Your invoice #4512 for $299.00 (Team plan, annual) is due on November 25. Please pay by then to avoid interruption.",
    ),
    (
        "hello@founders.example",
        "Lena Founder",
        "Advisory role?",
        "Hi,\n\nWe're building developer tooling for data teams and would love your input. Would you be open to a short call about an advisory role?\n\nLena",
    ),
    (
        "finance@company.com",
        "Finance",
        "Expense reports due Nov 22",
        "Reminder: October expense reports are due November 22. We're still missing receipts for the client dinner on 10/15.\n\nFinance",
    ),
];

const CATEGORIZATION_TEMPLATE: &str = r#"Categorize the email below.

Categories:
- Work: projects, meetings, colleagues and clients
- Personal: family and friends
- Promotional: sales and marketing
- Social: social network notifications
- Important: urgent or time-sensitive matters
- Spam: unsolicited or suspicious mail
- Newsletter: subscriptions and digests

Priority is High (needs action soon), Medium (normal) or Low (FYI).
Sentiment is Positive, Neutral or Negative.

Subject: {subject}
Body: {body}

Reply with JSON only:
{{"category": "...", "priority": "...", "sentiment": "...", "reasoning": "..."}}"#;

const TASK_EXTRACTION_TEMPLATE: &str = r#"List every action the recipient is asked to take in this email, explicit or implied.

Subject: {subject}
Body: {body}

Reply with JSON only:
{{
  "has_action_items": true,
  "action_items": [{{"task": "...", "deadline": "date or null", "priority": "High|Medium|Low"}}],
  "summary": "one sentence"
}}"#;

const AUTO_REPLY_TEMPLATE: &str = r#"Write a {tone} reply to this email. Answer every question it asks, keep it short, and use a greeting and sign-off.

Subject: {subject}
Body: {body}

Reply with JSON only:
{{"subject": "Re: ...", "body": "...", "key_points": ["..."]}}"#;

/// The prompts installed by the seeder, all active.
pub fn default_prompts() -> Vec<NewPrompt> {
    vec![
        NewPrompt {
            name: "Inbox Categorization".to_string(),
            prompt_type: PromptType::Categorization,
            content: CATEGORIZATION_TEMPLATE.to_string(),
            is_active: true,
        },
        NewPrompt {
            name: "Action Item Extraction".to_string(),
            prompt_type: PromptType::TaskExtraction,
            content: TASK_EXTRACTION_TEMPLATE.to_string(),
            is_active: true,
        },
        NewPrompt {
            name: "Courteous Reply".to_string(),
            prompt_type: PromptType::AutoReply,
            content: AUTO_REPLY_TEMPLATE.to_string(),
            is_active: true,
        },
    ]
}

/// The sample emails, spread over the last few days.
pub fn sample_emails() -> Vec<NewEmail> {
    let now = Utc::now();
    SAMPLE_EMAILS
        .iter()
        .enumerate()
        .map(|(i, (sender, name, subject, body))| {
            NewEmail::new(*sender, *name, RECIPIENT, *subject, *body)
                .received_at(now - Duration::hours(7 * i as i64 + 1))
        })
        .collect()
}

/// Insert the sample emails unless the inbox already has mail.
/// Returns how many were inserted.
pub async fn seed_sample_emails(db: &dyn Database) -> Result<usize, DatabaseError> {
    let existing = db.inbox_stats().await?.total_emails;
    if existing > 0 {
        info!(existing, "Emails already present, skipping sample emails");
        return Ok(0);
    }

    let emails = sample_emails();
    for email in &emails {
        db.insert_email(email).await?;
    }
    info!(count = emails.len(), "Sample emails inserted");
    Ok(emails.len())
}

/// Insert the default prompts unless any prompt exists.
/// Returns how many were inserted.
pub async fn seed_default_prompts(db: &dyn Database) -> Result<usize, DatabaseError> {
    let existing = db.list_prompts().await?.len();
    if existing > 0 {
        info!(existing, "Prompts already present, skipping defaults");
        return Ok(0);
    }

    let prompts = default_prompts();
    for prompt in &prompts {
        db.insert_prompt(prompt).await?;
    }
    info!(count = prompts.len(), "Default prompts inserted");
    Ok(prompts.len())
}
