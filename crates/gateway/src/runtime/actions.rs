//! Turns a generated reply into structured side-effect intents.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use tp_domain::conversation::{
    ActionIntent, ActionKind, ChatMessage, Role, TaskPriority, TaskType, TicketCategory,
};
use tp_domain::error::Error;

use crate::runtime::governed::GovernedClient;
use crate::runtime::reply::parse_strict;

/// Words in a reply that make extraction worth a model call.
const ACTION_HINTS: &[&str] = &[
    "note", "créer", "create", "rappel", "remind", "todo", "task", "escalat", "equipe", "team",
    "fermer", "close", "demain", "tomorrow", "plus tard", "later", "heure", "hour", "minute",
    "manager", "someone", "ping", "ask", "let me get", "attends", "glad", "worked", "résolu",
    "resolved", "parfait", "n'hésite pas", "help", "any time",
];

/// Phrases the offline fallback reads as "I'm writing this down".
const TASK_PHRASES: &[&str] = &["je note", "je crée", "i'll create", "i'll note", "let me note"];

const FALLBACK_CONFIDENCE: f32 = 0.8;
const WINDOW: usize = 4;

/// Who and what the reply belongs to.
#[derive(Debug, Clone)]
pub struct ActionContext<'a> {
    pub channel_id: &'a str,
    pub ticket_id: &'a str,
    pub counterpart_id: &'a str,
    pub category: TicketCategory,
    /// The counterpart message the reply answers.
    pub trigger: &'a str,
}

#[derive(Deserialize)]
struct ActionsJson {
    actions: Vec<Value>,
}

#[derive(Deserialize)]
struct IntentJson {
    #[serde(flatten)]
    kind: ActionKind,
    confidence: f32,
}

pub struct ActionExtractor {
    llm: Arc<GovernedClient>,
}

impl ActionExtractor {
    pub fn new(llm: Arc<GovernedClient>) -> Self {
        Self { llm }
    }

    /// Intents found in `latest_response`, confidence clamped to 0..=1 but
    /// not yet filtered by the floor.
    ///
    /// A reply with no action wording skips the model. When the model is
    /// unreachable the keyword fallback runs instead; an answer that does
    /// not fit the schema yields nothing.
    pub async fn detect_actions(
        &self,
        history: &[ChatMessage],
        latest_response: &str,
        ctx: &ActionContext<'_>,
    ) -> Vec<ActionIntent> {
        let lower = latest_response.to_lowercase();
        if !ACTION_HINTS.iter().any(|h| lower.contains(h)) {
            return Vec::new();
        }

        let prompt = extraction_prompt(history, latest_response, ctx.category);
        let raw = match self
            .llm
            .complete_json(
                TaskType::ActionDetection,
                "You are an action extractor. Respond only with valid JSON.",
                prompt,
                Some(ctx.ticket_id),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(channel_id = ctx.channel_id, error = %e, "action detection unavailable, using keywords");
                return keyword_fallback(latest_response, ctx);
            }
        };

        match parse_actions(&raw) {
            Ok(intents) => intents,
            Err(e) => {
                tracing::warn!(channel_id = ctx.channel_id, error = %e, "action detection answer rejected");
                Vec::new()
            }
        }
    }
}

fn extraction_prompt(history: &[ChatMessage], latest_response: &str, category: TicketCategory) -> String {
    let start = history.len().saturating_sub(WINDOW);
    let snippet = history[start..]
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::Counterpart => "user",
                Role::Agent => "agent",
            };
            format!("[{role}]: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\
Analyze the agent's latest response in a {category} support ticket. Extract structured actions if any.

Action types:
- task: work to track. Fields: \"title\", \"description\" (optional), \"priority\": low|normal|high|urgent
- reminder: time-based alert. Fields: \"content\", \"delay_ms\" (\"2h\" = 7200000, \"tomorrow\" = 86400000, \"30min\" = 1800000)
- escalate: needs a human. Fields: \"reason\" (professional and neutral), \"specialty\" (developer|designer|manager|support, optional)
- close: the ticket can close. Fields: \"reason\" (optional)

CONVERSATION:
{snippet}

AGENT RESPONSE:
{latest_response}

Respond ONLY with a JSON object: {{\"actions\": [{{\"type\": \"...\", \"confidence\": 0.0-1.0, ...fields}}]}}
If there is nothing to do, respond with {{\"actions\": []}}"
    )
}

/// Entries that do not match a known action shape are dropped one by one.
fn parse_actions(raw: &str) -> Result<Vec<ActionIntent>, Error> {
    let parsed: ActionsJson = parse_strict(raw)?;
    Ok(parsed
        .actions
        .into_iter()
        .filter_map(|v| serde_json::from_value::<IntentJson>(v).ok())
        .filter(|i| i.confidence.is_finite())
        .map(|i| ActionIntent {
            kind: i.kind,
            confidence: i.confidence.clamp(0.0, 1.0),
        })
        .collect())
}

fn keyword_fallback(latest_response: &str, ctx: &ActionContext<'_>) -> Vec<ActionIntent> {
    let lower = latest_response.to_lowercase();
    if !TASK_PHRASES.iter().any(|p| lower.contains(p)) {
        return Vec::new();
    }
    let title: String = ctx.trigger.chars().take(100).collect();
    vec![ActionIntent {
        kind: ActionKind::Task {
            title: format!("Ticket: {title}"),
            description: Some(format!("Channel {}, user {}", ctx.channel_id, ctx.counterpart_id)),
            priority: TaskPriority::Normal,
        },
        confidence: FALLBACK_CONFIDENCE,
    }]
}
