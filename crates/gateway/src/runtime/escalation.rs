//! Escalation and resumption rules.
//!
//! Everything here is a pure decision over the conversation and the
//! `[policy]` thresholds, except [`resume_check`] which asks the model.

use chrono::{DateTime, Utc};

use tp_backend::EscalationLevel;
use tp_conversations::{Conversation, EscalationRecord};
use tp_domain::config::PolicyConfig;
use tp_domain::conversation::TicketCategory;

use crate::runtime::governed::GovernedClient;

/// Why control passed to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationTrigger {
    /// A staff member wrote in the ticket.
    StaffMessage,
    /// The counterpart asked for a human, a manager or a refund.
    Requested,
    /// Too many exchanges without gaining confidence.
    ExchangeCeiling,
    LowConfidence,
    /// The reply envelope asked for a hand-off.
    ModelFlagged,
    /// An extracted escalate action.
    Action,
}

impl EscalationTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationTrigger::StaffMessage => "staff_message",
            EscalationTrigger::Requested => "requested",
            EscalationTrigger::ExchangeCeiling => "exchange_ceiling",
            EscalationTrigger::LowConfidence => "low_confidence",
            EscalationTrigger::ModelFlagged => "model_flagged",
            EscalationTrigger::Action => "action",
        }
    }
}

/// Checks run before a reply: an explicit request, or the exchange ceiling
/// reached while confidence stays low.
pub fn pre_reply_trigger(
    policy: &PolicyConfig,
    wants_human: bool,
    exchange_count: u32,
    confidence: f32,
) -> Option<EscalationTrigger> {
    if wants_human {
        return Some(EscalationTrigger::Requested);
    }
    if exchange_count >= policy.escalation_exchange_ceiling
        && confidence < policy.escalation_ceiling_confidence
    {
        return Some(EscalationTrigger::ExchangeCeiling);
    }
    None
}

/// Checked after sentiment has had its chance to lower confidence.
pub fn low_confidence_trigger(
    policy: &PolicyConfig,
    exchange_count: u32,
    confidence: f32,
) -> Option<EscalationTrigger> {
    (confidence < policy.low_confidence_floor
        && exchange_count >= policy.low_confidence_min_exchanges)
        .then_some(EscalationTrigger::LowConfidence)
}

pub fn level(urgent: bool) -> EscalationLevel {
    if urgent {
        EscalationLevel::High
    } else {
        EscalationLevel::Normal
    }
}

/// Explicit specialty wins over the category default.
pub fn specialty(category: TicketCategory, requested: Option<&str>) -> Option<String> {
    requested
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .or_else(|| category.escalation_specialty().map(str::to_owned))
}

pub fn default_reason(category: TicketCategory, exchange_count: u32) -> String {
    format!("AI escalation: {category} - exchange #{exchange_count}")
}

/// What to do with a counterpart message while escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalatedStep {
    /// The human is still active; say nothing.
    StayQuiet,
    /// The human went idle; ask whether the agent can take over again.
    TryResume { idle_secs: i64 },
}

pub fn escalated_step(
    policy: &PolicyConfig,
    record: &EscalationRecord,
    now: DateTime<Utc>,
) -> EscalatedStep {
    let idle_secs = (now - record.last_human_activity()).num_seconds();
    if idle_secs > policy.resume_inactivity_secs {
        EscalatedStep::TryResume { idle_secs }
    } else {
        EscalatedStep::StayQuiet
    }
}

pub fn reminder_due(policy: &PolicyConfig, record: &EscalationRecord, now: DateTime<Utc>) -> bool {
    match record.last_reminder_at {
        None => true,
        Some(at) => (now - at).num_seconds() >= policy.staff_reminder_cooldown_secs,
    }
}

pub const RESUME_LABELS: [&str; 2] = ["can_handle", "needs_human"];

pub fn resume_context(category: TicketCategory) -> String {
    format!(
        "The AI was handling a {category} ticket and staff took over. The user sent a new message. \
         Can the AI resume handling this or does it still need human attention?"
    )
}

/// Both resume conditions: confidence before the hand-off was high, and the
/// model is very sure it can handle the new message. Any model failure
/// keeps the human in charge.
pub async fn resume_check(
    llm: &GovernedClient,
    policy: &PolicyConfig,
    conv: &Conversation,
    text: &str,
) -> bool {
    let prior = conv
        .escalation
        .as_ref()
        .map(|r| r.confidence_at_escalation)
        .unwrap_or(conv.confidence);
    if prior < policy.resume_min_prior_confidence {
        return false;
    }

    let context = resume_context(conv.category);
    match llm
        .classify_text(text, &RESUME_LABELS, Some(&context), Some(&conv.ticket_id))
        .await
    {
        Ok(c) => c.category == "can_handle" && c.confidence >= policy.resume_min_classifier_confidence,
        Err(e) => {
            tracing::debug!(channel_id = %conv.channel_id, error = %e, "resume check failed");
            false
        }
    }
}
