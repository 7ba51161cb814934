use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tp_domain::conversation::{
    ChatMessage, Language, Role, SentimentSample, TicketCategory,
};

use crate::sentiment::{self, SentimentTemperature};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Escalation record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Association between a conversation and the human who took it over.
///
/// Exists exactly while the conversation is escalated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// Staff member who owns the ticket. `None` until someone is assigned
    /// or speaks in the channel.
    pub assignee_id: Option<String>,
    pub escalated_at: DateTime<Utc>,
    /// Confidence the agent had when it handed over.
    pub confidence_at_escalation: f32,
    pub last_staff_at: Option<DateTime<Utc>>,
    pub last_counterpart_at: Option<DateTime<Utc>>,
    /// Last staff reminder or failed resume check; both share one cooldown.
    pub last_reminder_at: Option<DateTime<Utc>>,
}

impl EscalationRecord {
    pub fn new(assignee_id: Option<String>, at: DateTime<Utc>, confidence: f32) -> Self {
        Self {
            assignee_id,
            escalated_at: at,
            confidence_at_escalation: confidence,
            last_staff_at: None,
            last_counterpart_at: None,
            last_reminder_at: None,
        }
    }

    /// Most recent human activity, falling back to the hand-over itself.
    pub fn last_human_activity(&self) -> DateTime<Utc> {
        self.last_staff_at.unwrap_or(self.escalated_at)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identity of a new conversation.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub channel_id: String,
    pub ticket_id: String,
    pub tenant_id: String,
    pub counterpart_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub channel_id: String,
    pub ticket_id: String,
    /// Guild / workspace the ticket belongs to.
    pub tenant_id: String,
    pub counterpart_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub messages: Vec<ChatMessage>,
    pub category: TicketCategory,
    pub confidence: f32,
    pub exchange_count: u32,
    #[serde(default)]
    pub escalation: Option<EscalationRecord>,

    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub memories: Vec<String>,
    /// Proactive hints appended to the dynamic part of the prompt.
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub sentiments: Vec<SentimentSample>,
    #[serde(default)]
    pub language: Language,

    /// Ticket opened without a subject: the first counterpart message
    /// becomes the subject.
    #[serde(default)]
    pub awaiting_subject: bool,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub last_ping_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub renamed: bool,
}

impl Conversation {
    pub fn new(init: NewConversation, now: DateTime<Utc>) -> Self {
        Self {
            channel_id: init.channel_id,
            ticket_id: init.ticket_id,
            tenant_id: init.tenant_id,
            counterpart_id: init.counterpart_id,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            category: TicketCategory::default(),
            confidence: 1.0,
            exchange_count: 0,
            escalation: None,
            system_prompt: None,
            memories: Vec::new(),
            hints: Vec::new(),
            sentiments: Vec::new(),
            language: Language::default(),
            awaiting_subject: false,
            subject: None,
            last_ping_at: None,
            renamed: false,
        }
    }

    pub fn is_escalated(&self) -> bool {
        self.escalation.is_some()
    }

    /// Append a message, keeping at most `max_history`. Counterpart
    /// messages count as one exchange.
    pub fn push_message(&mut self, message: ChatMessage, max_history: usize) {
        if message.role == Role::Counterpart {
            self.exchange_count += 1;
        }
        self.updated_at = self.updated_at.max(message.at);
        self.messages.push(message);
        if self.messages.len() > max_history {
            let excess = self.messages.len() - max_history;
            self.messages.drain(..excess);
        }
    }

    pub fn set_classification(&mut self, category: TicketCategory, confidence: f32) {
        self.category = category;
        self.confidence = confidence.clamp(0.0, 1.0);
    }

    pub fn reduce_confidence(&mut self, amount: f32) {
        self.confidence = (self.confidence - amount).max(0.0);
    }

    pub fn mark_escalated(&mut self, assignee_id: Option<String>, at: DateTime<Utc>) {
        match self.escalation {
            Some(ref mut record) => {
                if record.assignee_id.is_none() {
                    record.assignee_id = assignee_id;
                }
            }
            None => {
                self.escalation = Some(EscalationRecord::new(assignee_id, at, self.confidence));
            }
        }
    }

    pub fn clear_escalation(&mut self) -> Option<EscalationRecord> {
        self.escalation.take()
    }

    pub fn push_sentiment(&mut self, sample: SentimentSample) {
        self.sentiments.push(sample);
    }

    pub fn sentiment_temperature(&self) -> Option<SentimentTemperature> {
        sentiment::temperature(&self.sentiments)
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            channel_id: self.channel_id.clone(),
            tenant_id: self.tenant_id.clone(),
            category: self.category,
            confidence: self.confidence,
            exchange_count: self.exchange_count,
            escalated: self.is_escalated(),
            assignee_id: self
                .escalation
                .as_ref()
                .and_then(|e| e.assignee_id.clone()),
            language: self.language,
            awaiting_subject: self.awaiting_subject,
            sentiment: self.sentiment_temperature(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only view served by `GET /v1/conversations`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub channel_id: String,
    pub tenant_id: String,
    pub category: TicketCategory,
    pub confidence: f32,
    pub exchange_count: u32,
    pub escalated: bool,
    pub assignee_id: Option<String>,
    pub language: Language,
    pub awaiting_subject: bool,
    pub sentiment: Option<SentimentTemperature>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
