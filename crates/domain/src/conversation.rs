//! Value types shared by the orchestrator, the providers and the backend
//! client: message roles, ticket categories, languages, sentiment, task
//! types, knowledge snippets, memories and action intents.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Who authored a message in a ticket conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The customer / ticket opener.
    Counterpart,
    /// The automated agent.
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn counterpart(content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            role: Role::Counterpart,
            content: content.into(),
            at,
        }
    }

    pub fn agent(content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            at,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ticket category
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    ServiceInquiry,
    BugReport,
    RoleRequest,
    Partnership,
    #[default]
    GeneralSupport,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 5] = [
        TicketCategory::ServiceInquiry,
        TicketCategory::BugReport,
        TicketCategory::RoleRequest,
        TicketCategory::Partnership,
        TicketCategory::GeneralSupport,
    ];

    /// The narrower label set used when rebuilding context after a restart.
    pub const RECOVERY: [TicketCategory; 3] = [
        TicketCategory::ServiceInquiry,
        TicketCategory::BugReport,
        TicketCategory::GeneralSupport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TicketCategory::ServiceInquiry => "service_inquiry",
            TicketCategory::BugReport => "bug_report",
            TicketCategory::RoleRequest => "role_request",
            TicketCategory::Partnership => "partnership",
            TicketCategory::GeneralSupport => "general_support",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label.trim()))
    }

    /// Team specialty that owns escalations for this category, if any.
    pub fn escalation_specialty(self) -> Option<&'static str> {
        match self {
            TicketCategory::BugReport => Some("developer"),
            TicketCategory::Partnership => Some("manager"),
            _ => None,
        }
    }
}

impl fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Language
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
    Es,
    De,
    Pt,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::De => "de",
            Language::Pt => "pt",
        }
    }

    /// English name, used inside prompts ("Language for 'response': French").
    pub fn display_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Fr => "French",
            Language::Es => "Spanish",
            Language::De => "German",
            Language::Pt => "Portuguese",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sentiment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
    Frustrated,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
            Sentiment::Frustrated => "frustrated",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            "frustrated" => Some(Sentiment::Frustrated),
            _ => None,
        }
    }
}

/// One sentiment reading of a counterpart message. Never edited once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSample {
    pub sentiment: Sentiment,
    /// 0.0 = very negative, 0.5 = neutral, 1.0 = very positive.
    pub score: f32,
    pub at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task type (routing key)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Classification,
    Sentiment,
    QuickResponse,
    Conversation,
    ComplexAnalysis,
    Summary,
    ActionDetection,
    MemoryExtraction,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::Classification,
        TaskType::Sentiment,
        TaskType::QuickResponse,
        TaskType::Conversation,
        TaskType::ComplexAnalysis,
        TaskType::Summary,
        TaskType::ActionDetection,
        TaskType::MemoryExtraction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Sentiment => "sentiment",
            TaskType::QuickResponse => "quick_response",
            TaskType::Conversation => "conversation",
            TaskType::ComplexAnalysis => "complex_analysis",
            TaskType::Summary => "summary",
            TaskType::ActionDetection => "action_detection",
            TaskType::MemoryExtraction => "memory_extraction",
        }
    }

    /// Pick the reply task type for a ticket at a given exchange.
    ///
    /// First exchanges of simple tickets get a quick response; partnership
    /// tickets and bug reports past the second exchange need the heavier
    /// analysis route; everything else is regular conversation.
    pub fn for_reply(category: TicketCategory, exchange_count: u32) -> Self {
        let heavy = matches!(
            category,
            TicketCategory::Partnership | TicketCategory::BugReport
        );
        if exchange_count <= 1 && !heavy {
            return TaskType::QuickResponse;
        }
        if category == TicketCategory::Partnership
            || (category == TicketCategory::BugReport && exchange_count > 2)
        {
            return TaskType::ComplexAnalysis;
        }
        TaskType::Conversation
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Knowledge and memories
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One instruction/FAQ snippet of a tenant's knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub category: String,
    pub key: String,
    pub value: String,
}

/// A long-term fact about a counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub content: String,
    /// 1 (trivia) to 10 (critical).
    pub importance: u8,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Action intents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A side effect requested by a generated reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Task {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        priority: TaskPriority,
    },
    Reminder {
        content: String,
        delay_ms: u64,
    },
    Escalate {
        reason: String,
        #[serde(default)]
        specialty: Option<String>,
    },
    Close {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Task { .. } => "task",
            ActionKind::Reminder { .. } => "reminder",
            ActionKind::Escalate { .. } => "escalate",
            ActionKind::Close { .. } => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionIntent {
    pub kind: ActionKind,
    pub confidence: f32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_parse_case_insensitively() {
        assert_eq!(
            TicketCategory::from_label(" Bug_Report "),
            Some(TicketCategory::BugReport)
        );
        assert_eq!(TicketCategory::from_label("weather"), None);
    }

    #[test]
    fn first_exchange_of_simple_ticket_is_quick() {
        assert_eq!(
            TaskType::for_reply(TicketCategory::ServiceInquiry, 1),
            TaskType::QuickResponse
        );
        assert_eq!(
            TaskType::for_reply(TicketCategory::GeneralSupport, 0),
            TaskType::QuickResponse
        );
    }

    #[test]
    fn partnership_is_always_complex() {
        assert_eq!(
            TaskType::for_reply(TicketCategory::Partnership, 1),
            TaskType::ComplexAnalysis
        );
        assert_eq!(
            TaskType::for_reply(TicketCategory::Partnership, 7),
            TaskType::ComplexAnalysis
        );
    }

    #[test]
    fn bug_report_turns_complex_after_second_exchange() {
        assert_eq!(
            TaskType::for_reply(TicketCategory::BugReport, 1),
            TaskType::Conversation
        );
        assert_eq!(
            TaskType::for_reply(TicketCategory::BugReport, 2),
            TaskType::Conversation
        );
        assert_eq!(
            TaskType::for_reply(TicketCategory::BugReport, 3),
            TaskType::ComplexAnalysis
        );
    }

    #[test]
    fn escalation_specialty_by_category() {
        assert_eq!(
            TicketCategory::BugReport.escalation_specialty(),
            Some("developer")
        );
        assert_eq!(
            TicketCategory::Partnership.escalation_specialty(),
            Some("manager")
        );
        assert_eq!(TicketCategory::GeneralSupport.escalation_specialty(), None);
    }

    #[test]
    fn action_kind_uses_type_tag() {
        let json = r#"{"type":"reminder","content":"check logs","delay_ms":3600000}"#;
        let kind: ActionKind = serde_json::from_str(json).unwrap();
        assert_eq!(
            kind,
            ActionKind::Reminder {
                content: "check logs".into(),
                delay_ms: 3_600_000
            }
        );
        assert_eq!(kind.name(), "reminder");
    }
}
