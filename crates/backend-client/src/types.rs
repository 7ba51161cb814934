//! Wire types of the support backend API.
//!
//! Field names are `camelCase` on the wire.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tp_domain::conversation::TaskPriority;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    /// Platform user id, used to mention the member.
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default = "d_true")]
    pub available: bool,
}

fn d_true() -> bool {
    true
}

/// One message of a channel's platform history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_staff: bool,
    pub at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sinks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /api/tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub tenant_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_ticket_id: Option<String>,
}

/// POST /api/reminders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    pub tenant_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub content: String,
    pub trigger_at: DateTime<Utc>,
    pub source_id: String,
}

/// POST /api/memories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRequest {
    pub tenant_id: String,
    pub user_id: String,
    pub content: String,
    pub importance: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationLevel {
    #[default]
    Normal,
    High,
}

impl EscalationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationLevel::Normal => "normal",
            EscalationLevel::High => "high",
        }
    }
}

/// POST /api/escalations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRequest {
    pub ticket_id: String,
    pub channel_id: String,
    pub tenant_id: String,
    pub level: EscalationLevel,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

/// Final cost of a closed ticket. POST /api/ticket-costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketCostRecord {
    pub ticket_id: String,
    pub channel_id: String,
    pub tenant_id: String,
    pub total_cost: f64,
    pub total_calls: u64,
    pub models_used: Vec<String>,
}

/// Spend aggregates of one budget window. POST /api/day-summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummaryRecord {
    pub date: NaiveDate,
    pub total_spend: f64,
    pub total_requests: u64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    pub total_cached: u64,
    pub avg_cost_per_ticket: f64,
    pub by_model: HashMap<String, ModelSpend>,
    pub by_task_type: HashMap<String, TaskSpend>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpend {
    pub requests: u64,
    pub cost: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpend {
    pub requests: u64,
    pub cost: f64,
}

/// POST /api/channels/{channelId}/rename
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub channel_id: String,
    pub tenant_id: String,
    pub new_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_member_defaults_to_available() {
        let m: TeamMember =
            serde_json::from_str(r#"{"userId":"42","name":"Ana","specialties":["developer"]}"#)
                .unwrap();
        assert!(m.available);
        assert_eq!(m.specialties, vec!["developer"]);
    }

    #[test]
    fn escalation_omits_empty_optionals() {
        let req = EscalationRequest {
            ticket_id: "7".into(),
            channel_id: "c".into(),
            tenant_id: "g".into(),
            level: EscalationLevel::High,
            reason: "refund".into(),
            specialty: None,
            assignee_id: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["level"], "high");
        assert_eq!(json["ticketId"], "7");
        assert!(json.get("specialty").is_none());
    }

    #[test]
    fn history_message_parses_camel_case() {
        let m: HistoryMessage = serde_json::from_str(
            r#"{"authorId":"u","content":"hi","isStaff":true,"at":"2026-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert!(m.is_staff);
        assert!(!m.is_bot);
    }
}
