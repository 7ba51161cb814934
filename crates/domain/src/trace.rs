use serde::Serialize;

/// Structured trace events emitted across all TicketPilot crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        task_type: String,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
        cached_tokens: Option<u32>,
    },
    LlmFallback {
        task_type: String,
        from_model: String,
        to_model: String,
        reason: String,
    },
    BudgetCharged {
        model: String,
        task_type: String,
        ticket_id: Option<String>,
        cost_usd: f64,
        spent_usd: f64,
        limit_usd: f64,
    },
    BudgetAlert {
        level: String,
        spent_usd: f64,
        limit_usd: f64,
        percent: f64,
    },
    BudgetRollover {
        previous_date: String,
        new_date: String,
        spent_usd: f64,
        requests: u64,
    },
    TicketCostClosed {
        ticket_id: String,
        total_cost_usd: f64,
        total_calls: u64,
        models_used: Vec<String>,
    },
    ConversationCreated {
        channel_id: String,
        awaiting_subject: bool,
    },
    ConversationRecovered {
        channel_id: String,
        backfilled: usize,
        category: String,
    },
    ConversationClassified {
        channel_id: String,
        category: String,
        confidence: f32,
    },
    Escalated {
        channel_id: String,
        trigger: String,
        exchange_count: u32,
        confidence: f32,
    },
    Resumed {
        channel_id: String,
        idle_secs: i64,
    },
    StaffReminded {
        channel_id: String,
        staff_id: String,
    },
    PingSuppressed {
        channel_id: String,
    },
    CloseIntent {
        channel_id: String,
        source: String,
    },
    ActionDispatched {
        channel_id: String,
        action: String,
        confidence: f32,
    },
    SinkFailed {
        sink: String,
        channel_id: Option<String>,
        error: String,
    },
    BackendCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tp_event");
    }
}
