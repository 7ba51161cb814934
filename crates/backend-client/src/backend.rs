//! The `SupportBackend` trait: everything the orchestrator reads from or
//! writes to the outside world, apart from the language model.

use async_trait::async_trait;
use tp_domain::conversation::{KnowledgeItem, Memory};
use tp_domain::error::Result;

use crate::types::{
    DaySummaryRecord, EscalationRequest, HistoryMessage, MemoryRequest, ReminderRequest,
    RenameRequest, TaskRequest, TeamMember, TicketCostRecord,
};

/// Abstraction over the support backend.
///
/// Implementations may talk to the real REST API or be an in-memory test
/// double. Write methods are sinks: the orchestrator logs their failures
/// and carries on.
#[async_trait]
pub trait SupportBackend: Send + Sync {
    // ── reads ────────────────────────────────────────────────────────

    /// Instruction / FAQ snippets of a tenant.
    async fn query_knowledge(&self, tenant_id: &str) -> Result<Vec<KnowledgeItem>>;

    async fn query_team_members(
        &self,
        tenant_id: &str,
        specialty: Option<&str>,
        available_only: bool,
    ) -> Result<Vec<TeamMember>>;

    /// Long-term memories stored about a counterpart.
    async fn query_user_history(
        &self,
        tenant_id: &str,
        counterpart_id: &str,
    ) -> Result<Vec<Memory>>;

    /// Most recent channel messages, oldest first.
    async fn channel_history(&self, channel_id: &str, limit: usize)
        -> Result<Vec<HistoryMessage>>;

    // ── sinks ────────────────────────────────────────────────────────

    async fn create_task(&self, req: TaskRequest) -> Result<()>;

    async fn create_reminder(&self, req: ReminderRequest) -> Result<()>;

    async fn create_memory(&self, req: MemoryRequest) -> Result<()>;

    async fn escalate(&self, req: EscalationRequest) -> Result<()>;

    async fn save_ticket_cost(&self, record: TicketCostRecord) -> Result<()>;

    async fn save_day_summary(&self, record: DaySummaryRecord) -> Result<()>;

    async fn rename_ticket(&self, req: RenameRequest) -> Result<()>;
}
