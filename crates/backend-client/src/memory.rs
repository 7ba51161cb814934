//! In-memory [`SupportBackend`]: seeded reads, recorded sink calls.
//!
//! Used by tests and by `ticketpilot serve` when `[backend]` is disabled.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tp_domain::conversation::{KnowledgeItem, Memory};
use tp_domain::error::{Error, Result};

use crate::backend::SupportBackend;
use crate::types::{
    DaySummaryRecord, EscalationRequest, HistoryMessage, MemoryRequest, ReminderRequest,
    RenameRequest, TaskRequest, TeamMember, TicketCostRecord,
};

/// Every write the orchestrator made, in call order per sink.
#[derive(Debug, Clone, Default)]
pub struct SinkLog {
    pub tasks: Vec<TaskRequest>,
    pub reminders: Vec<ReminderRequest>,
    pub memories: Vec<MemoryRequest>,
    pub escalations: Vec<EscalationRequest>,
    pub ticket_costs: Vec<TicketCostRecord>,
    pub day_summaries: Vec<DaySummaryRecord>,
    pub renames: Vec<RenameRequest>,
}

#[derive(Default)]
struct Seed {
    knowledge: HashMap<String, Vec<KnowledgeItem>>,
    team: HashMap<String, Vec<TeamMember>>,
    memories: HashMap<(String, String), Vec<Memory>>,
    history: HashMap<String, Vec<HistoryMessage>>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    seed: Mutex<Seed>,
    log: Mutex<SinkLog>,
    knowledge_reads: Mutex<u32>,
    failing: Mutex<bool>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_knowledge(self, tenant_id: &str, items: Vec<KnowledgeItem>) -> Self {
        self.seed.lock().knowledge.insert(tenant_id.to_owned(), items);
        self
    }

    pub fn with_team(self, tenant_id: &str, members: Vec<TeamMember>) -> Self {
        self.seed.lock().team.insert(tenant_id.to_owned(), members);
        self
    }

    pub fn with_memories(self, tenant_id: &str, counterpart_id: &str, memories: Vec<Memory>) -> Self {
        self.seed
            .lock()
            .memories
            .insert((tenant_id.to_owned(), counterpart_id.to_owned()), memories);
        self
    }

    pub fn with_history(self, channel_id: &str, messages: Vec<HistoryMessage>) -> Self {
        self.seed.lock().history.insert(channel_id.to_owned(), messages);
        self
    }

    /// Make every call fail with a backend error from now on.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn log(&self) -> SinkLog {
        self.log.lock().clone()
    }

    pub fn knowledge_reads(&self) -> u32 {
        *self.knowledge_reads.lock()
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock() {
            Err(Error::Backend("in-memory backend set to fail".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SupportBackend for InMemoryBackend {
    async fn query_knowledge(&self, tenant_id: &str) -> Result<Vec<KnowledgeItem>> {
        *self.knowledge_reads.lock() += 1;
        self.check()?;
        Ok(self.seed.lock().knowledge.get(tenant_id).cloned().unwrap_or_default())
    }

    async fn query_team_members(
        &self,
        tenant_id: &str,
        specialty: Option<&str>,
        available_only: bool,
    ) -> Result<Vec<TeamMember>> {
        self.check()?;
        let seed = self.seed.lock();
        let members = seed.team.get(tenant_id).map(Vec::as_slice).unwrap_or_default();
        Ok(members
            .iter()
            .filter(|m| !available_only || m.available)
            .filter(|m| specialty.map_or(true, |s| m.specialties.iter().any(|x| x == s)))
            .cloned()
            .collect())
    }

    async fn query_user_history(&self, tenant_id: &str, counterpart_id: &str) -> Result<Vec<Memory>> {
        self.check()?;
        let key = (tenant_id.to_owned(), counterpart_id.to_owned());
        Ok(self.seed.lock().memories.get(&key).cloned().unwrap_or_default())
    }

    async fn channel_history(&self, channel_id: &str, limit: usize) -> Result<Vec<HistoryMessage>> {
        self.check()?;
        let seed = self.seed.lock();
        let all = seed.history.get(channel_id).map(Vec::as_slice).unwrap_or_default();
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn create_task(&self, req: TaskRequest) -> Result<()> {
        self.check()?;
        self.log.lock().tasks.push(req);
        Ok(())
    }

    async fn create_reminder(&self, req: ReminderRequest) -> Result<()> {
        self.check()?;
        self.log.lock().reminders.push(req);
        Ok(())
    }

    async fn create_memory(&self, req: MemoryRequest) -> Result<()> {
        self.check()?;
        self.log.lock().memories.push(req);
        Ok(())
    }

    async fn escalate(&self, req: EscalationRequest) -> Result<()> {
        self.check()?;
        self.log.lock().escalations.push(req);
        Ok(())
    }

    async fn save_ticket_cost(&self, record: TicketCostRecord) -> Result<()> {
        self.check()?;
        self.log.lock().ticket_costs.push(record);
        Ok(())
    }

    async fn save_day_summary(&self, record: DaySummaryRecord) -> Result<()> {
        self.check()?;
        self.log.lock().day_summaries.push(record);
        Ok(())
    }

    async fn rename_ticket(&self, req: RenameRequest) -> Result<()> {
        self.check()?;
        self.log.lock().renames.push(req);
        Ok(())
    }
}
