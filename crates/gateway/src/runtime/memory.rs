//! Long-term memories about a counterpart: retrieval for prompts and
//! derivation when a ticket closes.

use std::sync::Arc;

use serde::Deserialize;

use tp_backend::{MemoryRequest, SupportBackend};
use tp_domain::conversation::{ChatMessage, Role, TaskType};

use crate::runtime::dispatch::best_effort;
use crate::runtime::governed::GovernedClient;
use crate::runtime::reply::parse_strict;

const RETRIEVE_LIMIT: usize = 5;
const MIN_MESSAGES: usize = 4;
const EXTRACTION_WINDOW: usize = 8;
const MAX_DERIVED: usize = 3;

#[derive(Deserialize)]
struct ExtractionJson {
    #[serde(default)]
    memories: Vec<FactJson>,
}

#[derive(Deserialize)]
struct FactJson {
    content: String,
    #[serde(default = "d_importance")]
    importance: i64,
}

fn d_importance() -> i64 {
    5
}

pub struct MemoryService {
    backend: Arc<dyn SupportBackend>,
    llm: Arc<GovernedClient>,
}

impl MemoryService {
    pub fn new(backend: Arc<dyn SupportBackend>, llm: Arc<GovernedClient>) -> Self {
        Self { backend, llm }
    }

    /// The most important memories, rendered one per line. A backend
    /// failure yields none.
    pub async fn retrieve(&self, tenant_id: &str, counterpart_id: &str) -> Vec<String> {
        let mut memories = match self.backend.query_user_history(tenant_id, counterpart_id).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(tenant_id, counterpart_id, error = %e, "memory retrieval failed");
                return Vec::new();
            }
        };
        memories.sort_by(|a, b| b.importance.cmp(&a.importance));
        memories
            .into_iter()
            .take(RETRIEVE_LIMIT)
            .map(|m| m.content)
            .collect()
    }

    /// Extract up to three facts from the end of a closed conversation and
    /// write them through the memory sink. Returns how many were written.
    pub async fn derive(
        &self,
        tenant_id: &str,
        counterpart_id: &str,
        channel_id: &str,
        ticket_id: &str,
        messages: &[ChatMessage],
    ) -> usize {
        if messages.len() < MIN_MESSAGES {
            tracing::debug!(channel_id, "conversation too short for memories");
            return 0;
        }

        let start = messages.len().saturating_sub(EXTRACTION_WINDOW);
        let transcript = messages[start..]
            .iter()
            .map(|m| {
                let who = match m.role {
                    Role::Counterpart => "Client",
                    Role::Agent => "Staff",
                };
                format!("{who}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Analyze this support conversation and list long-term facts about the client \
             (preferences, habits, tone), not about the issue itself.\n\
             Respond ONLY with JSON: {{\"memories\":[{{\"content\":\"...\",\"importance\":1-10}}]}}\n\n{transcript}"
        );

        let raw = match self
            .llm
            .complete_json(
                TaskType::MemoryExtraction,
                "You extract facts. Respond only with valid JSON.",
                prompt,
                Some(ticket_id),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(channel_id, error = %e, "memory extraction failed");
                return 0;
            }
        };
        let parsed: ExtractionJson = match parse_strict(&raw) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(channel_id, error = %e, "memory extraction answer rejected");
                return 0;
            }
        };

        let mut written = 0;
        for fact in parsed
            .memories
            .into_iter()
            .filter(|f| !f.content.trim().is_empty())
            .take(MAX_DERIVED)
        {
            let req = MemoryRequest {
                tenant_id: tenant_id.to_owned(),
                user_id: counterpart_id.to_owned(),
                content: fact.content.trim().to_owned(),
                importance: fact.importance.clamp(1, 10) as u8,
            };
            if best_effort("create_memory", Some(channel_id), self.backend.create_memory(req))
                .await
                .is_some()
            {
                written += 1;
            }
        }
        written
    }
}
