use std::sync::Arc;

use tp_conversations::ConversationStore;
use tp_domain::config::Config;

use crate::runtime::conversation_lock::ConversationLockMap;
use crate::runtime::governed::GovernedClient;
use crate::runtime::knowledge::KnowledgeCache;
use crate::runtime::Orchestrator;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, orchestrator, governed LLM client
/// - **Conversations**: context store, per-channel locks, knowledge cache
/// - **Security**: bearer-token digest
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    /// Also owns the budget governor served by `GET /v1/budget`.
    pub llm: Arc<GovernedClient>,

    // ── Conversations ─────────────────────────────────────────────────
    pub conversations: Arc<ConversationStore>,
    pub locks: Arc<ConversationLockMap>,
    pub knowledge: Arc<KnowledgeCache>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
