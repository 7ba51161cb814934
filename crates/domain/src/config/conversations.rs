use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationsConfig {
    /// When set, the store is written here as JSON on shutdown and reloaded
    /// at startup. Unset = purely in-memory.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Interval of the sweep that drops idle per-conversation locks.
    #[serde(default = "d_300")]
    pub lock_prune_interval_secs: u64,
}

impl Default for ConversationsConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            lock_prune_interval_secs: d_300(),
        }
    }
}

fn d_300() -> u64 {
    300
}
