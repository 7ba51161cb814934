use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Knowledge cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// How long a tenant's snippets are served before refetching.
    #[serde(default = "d_300")]
    pub ttl_secs: u64,
    /// Character cap on the knowledge section of a system prompt.
    #[serde(default = "d_6000")]
    pub max_chars: usize,
    /// Character cap on memories and hints together.
    #[serde(default = "d_2000")]
    pub dynamic_max_chars: usize,
    /// Interval of the background sweep that drops expired tenants.
    #[serde(default = "d_600")]
    pub evict_interval_secs: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: d_300(),
            max_chars: d_6000(),
            dynamic_max_chars: d_2000(),
            evict_interval_secs: d_600(),
        }
    }
}

fn d_300() -> u64 {
    300
}
fn d_600() -> u64 {
    600
}
fn d_2000() -> usize {
    2000
}
fn d_6000() -> usize {
    6000
}
