use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Support backend (knowledge, team directory, sinks)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Off: reads come back empty and sink writes are only kept in memory.
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Direct API key. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_5000")]
    pub timeout_ms: u64,
    /// Extra attempts after the first on 5xx or transport errors.
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            base_url: d_base_url(),
            api_key: None,
            api_key_env: d_api_key_env(),
            timeout_ms: d_5000(),
            max_retries: d_2(),
        }
    }
}

impl BackendConfig {
    /// Key from config, else from the configured env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

fn d_true() -> bool {
    true
}
fn d_base_url() -> String {
    "http://127.0.0.1:3400".into()
}
fn d_api_key_env() -> String {
    "TP_BACKEND_TOKEN".into()
}
fn d_5000() -> u64 {
    5000
}
fn d_2() -> u32 {
    2
}
