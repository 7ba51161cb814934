use serde::{Deserialize, Serialize};

use crate::conversation::TaskType;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-task model waterfall plus sampling parameters and rate ceilings.
///
/// Each task gets its own table (`[routing.conversation]`, ...) so that
/// swapping models never touches code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// How long a model stays banned after the provider answered 429.
    #[serde(default = "d_60")]
    pub rate_limit_ban_secs: u64,
    #[serde(default = "d_classification")]
    pub classification: TaskRoute,
    #[serde(default = "d_sentiment")]
    pub sentiment: TaskRoute,
    #[serde(default = "d_quick_response")]
    pub quick_response: TaskRoute,
    #[serde(default = "d_conversation")]
    pub conversation: TaskRoute,
    #[serde(default = "d_complex_analysis")]
    pub complex_analysis: TaskRoute,
    #[serde(default = "d_summary")]
    pub summary: TaskRoute,
    #[serde(default = "d_action_detection")]
    pub action_detection: TaskRoute,
    #[serde(default = "d_memory_extraction")]
    pub memory_extraction: TaskRoute,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            rate_limit_ban_secs: d_60(),
            classification: d_classification(),
            sentiment: d_sentiment(),
            quick_response: d_quick_response(),
            conversation: d_conversation(),
            complex_analysis: d_complex_analysis(),
            summary: d_summary(),
            action_detection: d_action_detection(),
            memory_extraction: d_memory_extraction(),
        }
    }
}

impl RoutingConfig {
    pub fn route(&self, task: TaskType) -> &TaskRoute {
        match task {
            TaskType::Classification => &self.classification,
            TaskType::Sentiment => &self.sentiment,
            TaskType::QuickResponse => &self.quick_response,
            TaskType::Conversation => &self.conversation,
            TaskType::ComplexAnalysis => &self.complex_analysis,
            TaskType::Summary => &self.summary,
            TaskType::ActionDetection => &self.action_detection,
            TaskType::MemoryExtraction => &self.memory_extraction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRoute {
    /// Ordered preference list; the first usable model wins.
    pub models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Requests per minute, per model.
    #[serde(default = "d_rpm")]
    pub rpm: u32,
    /// Requests per day, per model.
    #[serde(default = "d_rpd")]
    pub rpd: u32,
}

// ── default waterfalls ──────────────────────────────────────────────

const HERMES_405B: &str = "nousresearch/hermes-3-llama-3.1-405b:free";
const GPT_OSS_120B: &str = "openai/gpt-oss-120b:free";
const QWEN3_NEXT: &str = "qwen/qwen3-next-80b-a3b-instruct:free";
const LLAMA_33_70B: &str = "meta-llama/llama-3.3-70b-instruct:free";
const QWEN3_CODER: &str = "qwen/qwen3-coder:free";
const GLM_45_AIR: &str = "z-ai/glm-4.5-air:free";
const TRINITY_LARGE: &str = "arcee-ai/trinity-large-preview:free";
const TRINITY_MINI: &str = "arcee-ai/trinity-mini:free";
const FLASH_LITE_PREVIEW: &str = "google/gemini-2.5-flash-lite-preview";
const LLAMA_31_8B: &str = "meta-llama/llama-3.1-8b-instruct";
const GEMINI_FLASH: &str = "google/gemini-2.5-flash";
const DEEPSEEK_V32: &str = "deepseek/deepseek-v3.2";

fn models(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn route(ids: &[&str], temperature: f32, max_tokens: u32, rpm: u32, rpd: u32) -> TaskRoute {
    TaskRoute {
        models: models(ids),
        temperature,
        max_tokens,
        rpm,
        rpd,
    }
}

/// Every model, free tier first.
const POOL_ANY: &[&str] = &[
    HERMES_405B,
    GPT_OSS_120B,
    QWEN3_NEXT,
    LLAMA_33_70B,
    QWEN3_CODER,
    GLM_45_AIR,
    TRINITY_LARGE,
    TRINITY_MINI,
    FLASH_LITE_PREVIEW,
    LLAMA_31_8B,
    GEMINI_FLASH,
    DEEPSEEK_V32,
];

const POOL_MID: &[&str] = &[
    HERMES_405B,
    GPT_OSS_120B,
    QWEN3_NEXT,
    LLAMA_33_70B,
    QWEN3_CODER,
    GLM_45_AIR,
    TRINITY_LARGE,
    FLASH_LITE_PREVIEW,
    GEMINI_FLASH,
    DEEPSEEK_V32,
];

const POOL_STRONG: &[&str] = &[
    HERMES_405B,
    GPT_OSS_120B,
    QWEN3_NEXT,
    LLAMA_33_70B,
    QWEN3_CODER,
    GLM_45_AIR,
    TRINITY_LARGE,
    GEMINI_FLASH,
    DEEPSEEK_V32,
];

const POOL_CHAT: &[&str] = &[
    HERMES_405B,
    GPT_OSS_120B,
    QWEN3_NEXT,
    LLAMA_33_70B,
    QWEN3_CODER,
    GEMINI_FLASH,
    DEEPSEEK_V32,
];

const POOL_REASONING: &[&str] = &[HERMES_405B, GPT_OSS_120B, QWEN3_NEXT, DEEPSEEK_V32];

// ── serde default helpers ───────────────────────────────────────────

fn d_60() -> u64 {
    60
}
fn d_rpm() -> u32 {
    200
}
fn d_rpd() -> u32 {
    10_000
}
fn d_classification() -> TaskRoute {
    route(POOL_ANY, 0.1, 100, 500, 50_000)
}
fn d_sentiment() -> TaskRoute {
    route(POOL_ANY, 0.1, 100, 500, 50_000)
}
fn d_quick_response() -> TaskRoute {
    route(POOL_MID, 0.7, 512, 200, 10_000)
}
fn d_conversation() -> TaskRoute {
    route(POOL_CHAT, 0.85, 512, 200, 10_000)
}
fn d_complex_analysis() -> TaskRoute {
    route(POOL_REASONING, 0.4, 512, 200, 10_000)
}
fn d_summary() -> TaskRoute {
    route(POOL_STRONG, 0.3, 512, 500, 50_000)
}
fn d_action_detection() -> TaskRoute {
    route(POOL_STRONG, 0.1, 300, 500, 50_000)
}
fn d_memory_extraction() -> TaskRoute {
    route(POOL_CHAT, 0.1, 500, 500, 50_000)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
