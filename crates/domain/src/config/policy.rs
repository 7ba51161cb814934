use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestration policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Every threshold the state machine consults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Escalate once this many exchanges pass while confidence stays below
    /// `escalation_ceiling_confidence`.
    #[serde(default = "d_12")]
    pub escalation_exchange_ceiling: u32,
    #[serde(default = "d_0_6")]
    pub escalation_ceiling_confidence: f32,
    /// Escalate below this confidence once `low_confidence_min_exchanges`
    /// exchanges happened.
    #[serde(default = "d_0_45")]
    pub low_confidence_floor: f32,
    #[serde(default = "d_3")]
    pub low_confidence_min_exchanges: u32,
    /// Confidence lost each time a message reads as frustrated.
    #[serde(default = "d_0_05")]
    pub frustration_penalty: f32,

    #[serde(default = "d_900")]
    pub resume_inactivity_secs: i64,
    #[serde(default = "d_0_75")]
    pub resume_min_prior_confidence: f32,
    #[serde(default = "d_0_85")]
    pub resume_min_classifier_confidence: f32,
    #[serde(default = "d_900")]
    pub staff_reminder_cooldown_secs: i64,
    #[serde(default = "d_3600")]
    pub ping_cooldown_secs: i64,

    #[serde(default = "d_0_7")]
    pub action_confidence_floor: f32,
    /// Messages kept per conversation.
    #[serde(default = "d_20")]
    pub max_history: usize,
    /// Channel messages replayed when rebuilding lost context.
    #[serde(default = "d_15")]
    pub recovery_backfill: usize,
    /// Confidence assigned when classification fails.
    #[serde(default = "d_0_7")]
    pub classification_fallback_confidence: f32,

    #[serde(default = "d_5")]
    pub memory_refresh_every: u32,
    #[serde(default = "d_4")]
    pub suggestion_every: u32,
    #[serde(default = "d_0_8")]
    pub suggestion_min_confidence: f32,
    /// Exchange at which the channel gets a descriptive name. 0 disables it.
    #[serde(default = "d_2")]
    pub rename_at_exchange: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            escalation_exchange_ceiling: d_12(),
            escalation_ceiling_confidence: d_0_6(),
            low_confidence_floor: d_0_45(),
            low_confidence_min_exchanges: d_3(),
            frustration_penalty: d_0_05(),
            resume_inactivity_secs: d_900(),
            resume_min_prior_confidence: d_0_75(),
            resume_min_classifier_confidence: d_0_85(),
            staff_reminder_cooldown_secs: d_900(),
            ping_cooldown_secs: d_3600(),
            action_confidence_floor: d_0_7(),
            max_history: d_20(),
            recovery_backfill: d_15(),
            classification_fallback_confidence: d_0_7(),
            memory_refresh_every: d_5(),
            suggestion_every: d_4(),
            suggestion_min_confidence: d_0_8(),
            rename_at_exchange: d_2(),
        }
    }
}

impl PolicyConfig {
    /// The confidence fields, for range validation.
    pub fn confidences(&self) -> [(&'static str, f32); 7] {
        [
            ("escalation_ceiling_confidence", self.escalation_ceiling_confidence),
            ("low_confidence_floor", self.low_confidence_floor),
            ("resume_min_prior_confidence", self.resume_min_prior_confidence),
            ("resume_min_classifier_confidence", self.resume_min_classifier_confidence),
            ("action_confidence_floor", self.action_confidence_floor),
            ("classification_fallback_confidence", self.classification_fallback_confidence),
            ("suggestion_min_confidence", self.suggestion_min_confidence),
        ]
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_2() -> u32 {
    2
}
fn d_3() -> u32 {
    3
}
fn d_4() -> u32 {
    4
}
fn d_5() -> u32 {
    5
}
fn d_12() -> u32 {
    12
}
fn d_15() -> usize {
    15
}
fn d_20() -> usize {
    20
}
fn d_900() -> i64 {
    900
}
fn d_3600() -> i64 {
    3600
}
fn d_0_05() -> f32 {
    0.05
}
fn d_0_45() -> f32 {
    0.45
}
fn d_0_6() -> f32 {
    0.6
}
fn d_0_7() -> f32 {
    0.7
}
fn d_0_75() -> f32 {
    0.75
}
fn d_0_8() -> f32 {
    0.8
}
fn d_0_85() -> f32 {
    0.85
}
