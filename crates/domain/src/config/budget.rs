use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Budget
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "d_daily_limit")]
    pub daily_limit_usd: f64,
    /// IANA zone whose midnight closes the daily window.
    #[serde(default = "d_timezone")]
    pub timezone: Tz,
    #[serde(default)]
    pub alert_thresholds: AlertThresholds,
    /// Closed days kept for `/v1/budget`.
    #[serde(default = "d_history_days")]
    pub history_days: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit_usd: d_daily_limit(),
            timezone: d_timezone(),
            alert_thresholds: AlertThresholds::default(),
            history_days: d_history_days(),
        }
    }
}

/// Percent-of-limit marks. Must be strictly ascending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default = "d_yellow")]
    pub yellow: f64,
    #[serde(default = "d_orange")]
    pub orange: f64,
    #[serde(default = "d_red")]
    pub red: f64,
    #[serde(default = "d_hard_stop")]
    pub hard_stop: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            yellow: d_yellow(),
            orange: d_orange(),
            red: d_red(),
            hard_stop: d_hard_stop(),
        }
    }
}

impl AlertThresholds {
    pub fn is_ascending(&self) -> bool {
        self.yellow < self.orange && self.orange < self.red && self.red < self.hard_stop
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_daily_limit() -> f64 {
    5.0
}
fn d_timezone() -> Tz {
    Tz::UTC
}
fn d_history_days() -> usize {
    30
}
fn d_yellow() -> f64 {
    50.0
}
fn d_orange() -> f64 {
    80.0
}
fn d_red() -> f64 {
    90.0
}
fn d_hard_stop() -> f64 {
    100.0
}
