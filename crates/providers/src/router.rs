//! Task-based model router.
//!
//! Maps a [`TaskType`] to an ordered model waterfall, a temperature and a
//! token ceiling. The mapping itself is configuration; the router only
//! filters the configured list through per-model rate counters and the
//! temporary bans that follow a provider 429.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tp_domain::config::{RoutingConfig, TaskRoute};
use tp_domain::conversation::TaskType;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a caller needs to issue one provider call for a task.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub task: TaskType,
    /// Usable models, best first. Never empty when the task has any model
    /// configured.
    pub waterfall: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RoutingDecision {
    pub fn primary(&self) -> Option<&str> {
        self.waterfall.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ModelUsage {
    pub minute: u32,
    pub day: u32,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    minute_count: u32,
    minute_reset: Instant,
    day_count: u32,
    day_reset: Instant,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            minute_count: 0,
            minute_reset: now + MINUTE,
            day_count: 0,
            day_reset: now + DAY,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now >= self.minute_reset {
            self.minute_count = 0;
            self.minute_reset = now + MINUTE;
        }
        if now >= self.day_reset {
            self.day_count = 0;
            self.day_reset = now + DAY;
        }
    }
}

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Default)]
struct RouterState {
    windows: HashMap<String, RateWindow>,
    banned_until: HashMap<String, Instant>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ModelRouter {
    config: RoutingConfig,
    state: Mutex<RouterState>,
}

impl ModelRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RouterState::default()),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn select_model(&self, task: TaskType) -> Option<String> {
        self.decide(task).waterfall.into_iter().next()
    }

    pub fn temperature(&self, task: TaskType) -> f32 {
        self.config.route(task).temperature
    }

    pub fn max_tokens(&self, task: TaskType) -> u32 {
        self.config.route(task).max_tokens
    }

    pub fn decide(&self, task: TaskType) -> RoutingDecision {
        self.decide_at(task, Instant::now())
    }

    pub fn decide_at(&self, task: TaskType, now: Instant) -> RoutingDecision {
        let route = self.config.route(task);
        let waterfall = {
            let mut state = self.state.lock();
            let RouterState {
                windows,
                banned_until,
            } = &mut *state;
            banned_until.retain(|_, until| *until > now);
            resolve_waterfall(route, |model| {
                if banned_until.contains_key(model) {
                    return false;
                }
                match windows.get_mut(model) {
                    Some(w) => {
                        w.roll(now);
                        w.minute_count < route.rpm && w.day_count < route.rpd
                    }
                    None => true,
                }
            })
        };
        RoutingDecision {
            task,
            waterfall,
            temperature: route.temperature,
            max_tokens: route.max_tokens,
        }
    }

    /// Count one request against `model`'s minute and day windows.
    pub fn record_usage(&self, model: &str) {
        self.record_usage_at(model, Instant::now());
    }

    pub fn record_usage_at(&self, model: &str, now: Instant) {
        let mut state = self.state.lock();
        let w = state
            .windows
            .entry(model.to_string())
            .or_insert_with(|| RateWindow::new(now));
        w.roll(now);
        w.minute_count += 1;
        w.day_count += 1;
    }

    /// Bench `model` for `rate_limit_ban_secs` after a provider 429.
    pub fn mark_rate_limited(&self, model: &str) {
        self.mark_rate_limited_at(model, Instant::now());
    }

    pub fn mark_rate_limited_at(&self, model: &str, now: Instant) {
        let until = now + Duration::from_secs(self.config.rate_limit_ban_secs);
        self.state.lock().banned_until.insert(model.to_string(), until);
        tracing::warn!(
            model = %model,
            ban_secs = self.config.rate_limit_ban_secs,
            "model rate limited, benched"
        );
    }

    pub fn stats(&self) -> HashMap<String, ModelUsage> {
        self.state
            .lock()
            .windows
            .iter()
            .map(|(model, w)| {
                (
                    model.clone(),
                    ModelUsage {
                        minute: w.minute_count,
                        day: w.day_count,
                    },
                )
            })
            .collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pure resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Filter the configured waterfall through `usable`.
///
/// When nothing is usable the first configured model is returned anyway:
/// a call that might hit a rate limit beats no call at all.
pub fn resolve_waterfall(route: &TaskRoute, mut usable: impl FnMut(&str) -> bool) -> Vec<String> {
    let available: Vec<String> = route
        .models
        .iter()
        .filter(|m| usable(m.as_str()))
        .cloned()
        .collect();
    if available.is_empty() {
        return route.models.first().cloned().into_iter().collect();
    }
    available
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
