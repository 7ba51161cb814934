//! Process-wide daily spend governor.
//!
//! [`BudgetGovernor`] keeps one ledger per budget window (a calendar day in
//! the configured time zone). Every model call is charged after it returns;
//! callers ask [`BudgetGovernor::is_blocked`] before issuing one. Alerts
//! fire at most once per window and the hard stop holds until rollover.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use tp_backend::{DaySummaryRecord, ModelSpend, TaskSpend};
use tp_domain::config::{AlertThresholds, BudgetConfig, PricingConfig};
use tp_domain::conversation::TaskType;
use tp_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Yellow,
    Orange,
    Red,
    HardStop,
}

impl AlertLevel {
    /// Highest first.
    const DESCENDING: [AlertLevel; 4] = [
        AlertLevel::HardStop,
        AlertLevel::Red,
        AlertLevel::Orange,
        AlertLevel::Yellow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Yellow => "yellow",
            AlertLevel::Orange => "orange",
            AlertLevel::Red => "red",
            AlertLevel::HardStop => "hard_stop",
        }
    }

    fn threshold(self, t: &AlertThresholds) -> f64 {
        match self {
            AlertLevel::Yellow => t.yellow,
            AlertLevel::Orange => t.orange,
            AlertLevel::Red => t.red,
            AlertLevel::HardStop => t.hard_stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    Allowed,
    AllowedWithAlert(AlertLevel),
    /// The hard stop is active. Do not call the provider again this window.
    Blocked,
}

/// One model call to account for.
#[derive(Debug, Clone)]
pub struct Charge {
    pub cost_usd: f64,
    pub model: String,
    pub task: TaskType,
    pub ticket_id: Option<String>,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cached_tokens: u32,
}

/// Final cost of a ticket, returned once when it closes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketCostSummary {
    pub ticket_id: String,
    pub total_cost_usd: f64,
    pub total_calls: u64,
    pub models_used: Vec<String>,
}

#[derive(Debug, Default)]
struct TicketTally {
    total_cost: f64,
    total_calls: u64,
    models: BTreeSet<String>,
}

/// Running counters of one budget window.
#[derive(Debug)]
struct Ledger {
    date: NaiveDate,
    spent: f64,
    requests: u64,
    tokens_in: u64,
    tokens_out: u64,
    cached: u64,
    by_model: HashMap<String, ModelSpend>,
    by_task: HashMap<String, TaskSpend>,
    tickets_closed: u64,
    tickets_closed_cost: f64,
    alerts_sent: HashSet<AlertLevel>,
    hard_stop: bool,
}

impl Ledger {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            spent: 0.0,
            requests: 0,
            tokens_in: 0,
            tokens_out: 0,
            cached: 0,
            by_model: HashMap::new(),
            by_task: HashMap::new(),
            tickets_closed: 0,
            tickets_closed_cost: 0.0,
            alerts_sent: HashSet::new(),
            hard_stop: false,
        }
    }

    fn summary(&self) -> DaySummaryRecord {
        let avg_cost_per_ticket = if self.tickets_closed > 0 {
            self.tickets_closed_cost / self.tickets_closed as f64
        } else {
            0.0
        };
        DaySummaryRecord {
            date: self.date,
            total_spend: self.spent,
            total_requests: self.requests,
            total_tokens_in: self.tokens_in,
            total_tokens_out: self.tokens_out,
            total_cached: self.cached,
            avg_cost_per_ticket,
            by_model: self.by_model.clone(),
            by_task_type: self.by_task.clone(),
        }
    }
}

struct GovernorState {
    ledger: Ledger,
    /// Ticket tallies outlive window rollovers.
    tickets: HashMap<String, TicketTally>,
    history: VecDeque<DaySummaryRecord>,
    /// Closed windows not yet handed to the day-summary sink.
    finished: Vec<DaySummaryRecord>,
}

/// Budget status served by `GET /v1/budget`.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub limit_usd: f64,
    pub percent_used: f64,
    pub blocked: bool,
    pub alerts_sent: Vec<AlertLevel>,
    pub today: DaySummaryRecord,
    pub history: Vec<DaySummaryRecord>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BudgetGovernor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct BudgetGovernor {
    config: BudgetConfig,
    pricing: PricingConfig,
    state: Mutex<GovernorState>,
}

impl BudgetGovernor {
    pub fn new(config: BudgetConfig, pricing: PricingConfig) -> Self {
        Self::new_at(config, pricing, Utc::now())
    }

    pub fn new_at(config: BudgetConfig, pricing: PricingConfig, now: DateTime<Utc>) -> Self {
        let date = window_date(&config, now);
        Self {
            config,
            pricing,
            state: Mutex::new(GovernorState {
                ledger: Ledger::new(date),
                tickets: HashMap::new(),
                history: VecDeque::new(),
                finished: Vec::new(),
            }),
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// USD cost of a call under the configured price table.
    pub fn price(&self, model: &str, tokens_in: u32, tokens_out: u32, cached: u32) -> f64 {
        self.pricing.cost(model, tokens_in, tokens_out, cached)
    }

    /// Spend recorded in the current window.
    pub fn spent(&self) -> f64 {
        self.state.lock().ledger.spent
    }

    pub fn is_blocked(&self) -> bool {
        self.is_blocked_at(Utc::now())
    }

    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock();
        self.rollover_if_needed(&mut state, now);
        state.ledger.hard_stop
            || self.percent(state.ledger.spent) >= self.config.alert_thresholds.hard_stop
    }

    pub fn charge(&self, charge: &Charge) -> ChargeOutcome {
        self.charge_at(charge, Utc::now())
    }

    /// Record a call's cost and report what the caller may do next.
    ///
    /// The spend is always recorded, even when the outcome is `Blocked`:
    /// the call already happened.
    pub fn charge_at(&self, charge: &Charge, now: DateTime<Utc>) -> ChargeOutcome {
        let mut state = self.state.lock();
        self.rollover_if_needed(&mut state, now);
        let was_stopped = state.ledger.hard_stop;
        let cost = charge.cost_usd.max(0.0);

        let ledger = &mut state.ledger;
        ledger.spent += cost;
        ledger.requests += 1;
        ledger.tokens_in += u64::from(charge.tokens_in);
        ledger.tokens_out += u64::from(charge.tokens_out);
        ledger.cached += u64::from(charge.cached_tokens);

        let model = ledger.by_model.entry(charge.model.clone()).or_default();
        model.requests += 1;
        model.cost += cost;
        model.tokens_in += u64::from(charge.tokens_in);
        model.tokens_out += u64::from(charge.tokens_out);

        let task = ledger
            .by_task
            .entry(charge.task.as_str().to_owned())
            .or_default();
        task.requests += 1;
        task.cost += cost;

        let spent = ledger.spent;
        if let Some(ref ticket_id) = charge.ticket_id {
            let tally = state.tickets.entry(ticket_id.clone()).or_default();
            tally.total_cost += cost;
            tally.total_calls += 1;
            tally.models.insert(charge.model.clone());
        }

        TraceEvent::BudgetCharged {
            model: charge.model.clone(),
            task_type: charge.task.as_str().to_owned(),
            ticket_id: charge.ticket_id.clone(),
            cost_usd: cost,
            spent_usd: spent,
            limit_usd: self.config.daily_limit_usd,
        }
        .emit();

        if was_stopped {
            return ChargeOutcome::Blocked;
        }

        match self.next_alert(&mut state.ledger) {
            Some(level) => ChargeOutcome::AllowedWithAlert(level),
            None => ChargeOutcome::Allowed,
        }
    }

    /// Finalize a ticket's cost. `None` when the ticket never made a call.
    pub fn close_ticket(&self, ticket_id: &str) -> Option<TicketCostSummary> {
        self.close_ticket_at(ticket_id, Utc::now())
    }

    pub fn close_ticket_at(&self, ticket_id: &str, now: DateTime<Utc>) -> Option<TicketCostSummary> {
        let mut state = self.state.lock();
        self.rollover_if_needed(&mut state, now);
        let tally = state.tickets.remove(ticket_id)?;
        state.ledger.tickets_closed += 1;
        state.ledger.tickets_closed_cost += tally.total_cost;

        let summary = TicketCostSummary {
            ticket_id: ticket_id.to_owned(),
            total_cost_usd: tally.total_cost,
            total_calls: tally.total_calls,
            models_used: tally.models.into_iter().collect(),
        };
        TraceEvent::TicketCostClosed {
            ticket_id: summary.ticket_id.clone(),
            total_cost_usd: summary.total_cost_usd,
            total_calls: summary.total_calls,
            models_used: summary.models_used.clone(),
        }
        .emit();
        Some(summary)
    }

    pub fn status(&self) -> BudgetStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> BudgetStatus {
        let mut state = self.state.lock();
        self.rollover_if_needed(&mut state, now);
        let mut alerts_sent: Vec<AlertLevel> = state.ledger.alerts_sent.iter().copied().collect();
        alerts_sent.sort();
        BudgetStatus {
            limit_usd: self.config.daily_limit_usd,
            percent_used: self.percent(state.ledger.spent),
            blocked: state.ledger.hard_stop
                || self.percent(state.ledger.spent) >= self.config.alert_thresholds.hard_stop,
            alerts_sent,
            today: state.ledger.summary(),
            history: state.history.iter().cloned().collect(),
        }
    }

    /// Drain summaries of windows closed since the last call.
    pub fn take_finished_days(&self) -> Vec<DaySummaryRecord> {
        std::mem::take(&mut self.state.lock().finished)
    }

    // ── Private ──────────────────────────────────────────────────────

    fn percent(&self, spent: f64) -> f64 {
        if self.config.daily_limit_usd > 0.0 {
            spent / self.config.daily_limit_usd * 100.0
        } else {
            f64::INFINITY
        }
    }

    /// The highest reached level not yet sent this window. Lower levels
    /// are marked sent with it so they never fire afterwards.
    fn next_alert(&self, ledger: &mut Ledger) -> Option<AlertLevel> {
        let pct = self.percent(ledger.spent);
        let thresholds = &self.config.alert_thresholds;
        let level = AlertLevel::DESCENDING
            .into_iter()
            .find(|l| pct >= l.threshold(thresholds) && !ledger.alerts_sent.contains(l))?;

        for lower in AlertLevel::DESCENDING.into_iter().filter(|l| *l <= level) {
            ledger.alerts_sent.insert(lower);
        }
        if level == AlertLevel::HardStop {
            ledger.hard_stop = true;
            tracing::error!(
                spent_usd = ledger.spent,
                limit_usd = self.config.daily_limit_usd,
                "daily budget exhausted, model calls blocked until rollover"
            );
        } else {
            tracing::warn!(
                level = level.as_str(),
                spent_usd = ledger.spent,
                limit_usd = self.config.daily_limit_usd,
                "budget alert"
            );
        }

        TraceEvent::BudgetAlert {
            level: level.as_str().to_owned(),
            spent_usd: ledger.spent,
            limit_usd: self.config.daily_limit_usd,
            percent: pct,
        }
        .emit();
        Some(level)
    }

    fn rollover_if_needed(&self, state: &mut GovernorState, now: DateTime<Utc>) {
        let today = window_date(&self.config, now);
        if today <= state.ledger.date {
            return;
        }
        let previous = std::mem::replace(&mut state.ledger, Ledger::new(today));
        let summary = previous.summary();

        TraceEvent::BudgetRollover {
            previous_date: previous.date.to_string(),
            new_date: today.to_string(),
            spent_usd: previous.spent,
            requests: previous.requests,
        }
        .emit();

        state.history.push_back(summary.clone());
        while state.history.len() > self.config.history_days {
            state.history.pop_front();
        }
        state.finished.push(summary);
    }
}

fn window_date(config: &BudgetConfig, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&config.timezone).date_naive()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
