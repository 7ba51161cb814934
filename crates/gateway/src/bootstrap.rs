//! AppState construction and background-task spawning extracted from `main.rs`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sha2::{Digest, Sha256};

use tp_backend::{InMemoryBackend, RestSupportBackend, SupportBackend};
use tp_conversations::ConversationStore;
use tp_domain::config::{Config, ConfigSeverity, LlmStartupPolicy};
use tp_providers::{LlmProvider, ModelRouter, OpenAiCompatProvider};

use crate::runtime::budget::BudgetGovernor;
use crate::runtime::conversation_lock::ConversationLockMap;
use crate::runtime::governed::GovernedClient;
use crate::runtime::intent::{IntentClassifier, KeywordIntentClassifier};
use crate::runtime::knowledge::KnowledgeCache;
use crate::runtime::{Orchestrator, OrchestratorDeps};
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── LLM provider ─────────────────────────────────────────────────
    let provider: Option<Arc<dyn LlmProvider>> = match OpenAiCompatProvider::from_config(
        &config.llm.provider,
        config.llm.default_timeout_ms,
    ) {
        Ok(p) => {
            tracing::info!(provider = %config.llm.provider.id, base_url = %config.llm.provider.base_url, "LLM provider ready");
            Some(Arc::new(p))
        }
        Err(e) if config.llm.startup_policy == LlmStartupPolicy::RequireOne => {
            return Err(e).context("initializing LLM provider (llm.startup_policy = require_one)");
        }
        Err(e) => {
            tracing::warn!(error = %e, "no LLM provider, every reply takes the unavailable path");
            None
        }
    };

    // ── Router + budget ──────────────────────────────────────────────
    let router = Arc::new(ModelRouter::new(config.routing.clone()));
    let budget = Arc::new(BudgetGovernor::new(
        config.budget.clone(),
        config.pricing.clone(),
    ));
    tracing::info!(
        daily_limit_usd = config.budget.daily_limit_usd,
        timezone = %config.budget.timezone,
        "budget governor ready"
    );
    let llm = Arc::new(GovernedClient::new(
        provider,
        router,
        budget,
        config.llm.default_timeout_ms,
    ));

    // ── Support backend ──────────────────────────────────────────────
    let backend: Arc<dyn SupportBackend> = if config.backend.enabled {
        let rest = RestSupportBackend::new(&config.backend).context("creating backend client")?;
        tracing::info!(url = %config.backend.base_url, "support backend client ready");
        Arc::new(rest)
    } else {
        tracing::warn!("support backend disabled, sinks write to memory only");
        Arc::new(InMemoryBackend::default())
    };

    // ── Conversations ────────────────────────────────────────────────
    let conversations = Arc::new(match &config.conversations.snapshot_path {
        Some(path) => ConversationStore::load(path, config.policy.max_history)
            .with_context(|| format!("loading conversation snapshot {}", path.display()))?,
        None => ConversationStore::new(config.policy.max_history),
    });
    let locks = Arc::new(ConversationLockMap::new());
    tracing::info!(conversations = conversations.len(), "conversation store ready");

    // ── Knowledge + intents ──────────────────────────────────────────
    let knowledge = Arc::new(KnowledgeCache::new(backend.clone(), config.knowledge.ttl_secs));
    let intents: Arc<dyn IntentClassifier> = Arc::new(
        KeywordIntentClassifier::from_config(&config.locales).context("compiling locale patterns")?,
    );

    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        OrchestratorDeps {
            store: conversations.clone(),
            locks: locks.clone(),
            llm: llm.clone(),
            backend,
            intents,
            knowledge: knowledge.clone(),
        },
    ));

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(t) => {
                tracing::info!(source = %format!("env:{env_var}"), "API bearer-token auth enabled");
                Some(Sha256::digest(t.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!("API bearer-token auth DISABLED, set the {env_var} env var");
                None
            }
        }
    };

    Ok(AppState {
        config,
        orchestrator,
        llm,
        conversations,
        locks,
        knowledge,
        api_token_hash,
    })
}

/// Spawn the long-running background tokio tasks (lock pruning, knowledge
/// eviction, day-summary forwarding, snapshot flush).
pub fn spawn_background_tasks(state: &AppState) {
    // ── Idle conversation lock pruning ──────────────────────────────
    {
        let locks = state.locks.clone();
        let every = state.config.conversations.lock_prune_interval_secs.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(every));
            loop {
                interval.tick().await;
                locks.prune_idle();
            }
        });
    }

    // ── Knowledge cache eviction ────────────────────────────────────
    {
        let knowledge = state.knowledge.clone();
        let every = state.config.knowledge.evict_interval_secs.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(every));
            loop {
                interval.tick().await;
                let evicted = knowledge.evict_expired();
                if evicted > 0 {
                    tracing::debug!(evicted, "expired knowledge evicted");
                }
            }
        });
    }

    // ── Day-summary forwarding (catches rollovers on quiet days) ────
    {
        let orchestrator = state.orchestrator.clone();
        let llm = state.llm.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                // status() runs the rollover check
                let _ = llm.budget().status();
                orchestrator.flush_finished_days().await;
            }
        });
    }

    // ── Periodic conversation snapshot ──────────────────────────────
    if let Some(path) = state.config.conversations.snapshot_path.clone() {
        let conversations = state.conversations.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                if let Err(e) = conversations.flush(&path) {
                    tracing::warn!(error = %e, "conversation snapshot flush failed");
                }
            }
        });
    }
    tracing::info!("background tasks spawned");
}
