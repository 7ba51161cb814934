//! The per-conversation state machine.
//!
//! Each inbound event runs as one turn under the channel's lock. The turn
//! works on an owned copy of the conversation and writes it back at the
//! end, so nothing else observes a half-applied turn. Callers that may be
//! cancelled (HTTP handlers) go through [`Orchestrator::spawn_event`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::Instrument;

use tp_backend::{
    EscalationRequest, ReminderRequest, RenameRequest, SupportBackend, TaskRequest,
    TicketCostRecord,
};
use tp_contextpack::{PromptInputs, PromptPackBuilder};
use tp_conversations::{Conversation, ConversationStore, NewConversation};
use tp_domain::config::{Config, LocaleConfig, PolicyConfig};
use tp_domain::conversation::{
    ActionIntent, ActionKind, ChatMessage, KnowledgeItem, Role, Sentiment, SentimentSample,
    TaskType, TicketCategory,
};
use tp_domain::error::{Error, Result};
use tp_domain::trace::TraceEvent;

use crate::runtime::actions::{ActionContext, ActionExtractor};
use crate::runtime::conversation_lock::ConversationLockMap;
use crate::runtime::dispatch::best_effort;
use crate::runtime::escalation::{self, EscalatedStep, EscalationTrigger};
use crate::runtime::events::{InboundEvent, OutboundAction};
use crate::runtime::governed::{GovernedClient, SentimentReading};
use crate::runtime::intent::IntentClassifier;
use crate::runtime::knowledge::KnowledgeCache;
use crate::runtime::memory::MemoryService;
use crate::runtime::reply::Reply;

/// Reminders further out than this are clamped.
const MAX_REMINDER_DELAY_MS: u64 = 30 * 24 * 60 * 60 * 1000;
const SUGGESTION_LABELS: [&str; 4] = [
    "suggest_service",
    "suggest_specialist",
    "suggest_ticket",
    "no_suggestion",
];
const SUGGESTION_WINDOW: usize = 4;
const RENAME_PROMPT: &str = "Based on the conversation, generate a short, clean, descriptive channel \
name for this ticket (max 20 chars). Only use lowercase letters, numbers, and dashes. Example: \
esx-inventory-bug, tebex-refund, role-request. Respond ONLY with the suggested name, nothing else.";

/// Shared services the orchestrator drives.
pub struct OrchestratorDeps {
    pub store: Arc<ConversationStore>,
    pub locks: Arc<ConversationLockMap>,
    pub llm: Arc<GovernedClient>,
    pub backend: Arc<dyn SupportBackend>,
    pub intents: Arc<dyn IntentClassifier>,
    pub knowledge: Arc<KnowledgeCache>,
}

pub struct Orchestrator {
    policy: PolicyConfig,
    locales: LocaleConfig,
    prompts: PromptPackBuilder,
    store: Arc<ConversationStore>,
    locks: Arc<ConversationLockMap>,
    llm: Arc<GovernedClient>,
    backend: Arc<dyn SupportBackend>,
    intents: Arc<dyn IntentClassifier>,
    knowledge: Arc<KnowledgeCache>,
    memory: MemoryService,
    actions: ActionExtractor,
}

impl Orchestrator {
    pub fn new(config: &Config, deps: OrchestratorDeps) -> Self {
        Self {
            policy: config.policy.clone(),
            locales: config.locales.clone(),
            prompts: PromptPackBuilder::new(
                config.knowledge.max_chars,
                config.knowledge.dynamic_max_chars,
            ),
            memory: MemoryService::new(deps.backend.clone(), deps.llm.clone()),
            actions: ActionExtractor::new(deps.llm.clone()),
            store: deps.store,
            locks: deps.locks,
            llm: deps.llm,
            backend: deps.backend,
            intents: deps.intents,
            knowledge: deps.knowledge,
        }
    }

    pub async fn spawn_event(self: &Arc<Self>, event: InboundEvent) -> Result<Vec<OutboundAction>> {
        self.spawn_event_at(event, Utc::now()).await
    }

    /// Run the turn on its own task and wait for it. Dropping the returned
    /// future detaches the turn instead of cancelling it, so the
    /// conversation is always written back.
    pub async fn spawn_event_at(
        self: &Arc<Self>,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboundAction>> {
        let this = Arc::clone(self);
        let turn = async move { this.handle_event_at(event, now).await };
        tokio::spawn(turn.in_current_span())
            .await
            .map_err(|e| Error::Other(format!("turn task failed: {e}")))?
    }

    /// Run one turn. Only a closed lock map is an error; every other
    /// failure degrades the turn.
    pub async fn handle_event_at(
        &self,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboundAction>> {
        if matches!(event, InboundEvent::Message { is_bot: true, .. }) {
            return Ok(Vec::new());
        }

        let _permit = self
            .locks
            .acquire(event.channel_id())
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        tracing::debug!(channel_id = event.channel_id(), kind = event.kind(), "turn started");

        let mut out = Vec::new();
        match event {
            InboundEvent::TicketOpened {
                ticket_id,
                channel_id,
                counterpart_id,
                guild_id,
                subject,
            } => {
                let init = NewConversation {
                    channel_id,
                    ticket_id,
                    tenant_id: guild_id,
                    counterpart_id,
                };
                self.on_ticket_opened(init, subject, now, &mut out).await;
            }
            InboundEvent::Message {
                channel_id,
                counterpart_id,
                guild_id,
                content,
                is_staff,
                ..
            } => {
                let init = NewConversation {
                    ticket_id: channel_id.clone(),
                    channel_id,
                    tenant_id: guild_id,
                    counterpart_id,
                };
                if is_staff {
                    self.on_staff_message(init, now);
                } else {
                    self.on_message(init, &content, now, &mut out).await;
                }
            }
            InboundEvent::TicketClosed { channel_id, .. } => {
                self.on_ticket_closed(&channel_id).await;
            }
        }

        self.flush_finished_days().await;
        Ok(out)
    }

    /// Forward summaries of closed budget windows to the backend.
    pub async fn flush_finished_days(&self) {
        for day in self.llm.budget().take_finished_days() {
            best_effort("save_day_summary", None, self.backend.save_day_summary(day)).await;
        }
    }

    // ── Event handlers ───────────────────────────────────────────────

    async fn on_ticket_opened(
        &self,
        init: NewConversation,
        subject: Option<String>,
        now: DateTime<Utc>,
        out: &mut Vec<OutboundAction>,
    ) {
        let ticket_id = init.ticket_id.clone();
        let counterpart_id = init.counterpart_id.clone();
        let subject = subject.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
        let (mut conv, is_new) = self.store.get_or_create(init, now);
        if !is_new {
            match subject {
                Some(subject) if conv.subject.is_none() && conv.exchange_count == 0 => {
                    conv.ticket_id = ticket_id;
                    if conv.counterpart_id.is_empty() {
                        conv.counterpart_id = counterpart_id;
                    }
                    self.late_subject(&mut conv, subject, now, out).await;
                    self.store.insert(conv);
                }
                _ => tracing::debug!(channel_id = %conv.channel_id, "duplicate ticket_opened ignored"),
            }
            return;
        }

        match subject {
            Some(subject) => {
                conv.language = self.intents.detect_language(&subject);
                conv.subject = Some(subject.clone());
                self.open_with(&mut conv, &subject, now, out).await;
            }
            None => {
                tracing::info!(channel_id = %conv.channel_id, "no subject, waiting for the first message");
                conv.awaiting_subject = true;
            }
        }
        self.store.insert(conv);
    }

    /// A subject that arrives after the conversation already exists, e.g.
    /// when staff spoke before the ticket event was delivered.
    async fn late_subject(
        &self,
        conv: &mut Conversation,
        subject: String,
        now: DateTime<Utc>,
        out: &mut Vec<OutboundAction>,
    ) {
        tracing::info!(channel_id = %conv.channel_id, "late ticket subject");
        conv.awaiting_subject = false;
        conv.language = self.intents.detect_language(&subject);
        conv.subject = Some(subject.clone());
        if !conv.is_escalated() {
            self.open_with(conv, &subject, now, out).await;
            return;
        }

        // staff owns the ticket: record what it is about but stay silent
        self.classify(conv, &subject, &TicketCategory::ALL).await;
        conv.push_message(ChatMessage::counterpart(&subject, now), self.store.max_history());
        let confidence = conv.confidence;
        if let Some(record) = conv.escalation.as_mut() {
            record.confidence_at_escalation = confidence;
        }
    }

    fn on_staff_message(&self, init: NewConversation, now: DateTime<Utc>) {
        let staff_id = init.counterpart_id.clone();
        let blank = NewConversation {
            counterpart_id: String::new(),
            ..init
        };
        let (mut conv, is_new) = self.store.get_or_create(blank, now);
        if is_new {
            // nothing was classified, so this hand-over carries no confidence
            conv.confidence = 0.0;
        }

        let newly = !conv.is_escalated();
        conv.mark_escalated(Some(staff_id.clone()), now);
        if let Some(record) = conv.escalation.as_mut() {
            record.assignee_id = Some(staff_id);
            record.last_staff_at = Some(now);
        }
        if newly {
            tracing::info!(channel_id = %conv.channel_id, "staff took over");
            TraceEvent::Escalated {
                channel_id: conv.channel_id.clone(),
                trigger: EscalationTrigger::StaffMessage.as_str().to_owned(),
                exchange_count: conv.exchange_count,
                confidence: conv.confidence,
            }
            .emit();
        }
        self.store.insert(conv);
    }

    async fn on_message(
        &self,
        init: NewConversation,
        content: &str,
        now: DateTime<Utc>,
        out: &mut Vec<OutboundAction>,
    ) {
        let author = init.counterpart_id.clone();
        let mut conv = match self.store.get(&init.channel_id) {
            Some(conv) => conv,
            None => self.recover(init, content, now).await,
        };
        if conv.counterpart_id.is_empty() {
            conv.counterpart_id = author;
        }
        self.counterpart_turn(&mut conv, content, now, out).await;
        self.store.insert(conv);
    }

    async fn on_ticket_closed(&self, channel_id: &str) {
        let Some(conv) = self.store.remove(channel_id) else {
            tracing::debug!(channel_id, "close for unknown conversation");
            return;
        };
        tracing::info!(channel_id, exchanges = conv.exchange_count, "ticket closed");

        if !conv.counterpart_id.is_empty() {
            self.memory
                .derive(
                    &conv.tenant_id,
                    &conv.counterpart_id,
                    &conv.channel_id,
                    &conv.ticket_id,
                    &conv.messages,
                )
                .await;
        }

        if let Some(cost) = self.llm.budget().close_ticket(&conv.ticket_id) {
            let record = TicketCostRecord {
                ticket_id: cost.ticket_id,
                channel_id: conv.channel_id.clone(),
                tenant_id: conv.tenant_id.clone(),
                total_cost: cost.total_cost_usd,
                total_calls: cost.total_calls,
                models_used: cost.models_used,
            };
            best_effort(
                "save_ticket_cost",
                Some(channel_id),
                self.backend.save_ticket_cost(record),
            )
            .await;
        }
    }

    // ── Turn steps ───────────────────────────────────────────────────

    /// The counterpart path, in order: language switch, close intent,
    /// escalated handling, ping guard, deferred subject, escalation checks,
    /// sentiment, memory refresh, reply.
    async fn counterpart_turn(
        &self,
        conv: &mut Conversation,
        content: &str,
        now: DateTime<Utc>,
        out: &mut Vec<OutboundAction>,
    ) {
        if let Some(record) = conv.escalation.as_mut() {
            record.last_counterpart_at = Some(now);
        }

        let language = self.intents.detect_language(content);
        if language != conv.language {
            tracing::debug!(channel_id = %conv.channel_id, from = conv.language.code(), to = language.code(), "language switch");
            conv.language = language;
            self.rebuild_prompt(conv).await;
        }

        if self.intents.is_close_intent(content) {
            self.close_intent(conv, "keyword", out);
            return;
        }

        let step = conv
            .escalation
            .as_ref()
            .map(|record| escalation::escalated_step(&self.policy, record, now));
        match step {
            None => {}
            Some(EscalatedStep::StayQuiet) => return,
            Some(EscalatedStep::TryResume { idle_secs }) => {
                let due = conv
                    .escalation
                    .as_ref()
                    .is_some_and(|record| escalation::reminder_due(&self.policy, record, now));
                if !due {
                    return;
                }
                if escalation::resume_check(&self.llm, &self.policy, conv, content).await {
                    conv.clear_escalation();
                    tracing::info!(channel_id = %conv.channel_id, idle_secs, "agent resumed");
                    TraceEvent::Resumed {
                        channel_id: conv.channel_id.clone(),
                        idle_secs,
                    }
                    .emit();
                } else {
                    self.remind_staff(conv, now, out);
                    return;
                }
            }
        }

        if self.intents.mentions_staff(content) {
            let recent = conv
                .last_ping_at
                .is_some_and(|at| (now - at).num_seconds() < self.policy.ping_cooldown_secs);
            if recent {
                out.push(OutboundAction::SendText {
                    text: self.locales.strings.get(conv.language).ping_notice.clone(),
                });
                TraceEvent::PingSuppressed {
                    channel_id: conv.channel_id.clone(),
                }
                .emit();
            }
            conv.last_ping_at = Some(now);
        }

        if conv.awaiting_subject {
            conv.awaiting_subject = false;
            conv.subject = Some(content.to_owned());
            self.open_with(conv, content, now, out).await;
            return;
        }

        conv.push_message(ChatMessage::counterpart(content, now), self.store.max_history());

        let wants_human = self.intents.wants_human(content);
        if let Some(trigger) = escalation::pre_reply_trigger(
            &self.policy,
            wants_human,
            conv.exchange_count,
            conv.confidence,
        ) {
            self.escalate(conv, trigger, None, None, false, content, now, out).await;
            return;
        }

        let reading = match self.llm.analyze_sentiment(content, Some(&conv.ticket_id)).await {
            Ok(reading) => reading,
            Err(e) => {
                tracing::debug!(channel_id = %conv.channel_id, error = %e, "sentiment unavailable, assuming neutral");
                SentimentReading {
                    sentiment: Sentiment::Neutral,
                    score: 0.5,
                }
            }
        };
        conv.push_sentiment(SentimentSample {
            sentiment: reading.sentiment,
            score: reading.score,
            at: now,
        });
        if reading.sentiment == Sentiment::Frustrated {
            conv.reduce_confidence(self.policy.frustration_penalty);
        }

        if let Some(trigger) =
            escalation::low_confidence_trigger(&self.policy, conv.exchange_count, conv.confidence)
        {
            self.escalate(conv, trigger, None, None, false, content, now, out).await;
            return;
        }

        if every(conv.exchange_count, self.policy.memory_refresh_every) {
            conv.memories = self.memory.retrieve(&conv.tenant_id, &conv.counterpart_id).await;
            self.rebuild_prompt(conv).await;
        }

        let task = TaskType::for_reply(conv.category, conv.exchange_count);
        self.respond(conv, task, content, now, out).await;
    }

    /// First real message of a ticket: classify, load context, then run
    /// the close and escalation guards before the first reply.
    async fn open_with(
        &self,
        conv: &mut Conversation,
        text: &str,
        now: DateTime<Utc>,
        out: &mut Vec<OutboundAction>,
    ) {
        self.classify(conv, text, &TicketCategory::ALL).await;
        conv.memories = self.memory.retrieve(&conv.tenant_id, &conv.counterpart_id).await;
        self.rebuild_prompt(conv).await;
        conv.push_message(ChatMessage::counterpart(text, now), self.store.max_history());

        if self.intents.is_close_intent(text) {
            self.close_intent(conv, "subject", out);
            return;
        }
        if let Some(trigger) = escalation::pre_reply_trigger(
            &self.policy,
            self.intents.wants_human(text),
            conv.exchange_count,
            conv.confidence,
        ) {
            self.escalate(conv, trigger, None, None, false, text, now, out).await;
            return;
        }
        // the opening reply is always the quick tier, whatever the category
        self.respond(conv, TaskType::QuickResponse, text, now, out).await;
    }

    /// Rebuild context lost in a restart from the platform's history.
    async fn recover(&self, init: NewConversation, content: &str, now: DateTime<Utc>) -> Conversation {
        let mut conv = Conversation::new(init, now);
        conv.language = self.intents.detect_language(content);

        let history = match self
            .backend
            .channel_history(&conv.channel_id, self.policy.recovery_backfill)
            .await
        {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(channel_id = %conv.channel_id, error = %e, "history backfill failed");
                Vec::new()
            }
        };

        let last = history.len().saturating_sub(1);
        let mut backfilled = 0;
        for (i, msg) in history.into_iter().enumerate() {
            if i == last && msg.author_id == conv.counterpart_id && msg.content == content {
                continue;
            }
            let message = if msg.is_bot {
                ChatMessage::agent(msg.content, msg.at)
            } else if !msg.is_staff && msg.author_id == conv.counterpart_id {
                ChatMessage::counterpart(msg.content, msg.at)
            } else {
                continue;
            };
            conv.push_message(message, self.store.max_history());
            backfilled += 1;
        }

        self.classify(&mut conv, content, &TicketCategory::RECOVERY).await;
        conv.memories = self.memory.retrieve(&conv.tenant_id, &conv.counterpart_id).await;
        self.rebuild_prompt(&mut conv).await;

        tracing::info!(channel_id = %conv.channel_id, backfilled, "conversation recovered");
        TraceEvent::ConversationRecovered {
            channel_id: conv.channel_id.clone(),
            backfilled,
            category: conv.category.as_str().to_owned(),
        }
        .emit();
        conv
    }

    async fn classify(&self, conv: &mut Conversation, text: &str, categories: &[TicketCategory]) {
        let labels: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
        match self
            .llm
            .classify_text(text, &labels, None, Some(&conv.ticket_id))
            .await
        {
            Ok(c) => {
                let category = TicketCategory::from_label(&c.category).unwrap_or_default();
                conv.set_classification(category, c.confidence);
            }
            Err(e) => {
                tracing::warn!(channel_id = %conv.channel_id, error = %e, "classification failed, using general support");
                conv.set_classification(
                    TicketCategory::GeneralSupport,
                    self.policy.classification_fallback_confidence,
                );
            }
        }
        TraceEvent::ConversationClassified {
            channel_id: conv.channel_id.clone(),
            category: conv.category.as_str().to_owned(),
            confidence: conv.confidence,
        }
        .emit();
    }

    async fn respond(
        &self,
        conv: &mut Conversation,
        task: TaskType,
        trigger: &str,
        now: DateTime<Utc>,
        out: &mut Vec<OutboundAction>,
    ) {
        if conv.system_prompt.is_none() {
            self.rebuild_prompt(conv).await;
        }
        let system = conv.system_prompt.clone().unwrap_or_default();

        let raw = match self
            .llm
            .generate_text(&system, &conv.messages, task, Some(&conv.ticket_id))
            .await
        {
            Ok(raw) => raw,
            Err(e @ (Error::BudgetExhausted { .. } | Error::Config(_))) => {
                tracing::warn!(channel_id = %conv.channel_id, error = %e, "model unavailable, sending static reply");
                out.push(OutboundAction::SendText {
                    text: self.locales.strings.get(conv.language).unavailable.clone(),
                });
                return;
            }
            Err(e) => {
                tracing::warn!(channel_id = %conv.channel_id, error = %e, "reply failed, staying silent");
                return;
            }
        };

        let reply = Reply::from_model_output(&raw);
        if reply.text.is_empty() {
            tracing::warn!(channel_id = %conv.channel_id, "empty reply dropped");
            return;
        }
        conv.push_message(ChatMessage::agent(&reply.text, now), self.store.max_history());
        out.push(OutboundAction::SendText {
            text: reply.text.clone(),
        });

        self.apply_reply_actions(conv, trigger, &reply, now, out).await;

        if !conv.renamed && conv.exchange_count == self.policy.rename_at_exchange {
            self.rename(conv, now, out).await;
        }
        if !conv.is_escalated() && every(conv.exchange_count, self.policy.suggestion_every) {
            self.suggest(conv).await;
        }
    }

    /// Envelope flags first, then extracted intents above the floor.
    async fn apply_reply_actions(
        &self,
        conv: &mut Conversation,
        trigger: &str,
        reply: &Reply,
        now: DateTime<Utc>,
        out: &mut Vec<OutboundAction>,
    ) {
        let silent = self.intents.acknowledges_handoff(&reply.text);
        let mut close = reply.is_resolved;

        if reply.needs_escalation {
            self.escalate(
                conv,
                EscalationTrigger::ModelFlagged,
                reply.escalation_reason.clone(),
                None,
                silent,
                trigger,
                now,
                out,
            )
            .await;
        }

        let detected = {
            let ctx = ActionContext {
                channel_id: &conv.channel_id,
                ticket_id: &conv.ticket_id,
                counterpart_id: &conv.counterpart_id,
                category: conv.category,
                trigger,
            };
            self.actions.detect_actions(&conv.messages, &reply.text, &ctx).await
        };
        let intents: Vec<ActionIntent> = detected
            .into_iter()
            .filter(|i| i.confidence >= self.policy.action_confidence_floor)
            .collect();

        for intent in intents {
            TraceEvent::ActionDispatched {
                channel_id: conv.channel_id.clone(),
                action: intent.kind.name().to_owned(),
                confidence: intent.confidence,
            }
            .emit();
            match intent.kind {
                ActionKind::Task {
                    title,
                    description,
                    priority,
                } => {
                    let req = TaskRequest {
                        tenant_id: conv.tenant_id.clone(),
                        title,
                        description,
                        priority,
                        from_ticket_id: Some(conv.ticket_id.clone()),
                    };
                    best_effort("create_task", Some(&conv.channel_id), self.backend.create_task(req))
                        .await;
                }
                ActionKind::Reminder { content, delay_ms } => {
                    let delay = chrono::Duration::milliseconds(delay_ms.min(MAX_REMINDER_DELAY_MS) as i64);
                    let req = ReminderRequest {
                        tenant_id: conv.tenant_id.clone(),
                        user_id: conv.counterpart_id.clone(),
                        channel_id: conv.channel_id.clone(),
                        content,
                        trigger_at: now + delay,
                        source_id: conv.ticket_id.clone(),
                    };
                    best_effort(
                        "create_reminder",
                        Some(&conv.channel_id),
                        self.backend.create_reminder(req),
                    )
                    .await;
                }
                ActionKind::Escalate { reason, specialty } => {
                    if !conv.is_escalated() {
                        self.escalate(
                            conv,
                            EscalationTrigger::Action,
                            Some(reason),
                            specialty.as_deref(),
                            silent,
                            trigger,
                            now,
                            out,
                        )
                        .await;
                    }
                }
                ActionKind::Close { .. } => close = true,
            }
        }

        if close {
            out.push(OutboundAction::RequestClose);
            TraceEvent::CloseIntent {
                channel_id: conv.channel_id.clone(),
                source: "model".into(),
            }
            .emit();
        }
    }

    /// Hand the conversation to a human.
    #[allow(clippy::too_many_arguments)]
    async fn escalate(
        &self,
        conv: &mut Conversation,
        trigger: EscalationTrigger,
        reason: Option<String>,
        requested_specialty: Option<&str>,
        silent: bool,
        text: &str,
        now: DateTime<Utc>,
        out: &mut Vec<OutboundAction>,
    ) {
        let specialty = escalation::specialty(conv.category, requested_specialty);
        let team = match self
            .backend
            .query_team_members(&conv.tenant_id, specialty.as_deref(), true)
            .await
        {
            Ok(team) => team,
            Err(e) => {
                tracing::warn!(channel_id = %conv.channel_id, error = %e, "team lookup failed");
                Vec::new()
            }
        };
        let assignee_id = team.into_iter().next().map(|m| m.user_id);
        let level = escalation::level(self.intents.is_urgent(text));

        conv.mark_escalated(assignee_id.clone(), now);
        tracing::info!(
            channel_id = %conv.channel_id,
            trigger = trigger.as_str(),
            level = level.as_str(),
            assignee = assignee_id.as_deref().unwrap_or("-"),
            "escalated"
        );
        TraceEvent::Escalated {
            channel_id: conv.channel_id.clone(),
            trigger: trigger.as_str().to_owned(),
            exchange_count: conv.exchange_count,
            confidence: conv.confidence,
        }
        .emit();

        if !silent {
            let strings = self.locales.strings.get(conv.language);
            let name = assignee_id
                .as_ref()
                .map(|id| format!("<@{id}>"))
                .unwrap_or_else(|| strings.the_team.clone());
            out.push(OutboundAction::SendText {
                text: strings.escalate_message(&name),
            });
        }

        let req = EscalationRequest {
            ticket_id: conv.ticket_id.clone(),
            channel_id: conv.channel_id.clone(),
            tenant_id: conv.tenant_id.clone(),
            level,
            reason: reason
                .unwrap_or_else(|| escalation::default_reason(conv.category, conv.exchange_count)),
            specialty,
            assignee_id,
        };
        best_effort("escalate", Some(&conv.channel_id), self.backend.escalate(req)).await;
    }

    fn remind_staff(&self, conv: &mut Conversation, now: DateTime<Utc>, out: &mut Vec<OutboundAction>) {
        let Some(record) = conv.escalation.as_mut() else {
            return;
        };
        if !escalation::reminder_due(&self.policy, record, now) {
            return;
        }
        // also starts the cooldown for the next resume check
        record.last_reminder_at = Some(now);
        let Some(staff_id) = record.assignee_id.clone() else {
            return;
        };
        out.push(OutboundAction::SendText {
            text: self
                .locales
                .strings
                .get(conv.language)
                .staff_reminder(&format!("<@{staff_id}>")),
        });
        TraceEvent::StaffReminded {
            channel_id: conv.channel_id.clone(),
            staff_id,
        }
        .emit();
    }

    fn close_intent(&self, conv: &Conversation, source: &str, out: &mut Vec<OutboundAction>) {
        let strings = self.locales.strings.get(conv.language);
        let good_mood = conv
            .sentiment_temperature()
            .map_or(true, |t| t.is_good_mood());
        let farewell = if good_mood {
            &strings.farewell_good
        } else {
            &strings.farewell_bad
        };
        out.push(OutboundAction::SendText {
            text: farewell.clone(),
        });
        out.push(OutboundAction::RequestClose);
        tracing::info!(channel_id = %conv.channel_id, source, "close intent");
        TraceEvent::CloseIntent {
            channel_id: conv.channel_id.clone(),
            source: source.to_owned(),
        }
        .emit();
    }

    async fn rename(&self, conv: &mut Conversation, now: DateTime<Utc>, out: &mut Vec<OutboundAction>) {
        conv.renamed = true;
        let snippet = conv
            .messages
            .iter()
            .take(4)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let raw = match self
            .llm
            .generate_text(
                RENAME_PROMPT,
                &[ChatMessage::counterpart(snippet, now)],
                TaskType::Classification,
                Some(&conv.ticket_id),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(channel_id = %conv.channel_id, error = %e, "rename skipped");
                return;
            }
        };
        let Some(name) = slugify(&raw) else {
            tracing::debug!(channel_id = %conv.channel_id, raw = %raw, "rename answer unusable");
            return;
        };

        let req = RenameRequest {
            channel_id: conv.channel_id.clone(),
            tenant_id: conv.tenant_id.clone(),
            new_name: name.clone(),
        };
        best_effort("rename_ticket", Some(&conv.channel_id), self.backend.rename_ticket(req)).await;
        out.push(OutboundAction::Rename { name });
    }

    async fn suggest(&self, conv: &mut Conversation) {
        let start = conv.messages.len().saturating_sub(SUGGESTION_WINDOW);
        let recent = conv.messages[start..]
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Counterpart => "user",
                    Role::Agent => "agent",
                };
                format!("[{role}]: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let suggestion = match self
            .llm
            .classify_text(
                &recent,
                &SUGGESTION_LABELS,
                Some("Should we proactively suggest something to help the user?"),
                Some(&conv.ticket_id),
            )
            .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(channel_id = %conv.channel_id, error = %e, "suggestion skipped");
                return;
            }
        };
        if suggestion.category == "no_suggestion"
            || suggestion.confidence < self.policy.suggestion_min_confidence
        {
            return;
        }
        let hint = suggestion.category.trim_start_matches("suggest_").to_owned();
        if !conv.hints.contains(&hint) {
            conv.hints.push(hint);
            self.rebuild_prompt(conv).await;
        }
    }

    // ── Prompt ───────────────────────────────────────────────────────

    async fn rebuild_prompt(&self, conv: &mut Conversation) {
        let knowledge = self.knowledge.get(&conv.tenant_id).await;
        conv.system_prompt = Some(self.build_prompt(conv, &knowledge));
    }

    fn build_prompt(&self, conv: &Conversation, knowledge: &[KnowledgeItem]) -> String {
        let strings = self.locales.strings.get(conv.language);
        let persona = strings.persona_prompt(&self.locales.persona_name);
        let (prompt, report) = self.prompts.build(&PromptInputs {
            persona: &persona,
            guidance: strings.guidance.get(conv.category),
            knowledge,
            memories: &conv.memories,
            hints: &conv.hints,
            language_name: conv.language.display_name(),
        });
        tracing::debug!(
            channel_id = %conv.channel_id,
            total_chars = report.total_chars,
            knowledge_items = report.knowledge_items,
            truncated = report.sections.iter().any(|s| s.truncated),
            "system prompt built"
        );
        prompt
    }
}

fn every(count: u32, period: u32) -> bool {
    period > 0 && count > 0 && count % period == 0
}

/// Channel-name slug: lowercase ASCII letters, digits and single dashes,
/// 3 to 30 characters.
fn slugify(raw: &str) -> Option<String> {
    let mut slug = String::new();
    for c in raw.trim().to_lowercase().chars() {
        let c = if c.is_whitespace() || c == '_' { '-' } else { c };
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if c == '-' && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(30);
    let slug = slug.trim_end_matches('-').to_owned();
    (slug.len() >= 3).then_some(slug)
}
