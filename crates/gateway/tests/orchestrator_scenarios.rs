//! End-to-end turns through the orchestrator with a scripted model and the
//! in-memory support backend. No network, no wall clock: every event is
//! handled at an explicit instant.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use tp_backend::{HistoryMessage, InMemoryBackend, SupportBackend, TeamMember};
use tp_conversations::{Conversation, ConversationStore};
use tp_domain::config::{Config, LocaleStrings};
use tp_domain::conversation::{Language, Memory, Role, TaskType, TicketCategory};
use tp_domain::error::{Error, Result};
use tp_gateway::runtime::budget::BudgetGovernor;
use tp_gateway::runtime::conversation_lock::ConversationLockMap;
use tp_gateway::runtime::escalation;
use tp_gateway::runtime::governed::GovernedClient;
use tp_gateway::runtime::intent::{IntentClassifier, KeywordIntentClassifier};
use tp_gateway::runtime::knowledge::KnowledgeCache;
use tp_gateway::runtime::{InboundEvent, Orchestrator, OrchestratorDeps, OutboundAction};
use tp_providers::{ChatRequest, ChatResponse, LlmProvider, ModelRouter, Usage};

// ── Scripted model ──────────────────────────────────────────────────────

/// Answers by call kind, recognised from the prompt. Replies come from a
/// queue and fall back to a plain envelope.
struct Script {
    answers: Mutex<HashMap<&'static str, String>>,
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<&'static str>>,
    failing: AtomicBool,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Script {
    fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        let answers = HashMap::from([
            ("category", r#"{"category":"general_support","confidence":0.9}"#.to_owned()),
            ("sentiment", r#"{"sentiment":"neutral","score":0.5}"#.to_owned()),
            ("resume", r#"{"category":"needs_human","confidence":0.9}"#.to_owned()),
            ("suggestion", r#"{"category":"no_suggestion","confidence":0.9}"#.to_owned()),
            ("actions", r#"{"actions":[]}"#.to_owned()),
            ("memories", r#"{"memories":[]}"#.to_owned()),
            ("rename", "order-status".to_owned()),
        ]);
        Arc::new(Self {
            answers: Mutex::new(answers),
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    fn set(&self, kind: &'static str, answer: &str) {
        self.answers.lock().insert(kind, answer.to_owned());
    }

    fn reply(&self, raw: &str) {
        self.replies.lock().push_back(raw.to_owned());
    }

    fn calls_of(&self, kind: &str) -> usize {
        self.calls.lock().iter().filter(|k| **k == kind).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    fn kind_of(req: &ChatRequest) -> &'static str {
        let system = req.messages.first().map(|m| m.content.as_str()).unwrap_or("");
        let last = req.messages.last().map(|m| m.content.as_str()).unwrap_or("");
        if system.starts_with("You are a text classifier") {
            if last.contains("- can_handle") {
                "resume"
            } else if last.contains("- suggest_service") {
                "suggestion"
            } else {
                "category"
            }
        } else if system.starts_with("You are a sentiment analyzer") {
            "sentiment"
        } else if system.starts_with("You are an action extractor") {
            "actions"
        } else if system.starts_with("You extract facts") {
            "memories"
        } else if system.starts_with("Based on the conversation") {
            "rename"
        } else {
            "reply"
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for Script {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let kind = Self::kind_of(req);
        self.calls.lock().push(kind);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Provider {
                provider: "script".into(),
                message: "HTTP 502".into(),
            });
        }
        let content = if kind == "reply" {
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| r#"{"response":"sure, tell me more"}"#.to_owned())
        } else {
            self.answers.lock().get(kind).cloned().unwrap_or_default()
        };
        Ok(ChatResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 1_000,
                completion_tokens: 100,
                total_tokens: 1_100,
                cached_tokens: 0,
            }),
            model: req.model.clone().unwrap_or_default(),
            finish_reason: Some("stop".into()),
        })
    }

    fn provider_id(&self) -> &str {
        "script"
    }
}

// ── Harness ─────────────────────────────────────────────────────────────

struct Harness {
    orch: Arc<Orchestrator>,
    store: Arc<ConversationStore>,
    script: Arc<Script>,
    backend: Arc<InMemoryBackend>,
    llm: Arc<GovernedClient>,
    config: Config,
}

fn team() -> Vec<TeamMember> {
    vec![TeamMember {
        user_id: "staff-1".into(),
        name: "Sam".into(),
        specialties: vec![],
        available: true,
    }]
}

fn harness() -> Harness {
    build(Config::default(), Some(Script::new()), InMemoryBackend::new().with_team("guild-1", team()))
}

fn build(config: Config, script: Option<Arc<Script>>, backend: InMemoryBackend) -> Harness {
    let script = script.unwrap_or_else(Script::new);
    let provider: Option<Arc<dyn LlmProvider>> = Some(script.clone());
    build_with_provider(config, script, provider, backend)
}

fn build_with_provider(
    config: Config,
    script: Arc<Script>,
    provider: Option<Arc<dyn LlmProvider>>,
    backend: InMemoryBackend,
) -> Harness {
    let backend = Arc::new(backend);
    let dyn_backend: Arc<dyn SupportBackend> = backend.clone();
    let budget = Arc::new(BudgetGovernor::new(config.budget.clone(), config.pricing.clone()));
    let llm = Arc::new(GovernedClient::new(
        provider,
        Arc::new(ModelRouter::new(config.routing.clone())),
        budget,
        5_000,
    ));
    let store = Arc::new(ConversationStore::new(config.policy.max_history));
    let intents: Arc<dyn IntentClassifier> =
        Arc::new(KeywordIntentClassifier::from_config(&config.locales).unwrap());
    let orch = Arc::new(Orchestrator::new(
        &config,
        OrchestratorDeps {
            store: store.clone(),
            locks: Arc::new(ConversationLockMap::new()),
            llm: llm.clone(),
            backend: dyn_backend.clone(),
            intents,
            knowledge: Arc::new(KnowledgeCache::new(dyn_backend, config.knowledge.ttl_secs)),
        },
    ));
    Harness {
        orch,
        store,
        script,
        backend,
        llm,
        config,
    }
}

impl Harness {
    async fn send(&self, event: InboundEvent, secs: i64) -> Vec<OutboundAction> {
        self.orch.handle_event_at(event, at(secs)).await.unwrap()
    }

    fn conv(&self, channel: &str) -> Conversation {
        self.store.get(channel).unwrap()
    }

    fn en(&self) -> &LocaleStrings {
        self.config.locales.strings.get(Language::En)
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

fn opened(channel: &str, subject: Option<&str>) -> InboundEvent {
    InboundEvent::TicketOpened {
        ticket_id: format!("t-{channel}"),
        channel_id: channel.into(),
        counterpart_id: "user-1".into(),
        guild_id: "guild-1".into(),
        subject: subject.map(str::to_owned),
    }
}

fn msg(channel: &str, content: &str) -> InboundEvent {
    InboundEvent::Message {
        channel_id: channel.into(),
        counterpart_id: "user-1".into(),
        guild_id: "guild-1".into(),
        content: content.into(),
        is_staff: false,
        is_bot: false,
    }
}

fn staff(channel: &str, content: &str) -> InboundEvent {
    InboundEvent::Message {
        channel_id: channel.into(),
        counterpart_id: "staff-1".into(),
        guild_id: "guild-1".into(),
        content: content.into(),
        is_staff: true,
        is_bot: false,
    }
}

fn closed(channel: &str) -> InboundEvent {
    InboundEvent::TicketClosed {
        channel_id: channel.into(),
        guild_id: "guild-1".into(),
    }
}

fn texts(actions: &[OutboundAction]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|a| match a {
            OutboundAction::SendText { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

const LOW_CONFIDENCE: &str = r#"{"category":"general_support","confidence":0.5}"#;

// ── Opening ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn subject_asking_for_a_human_escalates_without_a_reply() {
    let h = harness();
    let out = h
        .send(opened("c1", Some("payment did not process, need a human")), 0)
        .await;

    assert_eq!(texts(&out), vec![h.en().escalate_message("<@staff-1>").as_str()]);
    assert_eq!(h.script.calls_of("reply"), 0);

    let conv = h.conv("c1");
    let record = conv.escalation.as_ref().unwrap();
    assert_eq!(record.assignee_id.as_deref(), Some("staff-1"));
    assert_eq!(h.backend.log().escalations.len(), 1);
}

#[tokio::test]
async fn plain_subject_gets_classified_and_answered() {
    let h = harness();
    h.script.set("category", r#"{"category":"bug_report","confidence":0.8}"#);
    let out = h.send(opened("c1", Some("the launcher crashes on start")), 0).await;

    assert_eq!(texts(&out), vec!["sure, tell me more"]);
    let conv = h.conv("c1");
    assert_eq!(conv.category, TicketCategory::BugReport);
    assert_eq!(conv.exchange_count, 1);
    assert_eq!(conv.messages.len(), 2);
    assert!(conv.system_prompt.is_some());
}

#[tokio::test]
async fn subjectless_ticket_waits_for_the_first_message() {
    let h = harness();
    let out = h.send(opened("c1", None), 0).await;
    assert!(out.is_empty());
    assert_eq!(h.script.total_calls(), 0);
    assert!(h.conv("c1").awaiting_subject);

    let out = h.send(msg("c1", "hola, necesito ayuda con mi pedido"), 10).await;
    assert_eq!(texts(&out), vec!["sure, tell me more"]);
    let conv = h.conv("c1");
    assert!(!conv.awaiting_subject);
    assert_eq!(conv.language, Language::Es);
    assert_eq!(conv.subject.as_deref(), Some("hola, necesito ayuda con mi pedido"));
    assert_eq!(conv.exchange_count, 1);
}

#[tokio::test]
async fn failed_classification_falls_back_to_general_support() {
    let h = harness();
    h.script.set("category", "not json");
    h.send(opened("c1", Some("where is my order")), 0).await;
    let conv = h.conv("c1");
    assert_eq!(conv.category, TicketCategory::GeneralSupport);
    assert!((conv.confidence - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn opening_reply_is_quick_for_every_category() {
    for category in ["bug_report", "partnership", "general_support"] {
        let h = harness();
        h.script
            .set("category", &format!(r#"{{"category":"{category}","confidence":0.9}}"#));
        let out = h.send(opened("c1", Some("the launcher crashes on start")), 0).await;
        assert_eq!(texts(&out), vec!["sure, tell me more"], "{category}");

        let spend = h.llm.budget().status().today.by_task_type;
        assert_eq!(spend.get("quick_response").map(|t| t.requests), Some(1), "{category}");
        assert!(!spend.contains_key("conversation"), "{category}");
        assert!(!spend.contains_key("complex_analysis"), "{category}");
    }
}

#[tokio::test]
async fn dropped_caller_still_completes_the_turn() {
    let h = build(
        Config::default(),
        Some(Script::with_delay(Duration::from_millis(200))),
        InMemoryBackend::new().with_team("guild-1", team()),
    );
    let dropped = tokio::time::timeout(
        Duration::from_millis(300),
        h.orch.spawn_event_at(opened("c1", Some("where is my order #123")), at(0)),
    )
    .await;
    assert!(dropped.is_err());

    // waits on the channel lock until the detached turn has written back
    h.send(msg("c1", "hello?"), 10).await;

    let conv = h.conv("c1");
    assert_eq!(conv.subject.as_deref(), Some("where is my order #123"));
    assert_eq!(conv.messages[0].content, "where is my order #123");
    assert_eq!(conv.messages[1].role, Role::Agent);
    assert_eq!(conv.exchange_count, 2);
}

// ── Escalation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn exchange_ceiling_fires_at_twelve_not_before() {
    let h = harness();
    h.script.set("category", LOW_CONFIDENCE);
    h.send(opened("c1", Some("where is my order")), 0).await;

    for i in 2..=11 {
        let out = h.send(msg("c1", &format!("still waiting on order {i}")), i * 10).await;
        assert!(texts(&out).contains(&"sure, tell me more"), "exchange {i}");
        assert!(h.conv("c1").escalation.is_none(), "exchange {i} escalated early");
    }

    let replies_before = h.script.calls_of("reply");
    let out = h.send(msg("c1", "still waiting on order 12"), 120).await;
    assert_eq!(texts(&out), vec![h.en().escalate_message("<@staff-1>").as_str()]);
    assert_eq!(h.script.calls_of("reply"), replies_before);

    let conv = h.conv("c1");
    assert_eq!(conv.exchange_count, 12);
    assert!((conv.escalation.unwrap().confidence_at_escalation - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn frustration_drags_confidence_under_the_floor() {
    let h = harness();
    h.script.set("category", r#"{"category":"general_support","confidence":0.57}"#);
    h.script.set("sentiment", r#"{"sentiment":"frustrated","score":0.1}"#);
    h.send(opened("c1", Some("where is my order")), 0).await;

    // 0.57 -> 0.52 -> 0.47 -> 0.42 at exchange 4
    h.send(msg("c1", "still nothing"), 10).await;
    h.send(msg("c1", "still nothing again"), 20).await;
    assert!(h.conv("c1").escalation.is_none());
    let out = h.send(msg("c1", "seriously still nothing"), 30).await;

    assert_eq!(texts(&out), vec![h.en().escalate_message("<@staff-1>").as_str()]);
    assert!(h.conv("c1").escalation.is_some());
}

#[tokio::test]
async fn model_flagged_escalation_skips_the_handoff_when_acknowledged() {
    let h = harness();
    h.script.reply(
        r#"{"response":"let me ask the team about that","needs_escalation":true,"escalation_reason":"billing dispute"}"#,
    );
    let out = h.send(opened("c1", Some("my invoice looks wrong")), 0).await;

    assert_eq!(texts(&out), vec!["let me ask the team about that"]);
    assert!(h.conv("c1").escalation.is_some());
    let log = h.backend.log();
    assert_eq!(log.escalations.len(), 1);
    assert_eq!(log.escalations[0].reason, "billing dispute");
}

#[tokio::test]
async fn staff_message_takes_over_silently() {
    let h = harness();
    h.send(opened("c1", Some("where is my order")), 0).await;
    let out = h.send(staff("c1", "hi, looking into it"), 60).await;

    assert!(out.is_empty());
    let record = h.conv("c1").escalation.unwrap();
    assert_eq!(record.assignee_id.as_deref(), Some("staff-1"));
    assert_eq!(record.last_staff_at, Some(at(60)));
}

#[tokio::test]
async fn staff_first_ticket_has_no_confidence_to_resume_with() {
    let h = harness();
    h.script.set("resume", r#"{"category":"can_handle","confidence":0.99}"#);
    let out = h.send(staff("c1", "hi, I'll take this one"), 0).await;
    assert!(out.is_empty());
    let record = h.conv("c1").escalation.unwrap();
    assert!(record.confidence_at_escalation < h.config.policy.resume_min_prior_confidence);

    let out = h.send(msg("c1", "any news?"), 16 * 60).await;

    assert_eq!(h.script.calls_of("resume"), 0);
    assert_eq!(texts(&out), vec![h.en().staff_reminder("<@staff-1>").as_str()]);
    let conv = h.conv("c1");
    assert!(conv.escalation.is_some());
    assert_eq!(conv.counterpart_id, "user-1");
}

#[tokio::test]
async fn late_ticket_event_fills_in_the_subject_without_replying() {
    let h = harness();
    h.script.set("category", r#"{"category":"bug_report","confidence":0.9}"#);
    h.send(staff("c1", "hi, I'll take this one"), 0).await;

    let out = h.send(opened("c1", Some("the launcher crashes on start")), 5).await;

    assert!(out.is_empty());
    assert_eq!(h.script.calls_of("reply"), 0);
    let conv = h.conv("c1");
    assert_eq!(conv.subject.as_deref(), Some("the launcher crashes on start"));
    assert_eq!(conv.ticket_id, "t-c1");
    assert_eq!(conv.counterpart_id, "user-1");
    assert_eq!(conv.category, TicketCategory::BugReport);
    assert_eq!(conv.messages[0].content, "the launcher crashes on start");
    let record = conv.escalation.unwrap();
    assert_eq!(record.assignee_id.as_deref(), Some("staff-1"));
    assert!((record.confidence_at_escalation - 0.9).abs() < 1e-6);

    h.send(opened("c1", Some("something else entirely")), 10).await;
    assert_eq!(h.conv("c1").subject.as_deref(), Some("the launcher crashes on start"));
    assert_eq!(h.script.calls_of("category"), 1);
}

#[tokio::test]
async fn bot_messages_are_ignored() {
    let h = harness();
    let out = h
        .send(
            InboundEvent::Message {
                channel_id: "c1".into(),
                counterpart_id: "bot".into(),
                guild_id: "guild-1".into(),
                content: "automated notice".into(),
                is_staff: false,
                is_bot: true,
            },
            0,
        )
        .await;
    assert!(out.is_empty());
    assert!(h.store.get("c1").is_none());
}

// ── Escalated state ─────────────────────────────────────────────────────

#[tokio::test]
async fn stays_quiet_while_the_human_is_active() {
    let h = harness();
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(staff("c1", "on it"), 60).await;

    let messages_before = h.conv("c1").messages.len();
    let out = h.send(msg("c1", "any news?"), 300).await;
    assert!(out.is_empty());
    assert_eq!(h.conv("c1").messages.len(), messages_before);
    assert_eq!(h.script.calls_of("resume"), 0);
}

#[tokio::test]
async fn no_resume_when_prior_confidence_was_low() {
    let h = harness();
    h.script.set("category", r#"{"category":"general_support","confidence":0.6}"#);
    h.script.set("resume", r#"{"category":"can_handle","confidence":0.99}"#);
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(staff("c1", "on it"), 60).await;

    let out = h.send(msg("c1", "any news?"), 60 + 16 * 60).await;

    assert_eq!(h.script.calls_of("resume"), 0);
    assert_eq!(texts(&out), vec![h.en().staff_reminder("<@staff-1>").as_str()]);
    assert!(h.conv("c1").escalation.is_some());
}

#[tokio::test]
async fn resumes_after_inactivity_when_confident() {
    let h = harness();
    h.script.set("resume", r#"{"category":"can_handle","confidence":0.9}"#);
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(staff("c1", "on it"), 60).await;

    let out = h.send(msg("c1", "any news?"), 60 + 16 * 60).await;

    assert_eq!(h.script.calls_of("resume"), 1);
    assert_eq!(texts(&out), vec!["sure, tell me more"]);
    assert!(h.conv("c1").escalation.is_none());
}

#[tokio::test]
async fn reminders_respect_their_cooldown() {
    let h = harness();
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(staff("c1", "on it"), 60).await;
    let reminder = h.en().staff_reminder("<@staff-1>");

    let out = h.send(msg("c1", "hello?"), 60 + 16 * 60).await;
    assert_eq!(texts(&out), vec![reminder.as_str()]);
    assert_eq!(h.script.calls_of("resume"), 1);

    let out = h.send(msg("c1", "hello??"), 60 + 21 * 60).await;
    assert!(out.is_empty());
    assert_eq!(h.script.calls_of("resume"), 1);

    let out = h.send(msg("c1", "hello???"), 60 + 32 * 60).await;
    assert_eq!(texts(&out), vec![reminder.as_str()]);
    assert_eq!(h.script.calls_of("resume"), 2);
}

#[tokio::test]
async fn unassigned_escalation_checks_for_resume_once_per_cooldown() {
    let h = build(Config::default(), Some(Script::new()), InMemoryBackend::new());
    h.send(opened("c1", Some("payment did not process, need a human")), 0).await;
    assert_eq!(h.conv("c1").escalation.unwrap().assignee_id, None);

    for (i, secs) in [16 * 60, 17 * 60, 20 * 60, 29 * 60].into_iter().enumerate() {
        let out = h.send(msg("c1", &format!("anyone there {i}")), secs).await;
        assert!(out.is_empty(), "message {i}");
    }
    assert_eq!(h.script.calls_of("resume"), 1);

    h.send(msg("c1", "anyone there at all"), 31 * 60).await;
    assert_eq!(h.script.calls_of("resume"), 2);
}

#[tokio::test]
async fn close_intent_wins_over_escalation() {
    let h = harness();
    h.send(opened("c1", Some("where is my order")), 0).await;

    let out = h.send(msg("c1", "thanks that's all, no refund needed"), 10).await;
    assert_eq!(
        out,
        vec![
            OutboundAction::SendText {
                text: h.en().farewell_good.clone()
            },
            OutboundAction::RequestClose,
        ]
    );
    assert!(h.conv("c1").escalation.is_none());
}

#[tokio::test]
async fn close_intent_short_circuits_while_escalated() {
    let h = harness();
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(staff("c1", "on it"), 60).await;

    let out = h.send(msg("c1", "thanks!"), 120).await;
    assert_eq!(out.last(), Some(&OutboundAction::RequestClose));
}

#[tokio::test]
async fn frustrated_counterpart_gets_the_short_farewell() {
    let h = harness();
    h.script.set("sentiment", r#"{"sentiment":"frustrated","score":0.1}"#);
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(msg("c1", "this is taking forever"), 10).await;

    let out = h.send(msg("c1", "bye"), 20).await;
    assert_eq!(texts(&out), vec![h.en().farewell_bad.as_str()]);
}

// ── Guards ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_ping_within_the_cooldown_gets_the_notice() {
    let h = harness();
    h.send(opened("c1", Some("where is my order")), 0).await;

    let first = h.send(msg("c1", "@here anyone around"), 10).await;
    assert!(!texts(&first).contains(&h.en().ping_notice.as_str()));

    let second = h.send(msg("c1", "@here hello"), 20).await;
    assert_eq!(texts(&second)[0], h.en().ping_notice);

    let later = h.send(msg("c1", "@here still there"), 20 + 3_601).await;
    assert!(!texts(&later).contains(&h.en().ping_notice.as_str()));
}

#[tokio::test]
async fn one_turn_in_flight_per_conversation() {
    let script = Script::with_delay(Duration::from_millis(20));
    let h = build(
        Config::default(),
        Some(script),
        InMemoryBackend::new().with_team("guild-1", team()),
    );
    h.send(opened("c1", Some("where is my order")), 0).await;

    let a = h.orch.handle_event_at(msg("c1", "first question"), at(10));
    let b = h.orch.handle_event_at(msg("c1", "second question"), at(11));
    let (a, b) = tokio::join!(a, b);
    a.unwrap();
    b.unwrap();

    assert_eq!(h.script.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.conv("c1").exchange_count, 3);
}

// ── Degradation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn exhausted_budget_sends_the_unavailable_reply_without_calling_the_model() {
    let mut config = Config::default();
    config.budget.daily_limit_usd = 1e-9;
    // every call billed at the fallback price
    config.pricing.models.clear();
    let h = build(config, None, InMemoryBackend::new());

    let out = h.send(opened("c1", Some("where is my order")), 0).await;
    assert_eq!(texts(&out), vec![h.en().unavailable.as_str()]);
    assert!(h.llm.budget().is_blocked());
    let calls = h.script.total_calls();
    assert_eq!(calls, 1);

    let out = h.send(msg("c1", "hello?"), 10).await;
    assert_eq!(texts(&out), vec![h.en().unavailable.as_str()]);
    assert_eq!(h.script.total_calls(), calls);
}

#[tokio::test]
async fn missing_provider_sends_the_unavailable_reply() {
    let h = build_with_provider(Config::default(), Script::new(), None, InMemoryBackend::new());
    let out = h.send(opened("c1", Some("where is my order")), 0).await;
    assert_eq!(texts(&out), vec![h.en().unavailable.as_str()]);
}

#[tokio::test]
async fn provider_failure_keeps_the_turn_silent() {
    let h = harness();
    h.script.failing.store(true, Ordering::SeqCst);
    let out = h.send(opened("c1", Some("where is my order")), 0).await;
    assert!(out.is_empty());
    // classification fell back, the conversation still exists
    assert!((h.conv("c1").confidence - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn sink_failures_never_break_the_turn() {
    let h = harness();
    h.backend.set_failing(true);
    h.script.reply(r#"{"response":"let me note that as a task","needs_escalation":false}"#);
    h.script.set("actions", r#"{"actions":[{"type":"task","title":"Check order","confidence":0.9}]}"#);

    let out = h.send(opened("c1", Some("where is my order")), 0).await;
    assert_eq!(texts(&out), vec!["let me note that as a task"]);
}

// ── Recovery ────────────────────────────────────────────────────────────

#[tokio::test]
async fn lost_context_is_rebuilt_from_channel_history() {
    let history = vec![
        HistoryMessage {
            author_id: "bot".into(),
            content: "hey, what's up?".into(),
            is_bot: true,
            is_staff: false,
            at: at(0),
        },
        HistoryMessage {
            author_id: "user-1".into(),
            content: "my build fails".into(),
            is_bot: false,
            is_staff: false,
            at: at(5),
        },
        HistoryMessage {
            author_id: "staff-9".into(),
            content: "checking".into(),
            is_bot: false,
            is_staff: true,
            at: at(6),
        },
        HistoryMessage {
            author_id: "user-1".into(),
            content: "it says missing file".into(),
            is_bot: false,
            is_staff: false,
            at: at(10),
        },
    ];
    let h = build(
        Config::default(),
        None,
        InMemoryBackend::new().with_history("c9", history),
    );
    h.script.set("category", r#"{"category":"bug_report","confidence":0.9}"#);

    let out = h.send(msg("c9", "it says missing file"), 11).await;
    assert_eq!(texts(&out), vec!["sure, tell me more"]);

    let conv = h.conv("c9");
    assert_eq!(conv.category, TicketCategory::BugReport);
    assert_eq!(conv.ticket_id, "c9");
    let roles: Vec<Role> = conv.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::Agent, Role::Counterpart, Role::Counterpart, Role::Agent]);
    assert_eq!(conv.exchange_count, 2);
}

// ── Reply side effects ──────────────────────────────────────────────────

#[tokio::test]
async fn extracted_actions_below_the_floor_are_dropped() {
    let h = harness();
    h.script.reply(r#"{"response":"i'll note that and remind you tomorrow"}"#);
    h.script.set(
        "actions",
        r#"{"actions":[
            {"type":"task","title":"Check order","priority":"high","confidence":0.9},
            {"type":"reminder","content":"follow up","delay_ms":60000,"confidence":0.5}
        ]}"#,
    );
    h.send(opened("c1", Some("where is my order")), 0).await;

    let log = h.backend.log();
    assert_eq!(log.tasks.len(), 1);
    assert_eq!(log.tasks[0].title, "Check order");
    assert_eq!(log.tasks[0].from_ticket_id.as_deref(), Some("t-c1"));
    assert!(log.reminders.is_empty());
}

#[tokio::test]
async fn resolved_envelope_requests_close() {
    let h = harness();
    h.script.reply(r#"{"response":"glad it worked!","is_resolved":true}"#);
    let out = h.send(opened("c1", Some("where is my order")), 0).await;
    assert_eq!(
        out,
        vec![
            OutboundAction::SendText {
                text: "glad it worked!".into()
            },
            OutboundAction::RequestClose,
        ]
    );
}

#[tokio::test]
async fn ticket_is_renamed_once_at_the_second_exchange() {
    let h = harness();
    h.send(opened("c1", Some("where is my order")), 0).await;
    let out = h.send(msg("c1", "order number 4411"), 10).await;

    assert!(out.contains(&OutboundAction::Rename {
        name: "order-status".into()
    }));
    assert_eq!(h.backend.log().renames.len(), 1);

    h.send(msg("c1", "any update"), 20).await;
    assert_eq!(h.script.calls_of("rename"), 1);
}

#[tokio::test]
async fn confident_suggestion_becomes_a_prompt_hint() {
    let h = harness();
    h.script.set("suggestion", r#"{"category":"suggest_service","confidence":0.85}"#);
    h.send(opened("c1", Some("where is my order")), 0).await;
    for i in 2..=4 {
        h.send(msg("c1", &format!("question number {i}")), i * 10).await;
    }

    let conv = h.conv("c1");
    assert_eq!(h.script.calls_of("suggestion"), 1);
    assert_eq!(conv.hints, vec!["service".to_owned()]);
    assert!(conv
        .system_prompt
        .unwrap()
        .contains("consider suggesting: service"));
}

#[tokio::test]
async fn stored_memories_reach_the_prompt() {
    let backend = InMemoryBackend::new().with_memories(
        "guild-1",
        "user-1",
        vec![Memory {
            content: "prefers short answers".into(),
            importance: 8,
        }],
    );
    let h = build(Config::default(), None, backend);
    h.send(opened("c1", Some("where is my order")), 0).await;
    assert_eq!(h.conv("c1").memories, vec!["prefers short answers".to_owned()]);
    assert!(h
        .conv("c1")
        .system_prompt
        .unwrap()
        .contains("prefers short answers"));
}

// ── Close ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn closing_persists_cost_and_derived_memories() {
    let h = harness();
    h.script.set(
        "memories",
        r#"{"memories":[{"content":"runs a survival server","importance":12},{"content":"","importance":3}]}"#,
    );
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(msg("c1", "it was placed monday"), 10).await;

    let out = h.send(closed("c1"), 20).await;
    assert!(out.is_empty());
    assert!(h.store.get("c1").is_none());

    let log = h.backend.log();
    assert_eq!(log.ticket_costs.len(), 1);
    assert_eq!(log.ticket_costs[0].ticket_id, "t-c1");
    assert!(log.ticket_costs[0].total_calls > 0);
    assert_eq!(log.memories.len(), 1);
    assert_eq!(log.memories[0].importance, 10);
}

#[tokio::test]
async fn short_conversations_derive_no_memories() {
    let h = harness();
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(closed("c1"), 10).await;
    assert_eq!(h.script.calls_of("memories"), 0);
    assert_eq!(h.backend.log().ticket_costs.len(), 1);
}

#[tokio::test]
async fn closing_an_unknown_ticket_is_a_no_op() {
    let h = harness();
    let out = h.send(closed("nope"), 0).await;
    assert!(out.is_empty());
    assert!(h.backend.log().ticket_costs.is_empty());
}

// ── Snapshot determinism ────────────────────────────────────────────────

#[tokio::test]
async fn restored_conversation_routes_identically() {
    let h = harness();
    h.script.set("category", LOW_CONFIDENCE);
    h.send(opened("c1", Some("where is my order")), 0).await;
    h.send(msg("c1", "it was placed monday"), 10).await;
    h.send(msg("c1", "order 4411"), 20).await;

    let conv = h.conv("c1");
    let json = serde_json::to_string(&conv).unwrap();
    let back: Conversation = serde_json::from_str(&json).unwrap();

    let policy = &h.config.policy;
    assert_eq!(
        TaskType::for_reply(conv.category, conv.exchange_count),
        TaskType::for_reply(back.category, back.exchange_count)
    );
    for wants_human in [false, true] {
        assert_eq!(
            escalation::pre_reply_trigger(policy, wants_human, conv.exchange_count, conv.confidence),
            escalation::pre_reply_trigger(policy, wants_human, back.exchange_count, back.confidence)
        );
    }
    assert_eq!(
        escalation::low_confidence_trigger(policy, conv.exchange_count, conv.confidence),
        escalation::low_confidence_trigger(policy, back.exchange_count, back.confidence)
    );
    assert_eq!(back.messages, conv.messages);
}
