//! Budget-governed access to the language model.
//!
//! Every call picks its model through the [`ModelRouter`], is refused
//! up front while the [`BudgetGovernor`] is blocked, and is charged after
//! it returns. A failed call falls back to the next model of the task's
//! waterfall once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;

use tp_domain::conversation::{ChatMessage, Role, Sentiment, TaskType};
use tp_domain::error::{Error, Result};
use tp_domain::trace::TraceEvent;
use tp_providers::{ChatRequest, ChatResponse, LlmProvider, Message, ModelRouter};

use crate::runtime::budget::{BudgetGovernor, Charge};
use crate::runtime::reply::parse_strict;

/// Result of [`GovernedClient::classify_text`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentReading {
    pub sentiment: Sentiment,
    pub score: f32,
}

#[derive(Deserialize)]
struct ClassificationJson {
    category: String,
    confidence: f32,
}

#[derive(Deserialize)]
struct SentimentJson {
    sentiment: String,
    score: f32,
}

pub struct GovernedClient {
    provider: Option<Arc<dyn LlmProvider>>,
    router: Arc<ModelRouter>,
    budget: Arc<BudgetGovernor>,
    timeout: Duration,
}

impl GovernedClient {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        router: Arc<ModelRouter>,
        budget: Arc<BudgetGovernor>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            provider,
            router,
            budget,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn budget(&self) -> &BudgetGovernor {
        &self.budget
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// One governed chat call for `task`.
    ///
    /// Fails with [`Error::BudgetExhausted`] without touching the provider
    /// while the budget is blocked.
    pub async fn chat(
        &self,
        task: TaskType,
        messages: Vec<Message>,
        json_mode: bool,
        ticket_id: Option<&str>,
    ) -> Result<ChatResponse> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::Config("no language model provider configured".into()))?;

        if self.budget.is_blocked() {
            return Err(Error::BudgetExhausted {
                spent: self.budget.spent(),
                limit: self.budget.config().daily_limit_usd,
            });
        }

        let decision = self.router.decide(task);
        let mut candidates = decision.waterfall.iter();
        let first = candidates
            .next()
            .ok_or_else(|| Error::Config(format!("no model routed for task {task}")))?;

        let mut req = ChatRequest {
            messages,
            temperature: Some(decision.temperature),
            max_tokens: Some(decision.max_tokens),
            json_mode,
            model: Some(first.clone()),
        };

        let err = match self.try_model(provider, task, &req, ticket_id).await {
            Ok(resp) => return Ok(resp),
            Err(e) => e,
        };
        self.note_failure(&err);

        let Some(next) = candidates.next() else {
            return Err(err);
        };
        if !should_fall_back(&err) {
            return Err(err);
        }

        tracing::warn!(
            task = task.as_str(),
            from = %first,
            to = %next,
            error = %err,
            "model call failed, trying next model"
        );
        TraceEvent::LlmFallback {
            task_type: task.as_str().to_owned(),
            from_model: first.clone(),
            to_model: next.clone(),
            reason: err.to_string(),
        }
        .emit();

        req.model = Some(next.clone());
        self.try_model(provider, task, &req, ticket_id)
            .await
            .inspect_err(|e| self.note_failure(e))
    }

    /// Plain text generation over a system prompt and a conversation.
    pub async fn generate_text(
        &self,
        system: &str,
        history: &[ChatMessage],
        task: TaskType,
        ticket_id: Option<&str>,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system));
        messages.extend(history.iter().map(|m| match m.role {
            Role::Counterpart => Message::user(m.content.clone()),
            Role::Agent => Message::assistant(m.content.clone()),
        }));
        let resp = self.chat(task, messages, false, ticket_id).await?;
        Ok(resp.content)
    }

    /// Ask for one JSON object. The raw content is returned for strict
    /// parsing by the caller.
    pub async fn complete_json(
        &self,
        task: TaskType,
        system: &str,
        prompt: String,
        ticket_id: Option<&str>,
    ) -> Result<String> {
        let messages = vec![Message::system(system), Message::user(prompt)];
        Ok(self.chat(task, messages, true, ticket_id).await?.content)
    }

    /// Classify `text` into one of `categories`.
    ///
    /// An answer outside `categories` or not matching the schema is an
    /// error; callers pick their own safe default.
    pub async fn classify_text(
        &self,
        text: &str,
        categories: &[&str],
        context: Option<&str>,
        ticket_id: Option<&str>,
    ) -> Result<Classification> {
        let mut prompt = String::from("Classify the following text into one of these categories:\n");
        for c in categories {
            prompt.push_str("- ");
            prompt.push_str(c);
            prompt.push('\n');
        }
        if let Some(ctx) = context {
            prompt.push_str(&format!("\nContext: {ctx}\n"));
        }
        prompt.push_str(&format!(
            "\nText: \"{text}\"\n\nRespond with ONLY a JSON object: {{\"category\": \"...\", \"confidence\": 0.0-1.0}}"
        ));

        let raw = self
            .complete_json(
                TaskType::Classification,
                "You are a text classifier. Respond only with valid JSON.",
                prompt,
                ticket_id,
            )
            .await?;
        let parsed: ClassificationJson = parse_strict(&raw)?;
        let category = parsed.category.trim().to_ascii_lowercase();
        if !categories.iter().any(|c| *c == category) {
            return Err(Error::Other(format!(
                "classifier answered unknown category '{category}'"
            )));
        }
        Ok(Classification {
            category,
            confidence: parsed.confidence.clamp(0.0, 1.0),
        })
    }

    pub async fn analyze_sentiment(
        &self,
        text: &str,
        ticket_id: Option<&str>,
    ) -> Result<SentimentReading> {
        let prompt = format!(
            "Analyze the sentiment of this text from a support ticket.\n\
             Categories: positive, negative, neutral, frustrated\n\n\
             Text: \"{text}\"\n\n\
             Respond with ONLY a JSON object: {{\"sentiment\": \"...\", \"score\": 0.0-1.0}}\n\
             Score: 0 = very negative/frustrated, 0.5 = neutral, 1 = very positive"
        );
        let raw = self
            .complete_json(
                TaskType::Sentiment,
                "You are a sentiment analyzer. Respond only with valid JSON.",
                prompt,
                ticket_id,
            )
            .await?;
        let parsed: SentimentJson = parse_strict(&raw)?;
        let sentiment = Sentiment::from_label(&parsed.sentiment).ok_or_else(|| {
            Error::Other(format!("unknown sentiment label '{}'", parsed.sentiment))
        })?;
        Ok(SentimentReading {
            sentiment,
            score: parsed.score.clamp(0.0, 1.0),
        })
    }

    // ── Private ──────────────────────────────────────────────────────

    async fn try_model(
        &self,
        provider: &Arc<dyn LlmProvider>,
        task: TaskType,
        req: &ChatRequest,
        ticket_id: Option<&str>,
    ) -> Result<ChatResponse> {
        let model = req.model.clone().unwrap_or_default();
        let start = Instant::now();
        let resp = match tokio::time::timeout(self.timeout, provider.chat(req)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "model '{model}' timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        self.router.record_usage(&model);

        let usage = resp.usage.unwrap_or_default();
        TraceEvent::LlmRequest {
            provider: provider.provider_id().to_owned(),
            model: model.clone(),
            task_type: task.as_str().to_owned(),
            duration_ms,
            prompt_tokens: resp.usage.map(|u| u.prompt_tokens),
            completion_tokens: resp.usage.map(|u| u.completion_tokens),
            cached_tokens: resp.usage.map(|u| u.cached_tokens),
        }
        .emit();

        let cost = self.budget.price(
            &model,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.cached_tokens,
        );
        self.budget.charge(&Charge {
            cost_usd: cost,
            model,
            task,
            ticket_id: ticket_id.map(str::to_owned),
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
            cached_tokens: usage.cached_tokens,
        });
        Ok(resp)
    }

    fn note_failure(&self, err: &Error) {
        if let Error::RateLimited { model } = err {
            self.router.mark_rate_limited(model);
        }
    }
}

/// Failures that another model might not have.
fn should_fall_back(err: &Error) -> bool {
    !matches!(
        err,
        Error::Auth(_) | Error::Config(_) | Error::BudgetExhausted { .. }
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tp_domain::config::{BudgetConfig, PricingConfig, RoutingConfig};
    use tp_providers::Usage;

    /// Provider answering from a queue and recording requested models.
    pub(crate) struct QueueProvider {
        pub answers: Mutex<VecDeque<Result<String>>>,
        pub models: Mutex<Vec<String>>,
    }

    impl QueueProvider {
        pub(crate) fn new(answers: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                models: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for QueueProvider {
        async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
            let model = req.model.clone().unwrap_or_default();
            self.models.lock().push(model.clone());
            let next = self
                .answers
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Other("queue empty".into())));
            next.map(|content| ChatResponse {
                content,
                usage: Some(Usage {
                    prompt_tokens: 1_000,
                    completion_tokens: 100,
                    total_tokens: 1_100,
                    cached_tokens: 0,
                }),
                model,
                finish_reason: Some("stop".into()),
            })
        }

        fn provider_id(&self) -> &str {
            "queue"
        }
    }

    pub(crate) fn client(provider: Arc<QueueProvider>, limit: f64) -> GovernedClient {
        let budget = Arc::new(BudgetGovernor::new(
            BudgetConfig {
                daily_limit_usd: limit,
                ..BudgetConfig::default()
            },
            PricingConfig::default(),
        ));
        let provider: Arc<dyn LlmProvider> = provider;
        GovernedClient::new(
            Some(provider),
            Arc::new(ModelRouter::new(RoutingConfig::default())),
            budget,
            5_000,
        )
    }

    #[tokio::test]
    async fn classification_parses_and_charges() {
        let provider = QueueProvider::new(vec![Ok(r#"{"category":"Bug_Report","confidence":1.4}"#.into())]);
        let c = client(provider.clone(), 5.0);
        let out = c
            .classify_text("it crashes", &["service_inquiry", "bug_report"], None, Some("t1"))
            .await
            .unwrap();
        assert_eq!(out.category, "bug_report");
        assert_eq!(out.confidence, 1.0);
        assert_eq!(c.budget().status().today.total_requests, 1);
    }

    #[tokio::test]
    async fn unknown_category_fails_closed() {
        let provider = QueueProvider::new(vec![Ok(r#"{"category":"weather","confidence":0.9}"#.into())]);
        let c = client(provider, 5.0);
        assert!(c.classify_text("x", &["a", "b"], None, None).await.is_err());
    }

    #[tokio::test]
    async fn failure_falls_back_to_next_model_once() {
        let provider = QueueProvider::new(vec![
            Err(Error::RateLimited { model: "first".into() }),
            Ok(r#"{"sentiment":"frustrated","score":0.1}"#.into()),
        ]);
        let c = client(provider.clone(), 5.0);
        let reading = c.analyze_sentiment("this is useless", None).await.unwrap();
        assert_eq!(reading.sentiment, Sentiment::Frustrated);

        let models = provider.models.lock().clone();
        assert_eq!(models.len(), 2);
        assert_ne!(models[0], models[1]);
    }

    #[tokio::test]
    async fn two_failures_surface_the_error() {
        let provider = QueueProvider::new(vec![
            Err(Error::Timeout("slow".into())),
            Err(Error::Http("reset".into())),
            Ok("never reached".into()),
        ]);
        let c = client(provider.clone(), 5.0);
        let err = c
            .generate_text("sys", &[], TaskType::Conversation, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert_eq!(provider.models.lock().len(), 2);
    }

    #[tokio::test]
    async fn blocked_budget_never_calls_provider() {
        let provider = QueueProvider::new(vec![Ok("hi".into())]);
        let c = client(provider.clone(), 1.0);
        c.budget().charge(&Charge {
            cost_usd: 2.0,
            model: "m".into(),
            task: TaskType::Conversation,
            ticket_id: None,
            tokens_in: 0,
            tokens_out: 0,
            cached_tokens: 0,
        });
        let err = c
            .generate_text("sys", &[], TaskType::Conversation, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BudgetExhausted { .. }));
        assert!(provider.models.lock().is_empty());
    }

    #[tokio::test]
    async fn missing_provider_is_a_config_error() {
        let c = GovernedClient::new(
            None,
            Arc::new(ModelRouter::new(RoutingConfig::default())),
            Arc::new(BudgetGovernor::new(BudgetConfig::default(), PricingConfig::default())),
            1_000,
        );
        assert!(!c.has_provider());
        let err = c.analyze_sentiment("hi", None).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
