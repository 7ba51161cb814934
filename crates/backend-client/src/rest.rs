//! REST implementation of [`SupportBackend`].
//!
//! Every call goes through `execute_with_retry`: 5xx answers and transport
//! errors are retried with exponential back-off, 4xx answers are final.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tp_domain::config::BackendConfig;
use tp_domain::conversation::{KnowledgeItem, Memory};
use tp_domain::error::{Error, Result};
use tp_domain::trace::TraceEvent;
use uuid::Uuid;

use crate::backend::SupportBackend;
use crate::types::{
    DaySummaryRecord, EscalationRequest, HistoryMessage, MemoryRequest, ReminderRequest,
    RenameRequest, TaskRequest, TeamMember, TicketCostRecord,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Created once at startup; the inner `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct RestSupportBackend {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl RestSupportBackend {
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.resolve_api_key(),
            max_retries: cfg.max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── request helpers ──────────────────────────────────────────────

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let mut rb = rb
            .header("X-Client-Type", "ticketpilot")
            .header("X-Trace-Id", Uuid::new_v4().to_string());
        if let Some(ref key) = self.api_key {
            rb = rb.bearer_auth(key);
        }
        rb
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        let resp = self
            .execute_with_retry(endpoint, || self.http.get(&url).query(query))
            .await?;
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Backend(format!("{endpoint}: unparseable response: {e}")))
    }

    async fn post_json<B: Serialize + Sync>(&self, endpoint: &str, path: &str, body: &B) -> Result<()> {
        let url = self.url(path);
        self.execute_with_retry(endpoint, || self.http.post(&url).json(body))
            .await?;
        Ok(())
    }

    // ── retry engine ─────────────────────────────────────────────────

    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tracing::debug!(endpoint, attempt, backoff_ms = backoff.as_millis() as u64, "retrying backend call");
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::BackendCall {
                        endpoint: endpoint.to_owned(),
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Backend(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                        continue;
                    }
                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                            return Err(Error::Auth(format!(
                                "{endpoint} auth failed ({status}): {body}"
                            )));
                        }
                        return Err(Error::Backend(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::BackendCall {
                        endpoint: endpoint.to_owned(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Backend(format!("{endpoint}: all retries exhausted"))))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl SupportBackend for RestSupportBackend {
    async fn query_knowledge(&self, tenant_id: &str) -> Result<Vec<KnowledgeItem>> {
        self.get_json(
            "GET /api/tenants/{id}/knowledge",
            &format!("/api/tenants/{tenant_id}/knowledge"),
            &[],
        )
        .await
    }

    async fn query_team_members(
        &self,
        tenant_id: &str,
        specialty: Option<&str>,
        available_only: bool,
    ) -> Result<Vec<TeamMember>> {
        let mut query = vec![("available", available_only.to_string())];
        if let Some(s) = specialty {
            query.push(("specialty", s.to_owned()));
        }
        self.get_json(
            "GET /api/tenants/{id}/team",
            &format!("/api/tenants/{tenant_id}/team"),
            &query,
        )
        .await
    }

    async fn query_user_history(
        &self,
        tenant_id: &str,
        counterpart_id: &str,
    ) -> Result<Vec<Memory>> {
        self.get_json(
            "GET /api/tenants/{id}/users/{id}/memories",
            &format!("/api/tenants/{tenant_id}/users/{counterpart_id}/memories"),
            &[],
        )
        .await
    }

    async fn channel_history(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>> {
        self.get_json(
            "GET /api/channels/{id}/messages",
            &format!("/api/channels/{channel_id}/messages"),
            &[("limit", limit.to_string())],
        )
        .await
    }

    async fn create_task(&self, req: TaskRequest) -> Result<()> {
        self.post_json("POST /api/tasks", "/api/tasks", &req).await
    }

    async fn create_reminder(&self, req: ReminderRequest) -> Result<()> {
        self.post_json("POST /api/reminders", "/api/reminders", &req)
            .await
    }

    async fn create_memory(&self, req: MemoryRequest) -> Result<()> {
        self.post_json("POST /api/memories", "/api/memories", &req)
            .await
    }

    async fn escalate(&self, req: EscalationRequest) -> Result<()> {
        self.post_json("POST /api/escalations", "/api/escalations", &req)
            .await
    }

    async fn save_ticket_cost(&self, record: TicketCostRecord) -> Result<()> {
        self.post_json("POST /api/ticket-costs", "/api/ticket-costs", &record)
            .await
    }

    async fn save_day_summary(&self, record: DaySummaryRecord) -> Result<()> {
        self.post_json("POST /api/day-summaries", "/api/day-summaries", &record)
            .await
    }

    async fn rename_ticket(&self, req: RenameRequest) -> Result<()> {
        let path = format!("/api/channels/{}/rename", req.channel_id);
        self.post_json("POST /api/channels/{id}/rename", &path, &req)
            .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Timeouts become `Error::Timeout`; everything else `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.into(),
            max_retries: 0,
            timeout_ms: 500,
            ..BackendConfig::default()
        }
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = RestSupportBackend::new(&cfg("http://backend:3400/")).unwrap();
        assert_eq!(client.base_url(), "http://backend:3400");
        assert_eq!(client.url("/api/tasks"), "http://backend:3400/api/tasks");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        // Port 1 is never listening on a test host.
        let client = RestSupportBackend::new(&cfg("http://127.0.0.1:1")).unwrap();
        let err = client.query_knowledge("guild").await.unwrap_err();
        assert!(matches!(err, Error::Http(_) | Error::Timeout(_)), "got {err:?}");
    }
}
