//! Strict parsing of structured model output.
//!
//! Models are asked for bare JSON. The only leniency is a surrounding
//! markdown code fence; anything else that fails the schema is rejected
//! and the caller falls back to its lowest-risk default.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use tp_domain::error::{Error, Result};

/// Parse `text` as exactly one JSON document of type `T`.
pub fn parse_strict<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(strip_fence(text)).map_err(Error::Json)
}

/// Remove one surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
pub fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match body.split_once('\n') {
        Some((info, inner)) if !info.contains('{') => inner.trim(),
        _ => body.trim(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reply envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The JSON object a conversation reply is asked to be.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplyEnvelope {
    pub response: String,
    #[serde(default)]
    pub needs_escalation: bool,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
}

/// What the orchestrator does with a generated reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub needs_escalation: bool,
    pub escalation_reason: Option<String>,
    pub is_resolved: bool,
}

impl Reply {
    /// Honor a valid envelope; otherwise the raw text is the reply.
    pub fn from_model_output(raw: &str) -> Self {
        match parse_strict::<ReplyEnvelope>(raw) {
            Ok(env) if !env.response.trim().is_empty() => Self {
                text: env.response.trim().to_owned(),
                needs_escalation: env.needs_escalation,
                escalation_reason: env.escalation_reason.filter(|r| !r.trim().is_empty()),
                is_resolved: env.is_resolved,
            },
            Ok(_) => Self::plain(""),
            Err(e) => {
                tracing::debug!(error = %e, "reply is not a valid envelope, using raw text");
                Self::plain(raw.trim())
            }
        }
    }

    fn plain(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            needs_escalation: false,
            escalation_reason: None,
            is_resolved: false,
        }
    }
}
