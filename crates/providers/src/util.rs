//! Shared utility functions for provider adapters.

use tp_domain::config::AuthConfig;
use tp_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from an [`AuthConfig`].
///
/// Precedence: the plaintext `key` field (warns), then the `env` variable.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        if !key.is_empty() {
            tracing::warn!(
                "API key loaded from plaintext config field 'key'; prefer 'env' instead"
            );
            return Ok(key.clone());
        }
    }

    if let Some(ref env_var) = auth.env {
        return std::env::var(env_var)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Auth(format!(
                    "environment variable '{}' not set or empty",
                    env_var
                ))
            });
    }

    Err(Error::Auth(
        "no API key configured: set 'key' or 'env' in [llm.provider.auth]".into(),
    ))
}
