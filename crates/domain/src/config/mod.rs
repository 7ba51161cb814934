mod backend;
mod budget;
mod conversations;
mod knowledge;
mod llm;
mod locale;
mod observability;
mod policy;
mod pricing;
mod routing;
mod server;

pub use backend::*;
pub use budget::*;
pub use conversations::*;
pub use knowledge::*;
pub use llm::*;
pub use locale::*;
pub use observability::*;
pub use policy::*;
pub use pricing::*;
pub use routing::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conversation::TaskType;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub locales: LocaleConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub conversations: ConversationsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.llm.provider.base_url.is_empty() {
            errors.push(ConfigError::error(
                "llm.provider.base_url",
                "provider base_url must not be empty",
            ));
        }
        let auth = &self.llm.provider.auth;
        if auth.key.as_deref().unwrap_or("").is_empty() && auth.env.is_none() {
            errors.push(ConfigError::warning(
                "llm.provider.auth",
                "no key or env configured; every turn will take the unavailable path",
            ));
        }

        for task in TaskType::ALL {
            let route = self.routing.route(task);
            if route.models.is_empty() {
                errors.push(ConfigError::error(
                    format!("routing.{task}.models"),
                    "model list must not be empty",
                ));
            }
            if route.max_tokens == 0 {
                errors.push(ConfigError::error(
                    format!("routing.{task}.max_tokens"),
                    "max_tokens must be greater than 0",
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.pricing.cache_discount) {
            errors.push(ConfigError::error(
                "pricing.cache_discount",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.budget.daily_limit_usd <= 0.0 {
            errors.push(ConfigError::error(
                "budget.daily_limit_usd",
                "daily limit must be greater than 0",
            ));
        }
        if !self.budget.alert_thresholds.is_ascending() {
            errors.push(ConfigError::error(
                "budget.alert_thresholds",
                "thresholds must be strictly ascending (yellow < orange < red < hard_stop)",
            ));
        }

        for (name, value) in self.policy.confidences() {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError::error(
                    format!("policy.{name}"),
                    "confidence must be between 0.0 and 1.0",
                ));
            }
        }
        if self.policy.max_history == 0 {
            errors.push(ConfigError::error(
                "policy.max_history",
                "history bound must be greater than 0",
            ));
        }

        for (field, pattern) in [
            ("locales.short_thanks_pattern", &self.locales.short_thanks_pattern),
            ("locales.ping_pattern", &self.locales.ping_pattern),
        ] {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ConfigError::error(field, format!("invalid regex: {e}")));
            }
        }
        if self.locales.escalation_keywords.is_empty() {
            errors.push(ConfigError::warning(
                "locales.escalation_keywords",
                "no keywords; explicit requests for a human will not escalate",
            ));
        }

        if !self.backend.enabled {
            errors.push(ConfigError::warning(
                "backend.enabled",
                "backend disabled; knowledge, team and memories are empty and sinks are not persisted",
            ));
        } else if self.backend.base_url.is_empty() {
            errors.push(ConfigError::error(
                "backend.base_url",
                "base_url must not be empty",
            ));
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_only(cfg: &Config) -> Vec<ConfigError> {
        cfg.validate()
            .into_iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect()
    }

    #[test]
    fn default_config_has_no_errors() {
        assert!(errors_only(&Config::default()).is_empty());
    }

    #[test]
    fn zero_budget_is_an_error() {
        let mut cfg = Config::default();
        cfg.budget.daily_limit_usd = 0.0;
        let errs = errors_only(&cfg);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "budget.daily_limit_usd");
    }

    #[test]
    fn broken_ping_regex_is_reported() {
        let mut cfg = Config::default();
        cfg.locales.ping_pattern = "(unclosed".into();
        let errs = errors_only(&cfg);
        assert!(errs.iter().any(|e| e.field == "locales.ping_pattern"));
    }

    #[test]
    fn empty_waterfall_names_the_task() {
        let mut cfg = Config::default();
        cfg.routing.summary.models.clear();
        let errs = errors_only(&cfg);
        assert!(errs.iter().any(|e| e.field == "routing.summary.models"));
    }

    #[test]
    fn out_of_range_confidence_is_an_error() {
        let mut cfg = Config::default();
        cfg.policy.low_confidence_floor = 1.5;
        let errs = errors_only(&cfg);
        assert!(errs.iter().any(|e| e.field == "policy.low_confidence_floor"));
    }

    #[test]
    fn wildcard_cors_is_only_a_warning() {
        let mut cfg = Config::default();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.severity == ConfigSeverity::Warning
                && e.field == "server.cors.allowed_origins"));
        assert!(errors_only(&cfg).is_empty());
    }

    #[test]
    fn display_format_matches_cli_output() {
        let e = ConfigError::error("server.port", "port must be greater than 0");
        assert_eq!(e.to_string(), "[ERROR] server.port: port must be greater than 0");
    }
}
