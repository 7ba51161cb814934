use tp_domain::config::{Config, ConfigSeverity};
use tp_domain::conversation::{Language, TaskType};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3230);
}

#[test]
fn empty_file_parses_to_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert!((config.budget.daily_limit_usd - 5.0).abs() < f64::EPSILON);
    assert_eq!(config.policy.escalation_exchange_ceiling, 12);
    assert_eq!(config.locales.persona_name, "Lucas");
    assert!(config.conversations.snapshot_path.is_none());
}

#[test]
fn cors_config_parses_custom_origins() {
    let toml_str = r#"
[server.cors]
allowed_origins = ["https://dashboard.example.com", "http://localhost:3000"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.cors.allowed_origins.len(), 2);
}

#[test]
fn full_operator_config_parses() {
    let toml_str = r#"
[server]
port = 8080
api_token_env = "BOT_TOKEN"

[llm.provider]
base_url = "http://localhost:4000/v1"

[routing.quick_response]
models = ["local/fast"]
temperature = 0.6
max_tokens = 200

[budget]
daily_limit_usd = 1.0
timezone = "America/New_York"

[policy]
resume_inactivity_secs = 600
action_confidence_floor = 0.8

[knowledge]
ttl_secs = 60

[backend]
base_url = "http://backend:9000"

[conversations]
snapshot_path = "/var/lib/ticketpilot/conversations.json"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.api_token_env, "BOT_TOKEN");
    assert_eq!(
        config.routing.route(TaskType::QuickResponse).models,
        vec!["local/fast".to_string()]
    );
    assert_eq!(config.policy.resume_inactivity_secs, 600);
    assert_eq!(config.knowledge.ttl_secs, 60);
    assert!(config.conversations.snapshot_path.is_some());
    assert!(config
        .validate()
        .iter()
        .all(|e| e.severity != ConfigSeverity::Error));
}

#[test]
fn unordered_budget_thresholds_fail_validation() {
    let toml_str = r#"
[budget.alert_thresholds]
yellow = 85
orange = 80
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.severity == ConfigSeverity::Error && e.field == "budget.alert_thresholds"));
}

#[test]
fn locale_strings_resolve_per_language() {
    let config = Config::default();
    let es = config.locales.strings.get(Language::Es);
    assert_eq!(es.escalate_message("<@1>"), "espera que traigo a <@1>");
}
