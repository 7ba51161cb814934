/// Shared error type used across all TicketPilot crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// The provider answered 429; the model should be benched for a while.
    #[error("rate limited on {model}")]
    RateLimited { model: String },

    #[error("backend: {0}")]
    Backend(String),

    #[error("budget exhausted: ${spent:.4} of ${limit:.2} spent today")]
    BudgetExhausted { spent: f64, limit: f64 },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
