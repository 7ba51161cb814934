use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pricing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Per-model prices (key = model id as sent to the provider).
    #[serde(default = "d_models")]
    pub models: HashMap<String, ModelPricing>,
    /// Price used for models missing from `models`.
    #[serde(default = "d_fallback")]
    pub fallback: ModelPricing,
    /// Fraction knocked off the input price for cached prompt tokens.
    #[serde(default = "d_cache_discount")]
    pub cache_discount: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            models: d_models(),
            fallback: d_fallback(),
            cache_discount: d_cache_discount(),
        }
    }
}

impl PricingConfig {
    pub fn price_for(&self, model: &str) -> ModelPricing {
        self.models.get(model).copied().unwrap_or(self.fallback)
    }

    /// Cost in USD of one call. `cached` is the part of `input` served from
    /// the provider's prompt cache.
    pub fn cost(&self, model: &str, input: u32, output: u32, cached: u32) -> f64 {
        self.price_for(model)
            .estimate_cost(input, output, cached, self.cache_discount)
    }
}

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Dollars per 1 million input (prompt) tokens.
    pub input_per_1m: f64,
    /// Dollars per 1 million output (completion) tokens.
    pub output_per_1m: f64,
}

impl ModelPricing {
    pub fn estimate_cost(&self, input: u32, output: u32, cached: u32, cache_discount: f64) -> f64 {
        let cached = cached.min(input);
        let regular = (input - cached) as f64 * self.input_per_1m;
        let cached = cached as f64 * self.input_per_1m * (1.0 - cache_discount);
        let out = output as f64 * self.output_per_1m;
        (regular + cached + out) / 1_000_000.0
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn price(input_per_1m: f64, output_per_1m: f64) -> ModelPricing {
    ModelPricing {
        input_per_1m,
        output_per_1m,
    }
}

fn d_models() -> HashMap<String, ModelPricing> {
    let free = [
        "nousresearch/hermes-3-llama-3.1-405b:free",
        "meta-llama/llama-3.3-70b-instruct:free",
        "openai/gpt-oss-120b:free",
        "qwen/qwen3-next-80b-a3b-instruct:free",
        "qwen/qwen3-coder:free",
        "z-ai/glm-4.5-air:free",
        "arcee-ai/trinity-large-preview:free",
        "arcee-ai/trinity-mini:free",
    ];
    let mut m: HashMap<String, ModelPricing> =
        free.iter().map(|id| (id.to_string(), price(0.0, 0.0))).collect();
    m.insert("google/gemini-2.5-flash".into(), price(0.075, 0.30));
    m.insert("google/gemini-2.5-flash-lite-preview".into(), price(0.02, 0.08));
    m.insert("google/gemini-2.5-flash-lite".into(), price(0.075, 0.30));
    m.insert("meta-llama/llama-3.1-8b-instruct".into(), price(0.02, 0.04));
    m.insert("deepseek/deepseek-v3.2".into(), price(0.26, 0.38));
    m.insert("x-ai/grok-4.1-fast".into(), price(0.20, 0.50));
    m
}

fn d_fallback() -> ModelPricing {
    price(0.26, 0.38)
}

fn d_cache_discount() -> f64 {
    0.8
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
