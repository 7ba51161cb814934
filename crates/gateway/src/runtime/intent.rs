//! Keyword intent detection and language guessing.
//!
//! The word lists and patterns live in the `[locales]` config table. The
//! orchestrator only talks to the [`IntentClassifier`] trait, so a model
//! based detector can replace the keyword one.

use std::collections::HashSet;

use regex::Regex;

use tp_domain::config::{LanguageWords, LocaleConfig};
use tp_domain::conversation::Language;
use tp_domain::error::{Error, Result};

pub trait IntentClassifier: Send + Sync {
    /// The counterpart is done and the ticket can close.
    fn is_close_intent(&self, text: &str) -> bool;

    /// Explicit request for a human, a manager or a refund.
    fn wants_human(&self, text: &str) -> bool;

    /// Raises the escalation level to high.
    fn is_urgent(&self, text: &str) -> bool;

    /// The agent's own reply already told the counterpart a human is coming.
    fn acknowledges_handoff(&self, reply: &str) -> bool;

    /// Mentions a staff role or the whole group.
    fn mentions_staff(&self, text: &str) -> bool;

    fn detect_language(&self, text: &str) -> Language;
}

pub struct KeywordIntentClassifier {
    escalation: Vec<String>,
    close: Vec<String>,
    urgency: Vec<String>,
    handoff: Vec<String>,
    short_thanks: Regex,
    short_thanks_max_chars: usize,
    ping: Regex,
    words: LanguageWords,
}

impl KeywordIntentClassifier {
    pub fn from_config(cfg: &LocaleConfig) -> Result<Self> {
        let compile = |field: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Config(format!("locales.{field}: {e}")))
        };
        Ok(Self {
            escalation: lowercase(&cfg.escalation_keywords),
            close: lowercase(&cfg.close_keywords),
            urgency: lowercase(&cfg.urgency_keywords),
            handoff: lowercase(&cfg.handoff_ack_keywords),
            short_thanks: compile("short_thanks_pattern", &cfg.short_thanks_pattern)?,
            short_thanks_max_chars: cfg.short_thanks_max_chars,
            ping: compile("ping_pattern", &cfg.ping_pattern)?,
            words: LanguageWords {
                fr: lowercase(&cfg.language_words.fr),
                es: lowercase(&cfg.language_words.es),
                de: lowercase(&cfg.language_words.de),
                pt: lowercase(&cfg.language_words.pt),
            },
        })
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn is_close_intent(&self, text: &str) -> bool {
        let lower = text.trim().to_lowercase();
        if contains_any(&lower, &self.close) {
            return true;
        }
        lower.chars().count() < self.short_thanks_max_chars && self.short_thanks.is_match(&lower)
    }

    fn wants_human(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &self.escalation)
    }

    fn is_urgent(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &self.urgency)
    }

    fn acknowledges_handoff(&self, reply: &str) -> bool {
        contains_any(&reply.to_lowercase(), &self.handoff)
    }

    fn mentions_staff(&self, text: &str) -> bool {
        self.ping.is_match(text)
    }

    /// Highest word-list score wins, ties go to the earlier language and
    /// no hit at all means English. Plain words match whole tokens only;
    /// entries with spaces or punctuation match as substrings.
    fn detect_language(&self, text: &str) -> Language {
        let lower = text.to_lowercase();
        let tokens: HashSet<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let hit = |w: &String| {
            if w.chars().all(char::is_alphanumeric) {
                tokens.contains(w.as_str())
            } else {
                lower.contains(w.as_str())
            }
        };
        let mut best = (Language::En, 0usize);
        for (lang, words) in self.words.candidates() {
            let score = words.iter().filter(|w| hit(w)).count();
            if score > best.1 {
                best = (lang, score);
            }
        }
        best.0
    }
}

fn lowercase(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}
