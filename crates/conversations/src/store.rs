//! In-memory conversation store keyed by channel id.
//!
//! All mutation goes through closures run under the write lock, so a
//! caller never observes a half-applied change. Reads hand out clones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use tp_domain::conversation::{ChatMessage, SentimentSample, TicketCategory};
use tp_domain::error::{Error, Result};
use tp_domain::trace::TraceEvent;

use crate::conversation::{Conversation, ConversationSummary, NewConversation};

pub struct ConversationStore {
    max_history: usize,
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl ConversationStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Load a snapshot written by [`flush`](Self::flush). A missing file
    /// yields an empty store; an unreadable one is an error.
    pub fn load(path: &Path, max_history: usize) -> Result<Self> {
        let store = Self::new(max_history);
        if !path.exists() {
            return Ok(store);
        }
        let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
        let loaded: HashMap<String, Conversation> = serde_json::from_str(&raw)?;
        tracing::info!(
            conversations = loaded.len(),
            path = %path.display(),
            "conversation snapshot loaded"
        );
        *store.conversations.write() = loaded;
        Ok(store)
    }

    /// Write every conversation to `path` as pretty JSON.
    pub fn flush(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(Error::Io)?;
            }
        }
        let json = {
            let conversations = self.conversations.read();
            serde_json::to_string_pretty(&*conversations)?
        };
        let tmp: PathBuf = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, path).map_err(Error::Io)?;
        Ok(())
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn get(&self, channel_id: &str) -> Option<Conversation> {
        self.conversations.read().get(channel_id).cloned()
    }

    pub fn contains(&self, channel_id: &str) -> bool {
        self.conversations.read().contains_key(channel_id)
    }

    /// Return the conversation for `init.channel_id`, creating it if
    /// needed. Returns `(conversation, is_new)`.
    pub fn get_or_create(
        &self,
        init: NewConversation,
        now: DateTime<Utc>,
    ) -> (Conversation, bool) {
        {
            let conversations = self.conversations.read();
            if let Some(existing) = conversations.get(&init.channel_id) {
                return (existing.clone(), false);
            }
        }

        let mut conversations = self.conversations.write();
        // Another writer may have won the race between the two locks.
        if let Some(existing) = conversations.get(&init.channel_id) {
            return (existing.clone(), false);
        }
        let conversation = Conversation::new(init, now);
        conversations.insert(conversation.channel_id.clone(), conversation.clone());

        TraceEvent::ConversationCreated {
            channel_id: conversation.channel_id.clone(),
            awaiting_subject: conversation.awaiting_subject,
        }
        .emit();

        (conversation, true)
    }

    /// Insert a fully built conversation, replacing any previous one.
    pub fn insert(&self, conversation: Conversation) {
        self.conversations
            .write()
            .insert(conversation.channel_id.clone(), conversation);
    }

    pub fn remove(&self, channel_id: &str) -> Option<Conversation> {
        self.conversations.write().remove(channel_id)
    }

    /// Run `f` against the stored conversation. `None` when absent.
    pub fn update<R>(
        &self,
        channel_id: &str,
        f: impl FnOnce(&mut Conversation) -> R,
    ) -> Option<R> {
        let mut conversations = self.conversations.write();
        conversations.get_mut(channel_id).map(f)
    }

    pub fn append_message(&self, channel_id: &str, message: ChatMessage) -> bool {
        let max = self.max_history;
        self.update(channel_id, |c| c.push_message(message, max))
            .is_some()
    }

    pub fn set_classification(
        &self,
        channel_id: &str,
        category: TicketCategory,
        confidence: f32,
    ) -> bool {
        self.update(channel_id, |c| c.set_classification(category, confidence))
            .is_some()
    }

    /// Lower confidence by `amount`, clamped at zero. Returns the new value.
    pub fn reduce_confidence(&self, channel_id: &str, amount: f32) -> Option<f32> {
        self.update(channel_id, |c| {
            c.reduce_confidence(amount);
            c.confidence
        })
    }

    pub fn push_sentiment(&self, channel_id: &str, sample: SentimentSample) -> bool {
        self.update(channel_id, |c| c.push_sentiment(sample)).is_some()
    }

    pub fn mark_escalated(
        &self,
        channel_id: &str,
        assignee_id: Option<String>,
        at: DateTime<Utc>,
    ) -> bool {
        self.update(channel_id, |c| c.mark_escalated(assignee_id, at))
            .is_some()
    }

    pub fn set_system_prompt(&self, channel_id: &str, prompt: String) -> bool {
        self.update(channel_id, |c| c.system_prompt = Some(prompt))
            .is_some()
    }

    pub fn set_memories(&self, channel_id: &str, memories: Vec<String>) -> bool {
        self.update(channel_id, |c| c.memories = memories).is_some()
    }

    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries sorted by most recent activity first.
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        let mut list: Vec<ConversationSummary> = self
            .conversations
            .read()
            .values()
            .map(Conversation::summary)
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list
    }

    /// Channel ids of every escalated conversation.
    pub fn escalated_channels(&self) -> Vec<String> {
        self.conversations
            .read()
            .values()
            .filter(|c| c.is_escalated())
            .map(|c| c.channel_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tp_domain::conversation::Sentiment;

    fn init(channel: &str) -> NewConversation {
        NewConversation {
            channel_id: channel.into(),
            ticket_id: format!("ticket-{channel}"),
            tenant_id: "guild".into(),
            counterpart_id: "user".into(),
        }
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = ConversationStore::new(20);
        let now = Utc::now();
        let (first, new) = store.get_or_create(init("c1"), now);
        assert!(new);
        let (second, new) = store.get_or_create(init("c1"), now);
        assert!(!new);
        assert_eq!(first.ticket_id, second.ticket_id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mutations_on_missing_channel_report_false() {
        let store = ConversationStore::new(20);
        assert!(!store.append_message("nope", ChatMessage::counterpart("hi", Utc::now())));
        assert!(store.reduce_confidence("nope", 0.1).is_none());
    }

    #[test]
    fn append_respects_history_bound() {
        let store = ConversationStore::new(3);
        store.get_or_create(init("c1"), Utc::now());
        for i in 0..5 {
            store.append_message("c1", ChatMessage::counterpart(format!("{i}"), Utc::now()));
        }
        let c = store.get("c1").unwrap();
        assert_eq!(c.messages.len(), 3);
        assert_eq!(c.exchange_count, 5);
    }

    #[test]
    fn reduce_confidence_returns_clamped_value() {
        let store = ConversationStore::new(20);
        store.get_or_create(init("c1"), Utc::now());
        store.set_classification("c1", TicketCategory::BugReport, 0.04);
        assert_eq!(store.reduce_confidence("c1", 0.05), Some(0.0));
    }

    #[test]
    fn prompt_and_memories_are_replaced_in_place() {
        let store = ConversationStore::new(20);
        store.get_or_create(init("c1"), Utc::now());

        assert!(store.set_system_prompt("c1", "first".into()));
        assert!(store.set_system_prompt("c1", "second".into()));
        assert!(store.set_memories("c1", vec!["likes dark mode".into()]));
        assert!(store.set_memories("c1", vec!["prefers email".into(), "on the pro plan".into()]));

        let c = store.get("c1").unwrap();
        assert_eq!(c.system_prompt.as_deref(), Some("second"));
        assert_eq!(c.memories, vec!["prefers email".to_string(), "on the pro plan".to_string()]);

        assert!(!store.set_system_prompt("nope", "x".into()));
        assert!(!store.set_memories("nope", Vec::new()));
        assert!(!store.contains("nope"));
    }

    #[test]
    fn summaries_and_escalated_channels() {
        let store = ConversationStore::new(20);
        store.get_or_create(init("a"), Utc::now());
        store.get_or_create(init("b"), Utc::now());
        store.mark_escalated("b", Some("staff".into()), Utc::now());
        assert_eq!(store.escalated_channels(), vec!["b".to_string()]);
        let summaries = store.summaries();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().any(|s| s.escalated && s.assignee_id.as_deref() == Some("staff")));
    }

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/conversations.json");

        let store = ConversationStore::new(20);
        store.get_or_create(init("c1"), Utc::now());
        store.append_message("c1", ChatMessage::counterpart("hello", Utc::now()));
        store.push_sentiment(
            "c1",
            SentimentSample {
                sentiment: Sentiment::Positive,
                score: 0.9,
                at: Utc::now(),
            },
        );
        store.flush(&path).unwrap();

        let reloaded = ConversationStore::load(&path, 20).unwrap();
        let c = reloaded.get("c1").unwrap();
        assert_eq!(c.messages.len(), 1);
        assert_eq!(c.sentiments.len(), 1);
        assert_eq!(c.exchange_count, 1);
    }

    #[test]
    fn missing_snapshot_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::load(&dir.path().join("none.json"), 20).unwrap();
        assert!(store.is_empty());
    }
}
