//! Per-tenant knowledge cache with a fixed TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tp_backend::SupportBackend;
use tp_domain::conversation::KnowledgeItem;

struct Entry {
    items: Arc<Vec<KnowledgeItem>>,
    fetched_at: Instant,
}

pub struct KnowledgeCache {
    backend: Arc<dyn SupportBackend>,
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl KnowledgeCache {
    pub fn new(backend: Arc<dyn SupportBackend>, ttl_secs: u64) -> Self {
        Self {
            backend,
            ttl: Duration::from_secs(ttl_secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, tenant_id: &str) -> Arc<Vec<KnowledgeItem>> {
        self.get_at(tenant_id, Instant::now()).await
    }

    /// Fresh entries are served from memory. On a failed refresh the stale
    /// copy is served if there is one, else nothing.
    pub async fn get_at(&self, tenant_id: &str, now: Instant) -> Arc<Vec<KnowledgeItem>> {
        let stale = {
            let entries = self.entries.read();
            match entries.get(tenant_id) {
                Some(e) if now.duration_since(e.fetched_at) < self.ttl => return e.items.clone(),
                Some(e) => Some(e.items.clone()),
                None => None,
            }
        };

        match self.backend.query_knowledge(tenant_id).await {
            Ok(items) => {
                let items = Arc::new(items);
                self.entries.write().insert(
                    tenant_id.to_owned(),
                    Entry {
                        items: items.clone(),
                        fetched_at: now,
                    },
                );
                items
            }
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "knowledge refresh failed");
                stale.unwrap_or_default()
            }
        }
    }

    pub fn invalidate(&self, tenant_id: &str) {
        self.entries.write().remove(tenant_id);
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.fetched_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tp_backend::InMemoryBackend;

    fn item(key: &str) -> KnowledgeItem {
        KnowledgeItem {
            category: "shop".into(),
            key: key.into(),
            value: "v".into(),
        }
    }

    #[tokio::test]
    async fn fresh_entries_skip_the_backend() {
        let backend = Arc::new(InMemoryBackend::new().with_knowledge("g", vec![item("hours")]));
        let cache = KnowledgeCache::new(backend.clone(), 300);
        let t0 = Instant::now();
        assert_eq!(cache.get_at("g", t0).await.len(), 1);
        assert_eq!(cache.get_at("g", t0 + Duration::from_secs(299)).await.len(), 1);
        assert_eq!(backend.knowledge_reads(), 1);
        cache.get_at("g", t0 + Duration::from_secs(300)).await;
        assert_eq!(backend.knowledge_reads(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_serves_stale_copy() {
        let backend = Arc::new(InMemoryBackend::new().with_knowledge("g", vec![item("hours")]));
        let cache = KnowledgeCache::new(backend.clone(), 300);
        let t0 = Instant::now();
        cache.get_at("g", t0).await;
        backend.set_failing(true);
        let later = cache.get_at("g", t0 + Duration::from_secs(600)).await;
        assert_eq!(later.len(), 1);
        assert!(cache.get_at("other", t0).await.is_empty());
    }

    #[tokio::test]
    async fn eviction_drops_expired_tenants() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = KnowledgeCache::new(backend, 300);
        let t0 = Instant::now();
        cache.get_at("a", t0).await;
        cache.get_at("b", t0 + Duration::from_secs(200)).await;
        assert_eq!(cache.evict_expired_at(t0 + Duration::from_secs(350)), 1);
        assert_eq!(cache.len(), 1);
        cache.invalidate("b");
        assert!(cache.is_empty());
    }
}
