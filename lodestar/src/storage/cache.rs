//! Read-through caches for current temporal state and graph adjacency
//!
//! Entries expire after a TTL and are evicted least-recently-used. Writers that change
//! temporal state or edges invalidate the affected keys on the same path.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::CacheConfig;
use crate::models::{GraphEdge, NodeRef, TemporalState};

/// LRU cache with per-entry expiry
#[derive(Debug)]
pub struct TtlCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, (Instant, V)>>,
    ttl: Duration,
    enabled: bool,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration, enabled: bool) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            enabled,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => return Some(value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub async fn put(&self, key: K, value: V) {
        if !self.enabled {
            return;
        }
        self.entries.lock().await.put(key, (Instant::now(), value));
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.lock().await.pop(key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// (workspace, entity id, state type)
pub type StateKey = (String, String, String);

/// (workspace, node)
pub type AdjacencyKey = (String, NodeRef);

/// Cache service shared by the temporal accessor and the graph generator
#[derive(Debug)]
pub struct CacheService {
    /// `None` caches a confirmed absence of a current row
    pub current_state: TtlCache<StateKey, Option<TemporalState>>,
    pub adjacency: TtlCache<AdjacencyKey, Vec<GraphEdge>>,
}

impl CacheService {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            current_state: TtlCache::new(config.state_capacity, config.ttl, config.enabled),
            adjacency: TtlCache::new(config.adjacency_capacity, config.ttl, config.enabled),
        }
    }

    pub fn state_key(workspace_id: &str, entity_id: &str, state_type: &str) -> StateKey {
        (
            workspace_id.to_string(),
            entity_id.to_string(),
            state_type.to_string(),
        )
    }

    pub async fn invalidate_state(&self, workspace_id: &str, entity_id: &str, state_type: &str) {
        self.current_state
            .invalidate(&Self::state_key(workspace_id, entity_id, state_type))
            .await;
    }

    pub async fn invalidate_edge(&self, edge: &GraphEdge) {
        for node in [&edge.source, &edge.target] {
            self.adjacency
                .invalidate(&(edge.workspace_id.clone(), node.clone()))
                .await;
        }
    }
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
