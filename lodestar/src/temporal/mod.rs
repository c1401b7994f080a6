//! Temporal state accessor
//!
//! Reads current, point-in-time and historical entity state from the append-only history.
//! Current-state lookups go through the read-through cache; [`TemporalService::record_transition`]
//! is the write path and invalidates the cached row it replaces.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::models::{TemporalState, verify_timeline};
use crate::query::TimeWindow;
use crate::storage::{CacheService, WorkspaceStore};
use crate::{LodestarError, Result};

#[derive(Debug, Clone)]
pub struct TemporalService {
    store: Arc<dyn WorkspaceStore>,
    cache: Arc<CacheService>,
}

impl TemporalService {
    pub fn new(store: Arc<dyn WorkspaceStore>, cache: Arc<CacheService>) -> Self {
        Self { store, cache }
    }

    /// The row with `is_current = true` for (entity, state type)
    pub async fn current(
        &self,
        workspace_id: &str,
        entity_id: &str,
        state_type: &str,
    ) -> Result<Option<TemporalState>> {
        let key = CacheService::state_key(workspace_id, entity_id, state_type);
        if let Some(cached) = self.cache.current_state.get(&key).await {
            debug!(entity_id, state_type, "Current state served from cache");
            return Ok(cached);
        }
        let state = self
            .store
            .current_state(workspace_id, entity_id, state_type)
            .await?;
        self.cache.current_state.put(key, state.clone()).await;
        Ok(state)
    }

    /// Current rows of every state type recorded for the entity
    pub async fn current_states(
        &self,
        workspace_id: &str,
        entity_id: &str,
    ) -> Result<Vec<TemporalState>> {
        let state_types: BTreeSet<String> = self
            .store
            .state_history(workspace_id, entity_id, None)
            .await?
            .into_iter()
            .map(|s| s.state_type)
            .collect();
        let mut states = Vec::new();
        for state_type in state_types {
            if let Some(state) = self.current(workspace_id, entity_id, &state_type).await? {
                states.push(state);
            }
        }
        Ok(states)
    }

    /// Rows whose `[valid_from, valid_to)` contains `at`; one per state type
    pub async fn at(
        &self,
        workspace_id: &str,
        entity_id: &str,
        state_type: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Vec<TemporalState>> {
        Ok(self
            .store
            .state_history(workspace_id, entity_id, state_type)
            .await?
            .into_iter()
            .filter(|s| s.contains(at))
            .collect())
    }

    /// Every row of the entity ordered by `valid_from`
    pub async fn history(
        &self,
        workspace_id: &str,
        entity_id: &str,
        state_type: Option<&str>,
    ) -> Result<Vec<TemporalState>> {
        Ok(self
            .store
            .state_history(workspace_id, entity_id, state_type)
            .await?)
    }

    /// Rows whose validity intersects the window
    pub async fn in_window(
        &self,
        workspace_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<TemporalState>> {
        Ok(self
            .store
            .states_in_window(workspace_id, window.start, window.end)
            .await?)
    }

    /// Close the current row and append `state` as the new current row
    ///
    /// Returns the closed row. The timeline of (entity, state type) is re-verified afterwards.
    pub async fn record_transition(&self, state: TemporalState) -> Result<Option<TemporalState>> {
        let workspace_id = state.workspace_id.clone();
        let entity_id = state.entity_id.clone();
        let state_type = state.state_type.clone();

        let closed = self.store.record_transition(state).await?;
        self.cache
            .invalidate_state(&workspace_id, &entity_id, &state_type)
            .await;

        self.verify(&workspace_id, &entity_id, &state_type).await?;
        info!(
            workspace_id,
            entity_id,
            state_type,
            closed = closed.as_ref().map(|s| s.id.as_str()),
            "Temporal state transition recorded"
        );
        Ok(closed)
    }

    /// Check the timeline invariant for (entity, state type)
    pub async fn verify(&self, workspace_id: &str, entity_id: &str, state_type: &str) -> Result<()> {
        let history = self
            .store
            .state_history(workspace_id, entity_id, Some(state_type))
            .await?;
        verify_timeline(&history).map_err(|violation| {
            error!(entity_id, state_type, %violation, "Timeline invariant violated");
            LodestarError::Validation(violation.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::test_support::{self as ts, WS};

    async fn service() -> (Arc<dyn WorkspaceStore>, TemporalService) {
        let store: Arc<dyn WorkspaceStore> = Arc::new(InMemoryStore::new());
        store
            .put_state(ts::state("s1", "checkout", "healthy", ts::at(1, 0), Some(ts::at(5, 0))))
            .await
            .unwrap();
        store
            .put_state(ts::state("s2", "checkout", "degraded", ts::at(5, 0), None))
            .await
            .unwrap();
        let service = TemporalService::new(Arc::clone(&store), Arc::new(CacheService::default()));
        (store, service)
    }

    #[tokio::test]
    async fn test_current_point_in_time_and_history() {
        let (_, service) = service().await;

        let current = service.current(WS, "checkout", "status").await.unwrap().unwrap();
        assert_eq!(current.id, "s2");

        let past = service.at(WS, "checkout", None, ts::at(3, 12)).await.unwrap();
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].state_value, "healthy");

        // Half-open: the boundary instant belongs to the newer row
        let boundary = service.at(WS, "checkout", None, ts::at(5, 0)).await.unwrap();
        assert_eq!(boundary[0].id, "s2");

        let history = service.history(WS, "checkout", None).await.unwrap();
        assert_eq!(
            history.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["s1", "s2"]
        );
    }

    #[tokio::test]
    async fn test_transition_invalidates_cached_current_state() {
        let (_, service) = service().await;
        // Warm the cache
        assert_eq!(
            service.current(WS, "checkout", "status").await.unwrap().unwrap().id,
            "s2"
        );

        let closed = service
            .record_transition(ts::state("s3", "checkout", "healthy", ts::at(8, 0), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.id, "s2");
        assert_eq!(closed.valid_to, Some(ts::at(8, 0)));

        let current = service.current(WS, "checkout", "status").await.unwrap().unwrap();
        assert_eq!(current.id, "s3");
        service.verify(WS, "checkout", "status").await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_transition_is_rejected() {
        let (_, service) = service().await;
        let result = service
            .record_transition(ts::state("s0", "checkout", "healthy", ts::at(2, 0), None))
            .await;
        assert!(result.is_err());
        assert_eq!(
            service.current(WS, "checkout", "status").await.unwrap().unwrap().id,
            "s2"
        );
    }

    #[tokio::test]
    async fn test_current_states_cover_every_state_type() {
        let (store, service) = service().await;
        let mut owner = ts::state("o1", "checkout", "payments-team", ts::at(2, 0), None);
        owner.state_type = "owner".to_string();
        store.put_state(owner).await.unwrap();

        let states = service.current_states(WS, "checkout").await.unwrap();
        let mut values: Vec<&str> = states.iter().map(|s| s.state_value.as_str()).collect();
        values.sort();
        assert_eq!(values, vec!["degraded", "payments-team"]);
    }
}
