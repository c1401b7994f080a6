//! Administrative actor merge and split
//!
//! The only path that rewrites `actor_id` on existing rows. Each operation runs as one store
//! transaction; on top of that an actor taking part in a merge or split is locked for the
//! duration, and a second operation touching it fails with
//! [`LodestarError::MergeConflict`] instead of waiting.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Actor, ActorProfile, IdentityKey};
use crate::storage::{MergeOutcome, SplitOutcome, WorkspaceStore};
use crate::{LodestarError, Result};

/// Actors currently held by a merge or split, keyed by (workspace, actor)
#[derive(Debug, Default)]
struct ActorLocks {
    held: Mutex<HashSet<(String, String)>>,
}

impl ActorLocks {
    fn acquire(self: &Arc<Self>, workspace_id: &str, actor_ids: &[&str]) -> Result<ActorLockGuard> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(busy) = actor_ids
            .iter()
            .find(|id| held.contains(&(workspace_id.to_string(), id.to_string())))
        {
            return Err(LodestarError::MergeConflict {
                actor_id: busy.to_string(),
            });
        }
        let keys: Vec<(String, String)> = actor_ids
            .iter()
            .map(|id| (workspace_id.to_string(), id.to_string()))
            .collect();
        held.extend(keys.iter().cloned());
        Ok(ActorLockGuard {
            locks: Arc::clone(self),
            keys,
        })
    }
}

/// Releases its actors when dropped
#[derive(Debug)]
struct ActorLockGuard {
    locks: Arc<ActorLocks>,
    keys: Vec<(String, String)>,
}

impl Drop for ActorLockGuard {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(|e| e.into_inner());
        for key in &self.keys {
            held.remove(key);
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityAdmin {
    store: Arc<dyn WorkspaceStore>,
    locks: Arc<ActorLocks>,
}

impl IdentityAdmin {
    pub fn new(store: Arc<dyn WorkspaceStore>) -> Self {
        Self {
            store,
            locks: Arc::new(ActorLocks::default()),
        }
    }

    /// Fold `from` into `into`
    ///
    /// Idempotent: merging an already merged pair again changes nothing.
    pub async fn merge(&self, workspace_id: &str, from: &str, into: &str) -> Result<MergeOutcome> {
        if from == into {
            return Err(LodestarError::Validation(
                "Cannot merge an actor into itself".to_string(),
            ));
        }
        let _guard = self.locks.acquire(workspace_id, &[from, into])?;

        let outcome = self.store.merge_actors(workspace_id, from, into).await?;
        info!(
            workspace_id,
            from,
            into,
            identities = outcome.identities_moved,
            observations = outcome.observations_moved,
            already_merged = outcome.already_merged,
            "Actors merged"
        );
        Ok(outcome)
    }

    /// Move `identities` of `from` to a newly created actor
    pub async fn split(
        &self,
        workspace_id: &str,
        from: &str,
        identities: &[IdentityKey],
        display_name: &str,
    ) -> Result<(Actor, SplitOutcome)> {
        if display_name.trim().is_empty() {
            return Err(LodestarError::Validation(
                "Split needs a display name for the new actor".to_string(),
            ));
        }
        let _guard = self.locks.acquire(workspace_id, &[from])?;

        let actor = Actor {
            id: format!("actor_{}", Uuid::new_v4().simple()),
            workspace_id: workspace_id.to_string(),
            display_name: display_name.to_string(),
            email: None,
            actor_type: Default::default(),
            merged_into: None,
            created_at: Utc::now(),
        };
        let outcome = self
            .store
            .split_actor(workspace_id, from, identities, actor.clone())
            .await?;
        info!(
            workspace_id,
            from,
            new_actor = %actor.id,
            identities = outcome.identities_moved,
            observations = outcome.observations_moved,
            "Actor split"
        );
        Ok((actor, outcome))
    }

    /// Rebuild the profiles queued by merges and splits
    pub async fn drain_profile_recomputes(&self, workspace_id: &str) -> Result<Vec<ActorProfile>> {
        let mut actor_ids = self.store.take_profile_recomputes(workspace_id).await?;
        if actor_ids.is_empty() {
            return Ok(Vec::new());
        }
        actor_ids.sort();

        let observations = self.store.list_observations(workspace_id).await?;
        let mut profiles = Vec::with_capacity(actor_ids.len());
        for actor_id in actor_ids {
            let (own, related): (Vec<_>, Vec<_>) = observations
                .iter()
                .partition(|o| o.actor_id.as_deref() == Some(actor_id.as_str()));

            let mut profile = self
                .store
                .get_profile(workspace_id, &actor_id)
                .await?
                .unwrap_or_else(|| ActorProfile::new(workspace_id, &actor_id));
            profile.recompute(&own, &related);
            debug!(actor_id, observations = own.len(), "Profile recomputed");
            profiles.push(self.store.put_profile(profile).await?);
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ActorIdentity, MappingMethod, Observation, ObservationType, SourceActorRef, SourceType,
    };
    use crate::storage::InMemoryStore;
    use crate::test_support::{self as ts, WS};

    async fn seeded() -> (Arc<dyn WorkspaceStore>, IdentityAdmin) {
        let store: Arc<dyn WorkspaceStore> = Arc::new(InMemoryStore::new());
        for (actor_id, name, source, source_id) in [
            ("a1", "Jane Doe", SourceType::Github, "jdoe"),
            ("a2", "J. Doe", SourceType::Slack, "U1"),
        ] {
            store.put_actor(ts::actor(actor_id, name)).await.unwrap();
            store
                .insert_identity(ActorIdentity::new(
                    IdentityKey::new(WS, source, source_id),
                    actor_id,
                    MappingMethod::Created,
                ))
                .await
                .unwrap();
        }
        for (id, actor_id, source, source_id) in [
            ("o1", "a1", SourceType::Github, "jdoe"),
            ("o2", "a2", SourceType::Slack, "U1"),
        ] {
            let mut obs = ts::observation(id, ObservationType::Change, "Auth change", ts::at(2, 9));
            obs.actor_id = Some(actor_id.to_string());
            obs.source_actor = Some(SourceActorRef {
                source,
                source_id: source_id.to_string(),
            });
            obs.topics = vec!["auth".to_string()];
            store.put_observation(obs).await.unwrap();
        }
        let admin = IdentityAdmin::new(Arc::clone(&store));
        (store, admin)
    }

    async fn sorted_observations(store: &Arc<dyn WorkspaceStore>) -> Vec<Observation> {
        let mut observations = store.list_observations(WS).await.unwrap();
        observations.sort_by(|a, b| a.id.cmp(&b.id));
        observations
    }

    #[tokio::test]
    async fn test_merge_moves_rows_and_is_idempotent() {
        let (store, admin) = seeded().await;

        let first = admin.merge(WS, "a2", "a1").await.unwrap();
        assert_eq!(first.identities_moved, 1);
        assert_eq!(first.observations_moved, 1);
        assert!(!first.already_merged);

        let rebuilt = admin.drain_profile_recomputes(WS).await.unwrap();
        assert_eq!(rebuilt.len(), 1);

        let actors = store.list_actors(WS).await.unwrap();
        let identities = store.identities_for_actor(WS, "a1").await.unwrap();
        let observations = sorted_observations(&store).await;
        let profiles = store.list_profiles(WS).await.unwrap();

        let second = admin.merge(WS, "a2", "a1").await.unwrap();
        assert!(second.already_merged);
        assert_eq!(second.identities_moved, 0);
        assert_eq!(second.observations_moved, 0);

        assert_eq!(store.list_actors(WS).await.unwrap(), actors);
        assert_eq!(store.identities_for_actor(WS, "a1").await.unwrap(), identities);
        assert_eq!(sorted_observations(&store).await, observations);
        assert_eq!(store.list_profiles(WS).await.unwrap(), profiles);
        assert!(admin.drain_profile_recomputes(WS).await.unwrap().is_empty());

        let o2 = store.get_observation(WS, "o2").await.unwrap().unwrap();
        assert_eq!(o2.actor_id.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_locked_actor_rejects_concurrent_merge() {
        let (_, admin) = seeded().await;
        let _held = admin.locks.acquire(WS, &["a1"]).unwrap();

        let result = admin.merge(WS, "a2", "a1").await;
        assert!(matches!(
            result,
            Err(LodestarError::MergeConflict { actor_id }) if actor_id == "a1"
        ));
    }

    #[tokio::test]
    async fn test_lock_released_after_operation() {
        let (_, admin) = seeded().await;
        admin.merge(WS, "a2", "a1").await.unwrap();
        assert!(admin.locks.acquire(WS, &["a1", "a2"]).is_ok());
    }

    #[tokio::test]
    async fn test_split_moves_identity_and_its_observations() {
        let (store, admin) = seeded().await;
        admin.merge(WS, "a2", "a1").await.unwrap();

        let (actor, outcome) = admin
            .split(
                WS,
                "a1",
                &[IdentityKey::new(WS, SourceType::Slack, "U1")],
                "Jordan Doe",
            )
            .await
            .unwrap();
        assert_eq!(outcome.identities_moved, 1);
        assert_eq!(outcome.observations_moved, 1);
        let o2 = store.get_observation(WS, "o2").await.unwrap().unwrap();
        assert_eq!(o2.actor_id.as_deref(), Some(actor.id.as_str()));
        let o1 = store.get_observation(WS, "o1").await.unwrap().unwrap();
        assert_eq!(o1.actor_id.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_drain_recomputes_profiles() {
        let (store, admin) = seeded().await;
        admin.merge(WS, "a2", "a1").await.unwrap();

        let profiles = admin.drain_profile_recomputes(WS).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].actor_id, "a1");
        assert_eq!(profiles[0].observation_count, 2);
        assert_eq!(profiles[0].expertise.get("auth"), Some(&1.0));

        assert!(store.get_profile(WS, "a1").await.unwrap().is_some());
        assert!(admin.drain_profile_recomputes(WS).await.unwrap().is_empty());
    }
}
