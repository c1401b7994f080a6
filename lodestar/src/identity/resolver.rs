//! Tiered actor identity resolution
//!
//! Tiers are tried in strict order and each only runs when the previous found nothing:
//!
//! 1. existing (workspace, source, source id) mapping, or a provider-supplied account link
//! 2. email shared with another identity in the workspace (0.85)
//! 3. normalized display-name similarity against active actors (0.60), else a new actor (1.0)
//!
//! Query-time resolution only appends. Every insert relies on the store's uniqueness constraint;
//! losing a race is answered by reading the winner's mapping once.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::IdentityConfig;
use crate::models::{Actor, ActorIdentity, ActorType, IdentityKey, MappingMethod, SourceType};
use crate::query::similarity::name_similarity;
use crate::storage::{StorageError, WorkspaceStore};
use crate::{LodestarError, Result};

/// A source-tool identity seen in an incoming event
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRequest {
    pub workspace_id: String,
    pub source: SourceType,
    pub source_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Actor this account was explicitly connected to by the user
    pub linked_actor_id: Option<String>,
}

impl IdentityRequest {
    pub fn new(workspace_id: &str, source: SourceType, source_id: &str) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            source,
            source_id: source_id.to_string(),
            email: None,
            display_name: None,
            linked_actor_id: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    pub fn with_linked_actor(mut self, actor_id: &str) -> Self {
        self.linked_actor_id = Some(actor_id.to_string());
        self
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.workspace_id, self.source, &self.source_id)
    }
}

/// Canonical actor an identity maps to
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Resolution {
    pub actor_id: String,
    pub method: MappingMethod,
    pub confidence: f32,
    /// This call wrote the mapping
    pub created: bool,
}

impl Resolution {
    fn existing(identity: &ActorIdentity) -> Self {
        Self {
            actor_id: identity.actor_id.clone(),
            method: identity.mapping_method,
            confidence: identity.confidence,
            created: false,
        }
    }

    fn written(identity: &ActorIdentity) -> Self {
        Self {
            created: true,
            ..Self::existing(identity)
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    store: Arc<dyn WorkspaceStore>,
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn WorkspaceStore>, config: IdentityConfig) -> Self {
        Self { store, config }
    }

    pub async fn resolve(&self, request: &IdentityRequest) -> Result<Resolution> {
        if request.workspace_id.is_empty() || request.source_id.is_empty() {
            return Err(LodestarError::Validation(
                "Identity resolution needs a workspace and a source id".to_string(),
            ));
        }
        let key = request.key();

        // Tier 1
        if let Some(identity) = self.store.find_identity(&key).await? {
            debug!(actor_id = %identity.actor_id, method = %identity.mapping_method, "Identity already mapped");
            return Ok(Resolution::existing(&identity));
        }
        if let Some(actor_id) = &request.linked_actor_id {
            return self
                .map_to(request, actor_id, MappingMethod::ExplicitLink)
                .await;
        }

        // Tier 2
        if let Some(email) = request.email.as_deref().filter(|e| !e.trim().is_empty())
            && let Some(other) = self
                .store
                .find_identity_by_email(&request.workspace_id, email)
                .await?
        {
            return self
                .map_to(request, &other.actor_id, MappingMethod::EmailMatch)
                .await;
        }

        // Tier 3
        if let Some(name) = request.display_name.as_deref()
            && let Some(actor_id) = self.best_name_match(&request.workspace_id, name).await?
        {
            return self
                .map_to(request, &actor_id, MappingMethod::Heuristic)
                .await;
        }

        self.create(request).await
    }

    /// Active actor with the most similar display name, if similar enough
    async fn best_name_match(&self, workspace_id: &str, name: &str) -> Result<Option<String>> {
        let threshold = self.config.name_similarity_threshold;
        let best = self
            .store
            .list_actors(workspace_id)
            .await?
            .into_iter()
            .filter(Actor::is_active)
            .map(|actor| (name_similarity(name, &actor.display_name), actor.id))
            .filter(|(similarity, _)| *similarity >= threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(&a.1)));
        Ok(best.map(|(_, id)| id))
    }

    fn identity_for(request: &IdentityRequest, actor_id: &str, method: MappingMethod) -> ActorIdentity {
        ActorIdentity::new(request.key(), actor_id, method)
            .with_email(request.email.clone())
            .with_display_name(request.display_name.clone())
    }

    async fn map_to(
        &self,
        request: &IdentityRequest,
        actor_id: &str,
        method: MappingMethod,
    ) -> Result<Resolution> {
        let identity = Self::identity_for(request, actor_id, method);
        match self.store.insert_identity(identity).await {
            Ok(identity) => {
                info!(
                    source = %request.source,
                    source_id = %request.source_id,
                    actor_id,
                    method = %method,
                    "Identity mapped to existing actor"
                );
                Ok(Resolution::written(&identity))
            }
            Err(StorageError::AlreadyExists(_)) => self.reuse_winner(request).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, request: &IdentityRequest) -> Result<Resolution> {
        let actor = Actor {
            id: format!("actor_{}", Uuid::new_v4().simple()),
            workspace_id: request.workspace_id.clone(),
            display_name: request
                .display_name
                .clone()
                .unwrap_or_else(|| request.source_id.clone()),
            email: request.email.clone(),
            actor_type: ActorType::Human,
            merged_into: None,
            created_at: Utc::now(),
        };
        let identity = Self::identity_for(request, &actor.id, MappingMethod::Created);

        match self.store.create_actor_with_identity(actor, identity).await {
            Ok((actor, identity)) => {
                info!(
                    source = %request.source,
                    source_id = %request.source_id,
                    actor_id = %actor.id,
                    "New actor created for unmatched identity"
                );
                Ok(Resolution::written(&identity))
            }
            Err(StorageError::AlreadyExists(_)) => self.reuse_winner(request).await,
            Err(e) => Err(e.into()),
        }
    }

    /// A concurrent call inserted the same key first; read its mapping once
    async fn reuse_winner(&self, request: &IdentityRequest) -> Result<Resolution> {
        match self.store.find_identity(&request.key()).await? {
            Some(identity) => {
                debug!(actor_id = %identity.actor_id, "Lost identity insert race; reusing winner");
                Ok(Resolution::existing(&identity))
            }
            None => {
                let err = LodestarError::IdentityConflict {
                    workspace_id: request.workspace_id.clone(),
                    source_type: request.source.to_string(),
                    source_id: request.source_id.clone(),
                };
                warn!(error = %err, "Identity conflict could not be resolved by lookup");
                Err(err)
            }
        }
    }
}
