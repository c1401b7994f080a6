//! Actor administration endpoints

use std::sync::Arc;

use axum::{Json as JsonExtractor, extract::State, response::Json};

use crate::{
    api::dto::{MergeActorsRequest, MergeActorsResponse, SplitActorRequest, SplitActorResponse},
    error::{ServerResult, bad_request},
    state::AppState,
};

/// Rebuild the profiles a merge or split queued
async fn recompute_profiles(state: &AppState, workspace_id: &str) -> ServerResult<Vec<String>> {
    let profiles = state
        .engine
        .admin()
        .drain_profile_recomputes(workspace_id)
        .await?;
    Ok(profiles.into_iter().map(|p| p.actor_id).collect())
}

/// Merge one actor into another
#[utoipa::path(
    post,
    path = "/api/admin/actors/merge",
    tag = "admin",
    request_body = MergeActorsRequest,
    responses(
        (status = 200, description = "Actors merged (or already merged)", body = MergeActorsResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown actor", body = crate::error::ErrorResponse),
        (status = 409, description = "A concurrent merge or split holds one of the actors", body = crate::error::ErrorResponse)
    )
)]
pub async fn merge_actors(
    State(state): State<Arc<AppState>>,
    JsonExtractor(request): JsonExtractor<MergeActorsRequest>,
) -> ServerResult<Json<MergeActorsResponse>> {
    let outcome = state
        .engine
        .admin()
        .merge(&request.workspace_id, &request.from, &request.into)
        .await?;
    let recomputed = recompute_profiles(&state, &request.workspace_id).await?;
    Ok(Json(MergeActorsResponse::new(outcome, recomputed)))
}

/// Split identities off an actor into a new actor
#[utoipa::path(
    post,
    path = "/api/admin/actors/split",
    tag = "admin",
    request_body = SplitActorRequest,
    responses(
        (status = 200, description = "New actor created", body = SplitActorResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown actor", body = crate::error::ErrorResponse),
        (status = 409, description = "A concurrent merge or split holds the actor", body = crate::error::ErrorResponse)
    )
)]
pub async fn split_actor(
    State(state): State<Arc<AppState>>,
    JsonExtractor(request): JsonExtractor<SplitActorRequest>,
) -> ServerResult<Json<SplitActorResponse>> {
    if request.identities.is_empty() {
        return Err(bad_request("Split needs at least one identity to move"));
    }
    let keys = request.identity_keys();
    let (actor, outcome) = state
        .engine
        .admin()
        .split(&request.workspace_id, &request.from, &keys, &request.display_name)
        .await?;
    let recomputed = recompute_profiles(&state, &request.workspace_id).await?;
    Ok(Json(SplitActorResponse::new(
        actor.id,
        actor.display_name,
        outcome,
        recomputed,
    )))
}
