//! API implementation for the Lodestar HTTP server

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
};
use lodestar::storage::BaseStore;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::state::AppState;

pub mod admin;
pub mod dto;
pub mod retrieval;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        retrieval::search,
        retrieval::contents,
        retrieval::answer,
        retrieval::answer_stream,
        admin::merge_actors,
        admin::split_actor,
    ),
    components(
        schemas(
            dto::SearchRequestDto,
            dto::ContentsRequestDto,
            dto::AnswerRequestDto,
            dto::MergeActorsRequest,
            dto::MergeActorsResponse,
            dto::IdentityDto,
            dto::SplitActorRequest,
            dto::SplitActorResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Liveness and capabilities"),
        (name = "retrieval", description = "Search, batch contents and cited answers"),
        (name = "admin", description = "Actor merge and split"),
    ),
    info(
        title = "Lodestar Retrieval API",
        version = "1.0.0",
        description = "Search and answer over a workspace's indexed knowledge and neural memory. Every response carries diagnostics describing the router mode, generator outcomes and any degradation.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

/// Create the main router with all API endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/health", get(health_check))
        .route("/search", post(retrieval::search))
        .route("/contents", post(retrieval::contents))
        .route("/answer", post(retrieval::answer))
        .route("/answer/stream", post(retrieval::answer_stream))
        .route("/admin/actors/merge", post(admin::merge_actors))
        .route("/admin/actors/split", post(admin::split_actor))
        .with_state(state);

    Router::new()
        .nest("/api", api_router)
        .route("/api-docs/openapi.json", get(openapi_json))
}

/// Router plus request tracing, permissive CORS and the configured body size limit
pub fn create_app(state: Arc<AppState>) -> Router {
    let max_request_size = state.config.max_request_size;
    create_router(state)
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Health check endpoint with capability reporting
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health and capabilities", body = serde_json::Value)
    )
)]
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let config = state.engine.config();
    let store_ok = state.engine.store().health_check().await.unwrap_or(false);

    Json(serde_json::json!({
        "status": if store_ok { "OK" } else { "DEGRADED" },
        "version": lodestar::VERSION,
        "capabilities": {
            "embedding": {
                "model": config.ml.embedding.model_name,
                "service": config.ml.embedding.service_type,
                "dimensions": config.ml.embedding.dimensions,
            },
            "rerank": config.rerank.service_type,
            "answer_streaming": true,
        },
        "limits": {
            "default": config.retrieval.default_limit,
            "max": config.retrieval.max_limit,
        }
    }))
}
