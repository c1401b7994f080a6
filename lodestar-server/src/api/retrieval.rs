//! Search, contents and answer endpoints

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json as JsonExtractor,
    extract::State,
    response::{
        Json,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt};
use serde_json::Value;

use lodestar::core::{AnswerEvent, AnswerResponse, ContentsResponse, SearchResponse};

use crate::{
    api::dto::{AnswerRequestDto, ContentsRequestDto, SearchRequestDto},
    error::{ServerError, ServerResult},
    state::AppState,
};

/// Ranked search over one workspace
#[utoipa::path(
    post,
    path = "/api/search",
    tag = "retrieval",
    request_body = SearchRequestDto,
    responses(
        (status = 200, description = "Ranked results with diagnostics", body = Value),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 503, description = "Every generator the mode needs failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    JsonExtractor(request): JsonExtractor<SearchRequestDto>,
) -> ServerResult<Json<SearchResponse>> {
    let response = state.engine.search(request.into()).await?;
    Ok(Json(response))
}

/// Batch fetch full items with provenance
#[utoipa::path(
    post,
    path = "/api/contents",
    tag = "retrieval",
    request_body = ContentsRequestDto,
    responses(
        (status = 200, description = "Items found and refs that matched nothing", body = Value),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse)
    )
)]
pub async fn contents(
    State(state): State<Arc<AppState>>,
    JsonExtractor(request): JsonExtractor<ContentsRequestDto>,
) -> ServerResult<Json<ContentsResponse>> {
    let response = state.engine.contents(request.into()).await?;
    Ok(Json(response))
}

/// Cited answer
#[utoipa::path(
    post,
    path = "/api/answer",
    tag = "retrieval",
    request_body = AnswerRequestDto,
    responses(
        (status = 200, description = "Answer text, citations and sources", body = Value),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse)
    )
)]
pub async fn answer(
    State(state): State<Arc<AppState>>,
    JsonExtractor(request): JsonExtractor<AnswerRequestDto>,
) -> ServerResult<Json<AnswerResponse>> {
    let response = state.engine.answer(request.into()).await?;
    Ok(Json(response))
}

fn event_name(event: &AnswerEvent) -> &'static str {
    match event {
        AnswerEvent::Sources { .. } => "sources",
        AnswerEvent::Delta { .. } => "delta",
        AnswerEvent::Done { .. } => "done",
    }
}

fn to_sse(item: lodestar::Result<AnswerEvent>) -> Event {
    let encoded = match item {
        Ok(event) => Event::default().event(event_name(&event)).json_data(&event),
        Err(err) => Event::default()
            .event("error")
            .json_data(ServerError::from(err).to_response_body()),
    };
    encoded.unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// Streamed answer as server-sent events: `sources`, then `delta`s, then `done`
///
/// A failure after the stream started arrives as a final `error` event.
#[utoipa::path(
    post,
    path = "/api/answer/stream",
    tag = "retrieval",
    request_body = AnswerRequestDto,
    responses(
        (status = 200, description = "text/event-stream of sources, delta, done or error events")
    )
)]
pub async fn answer_stream(
    State(state): State<Arc<AppState>>,
    JsonExtractor(request): JsonExtractor<AnswerRequestDto>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state
        .engine
        .answer_stream(request.into())
        .map(|item| Ok::<_, Infallible>(to_sse(item)));
    Sse::new(events).keep_alive(KeepAlive::default())
}
