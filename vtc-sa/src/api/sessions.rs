//! Session lifecycle handlers
//!
//! POST /api/sessions/start, POST /api/sessions/end, GET /api/sessions/:id,
//! POST /api/sessions/:id/reprocess, GET /api/demo/sessions

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::api::validation::{parse_end_request, parse_start_request, validate_session_id};
use crate::error::{ApiError, ApiResult};
use crate::services::lifecycle::{EndSessionResponse, ReprocessResponse, StartedSession};
use crate::services::session_reader::SessionDetails;
use crate::services::Credentials;
use crate::AppState;

/// Turn a JSON extractor rejection into the service's error body
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// POST /api/sessions/start
pub async fn start_session(
    State(state): State<AppState>,
    credentials: Credentials,
    body: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<StartedSession>)> {
    let request = parse_start_request(body.as_ref().map(|Json(value)| value))?;
    let started = state.lifecycle.start(request, &credentials).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// POST /api/sessions/end
///
/// Succeeds once the end transition is recorded, whatever happens to the
/// analysis it queues.
pub async fn end_session(
    State(state): State<AppState>,
    credentials: Credentials,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<EndSessionResponse>> {
    let request = parse_end_request(&json_body(body)?)?;
    let response = state.lifecycle.end(request, &credentials).await?;
    Ok(Json(response))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionDetails>> {
    let session_id = validate_session_id(&session_id)?;
    let details = state.reader.get(&session_id, &credentials).await?;
    Ok(Json(details))
}

/// POST /api/sessions/:id/reprocess
pub async fn reprocess_session(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(session_id): Path<String>,
) -> ApiResult<(StatusCode, Json<ReprocessResponse>)> {
    let session_id = validate_session_id(&session_id)?;
    let response = state.lifecycle.reprocess(&session_id, &credentials).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[derive(Debug, Serialize)]
pub struct DemoSessionsResponse {
    pub sessions: Vec<SessionDetails>,
}

/// GET /api/demo/sessions
pub async fn list_demo_sessions(State(state): State<AppState>) -> Json<DemoSessionsResponse> {
    Json(DemoSessionsResponse {
        sessions: state.reader.list_demo().await,
    })
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions/start", post(start_session))
        .route("/api/sessions/end", post(end_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/reprocess", post(reprocess_session))
        .route("/api/demo/sessions", get(list_demo_sessions))
}
