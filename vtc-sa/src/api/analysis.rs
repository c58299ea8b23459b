//! POST /api/analyze
//!
//! Always answers with a whole analysis unless the request itself is
//! invalid or unauthorized. See `services::orchestrator`.

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde_json::Value;

use crate::api::sessions::json_body;
use crate::api::validation::parse_analyze_request;
use crate::error::ApiResult;
use crate::services::orchestrator::AnalysisOutcome;
use crate::services::Credentials;
use crate::AppState;

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    credentials: Credentials,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<AnalysisOutcome>> {
    let request = parse_analyze_request(&json_body(body)?)?;
    let outcome = state.orchestrator.analyze_guarded(request, credentials).await?;
    Ok(Json(outcome))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/api/analyze", post(analyze))
}
