//! vtc-sa library interface for testing
//!
//! Exposes the router and state so integration tests can drive the API
//! without binding a socket.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{
    AnalysisOrchestrator, AnalysisProvider, AnalysisQueue, ConversationProvider, DemoCache,
    OrchestratorSettings, SessionLifecycle, SessionReader, SharedDemoCache,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<ServiceConfig>,
    /// Local-domain sessions
    pub demo_cache: SharedDemoCache,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub lifecycle: Arc<SessionLifecycle>,
    pub reader: Arc<SessionReader>,
    pub analysis_queue: AnalysisQueue,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background analysis failure, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire up services; starts the analysis queue worker, so this must run
    /// inside a Tokio runtime
    pub fn new(
        db: SqlitePool,
        config: ServiceConfig,
        analysis_provider: Arc<dyn AnalysisProvider>,
        conversations: Arc<dyn ConversationProvider>,
    ) -> Self {
        let demo_cache = DemoCache::shared();
        let last_error = Arc::new(RwLock::new(None));

        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            db.clone(),
            analysis_provider,
            Arc::clone(&conversations),
            Arc::clone(&demo_cache),
            OrchestratorSettings::from_config(&config),
        ));

        let analysis_queue = AnalysisQueue::start(
            Arc::clone(&orchestrator),
            config.analysis_queue_capacity,
            Arc::clone(&last_error),
        );

        let lifecycle = Arc::new(SessionLifecycle::new(
            db.clone(),
            Arc::clone(&demo_cache),
            analysis_queue.clone(),
            config.internal_secret.clone(),
        ));

        let reader = Arc::new(SessionReader::new(
            db.clone(),
            Arc::clone(&demo_cache),
            conversations,
            config.internal_secret.clone(),
        ));

        Self {
            db,
            config: Arc::new(config),
            demo_cache,
            orchestrator,
            lifecycle,
            reader,
            analysis_queue,
            startup_time: Utc::now(),
            last_error,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::session_routes())
        .merge(api::analysis_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
