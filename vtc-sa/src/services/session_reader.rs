//! Read-only session views across all three domains

use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use vtc_common::identity::{classify, classify_with_status, SessionDomain};
use vtc_common::models::{ProcessingStatus, Session};
use vtc_common::normalize::{normalize_dates, normalize_status, to_display_score, RawDates, SessionDates};
use vtc_common::{generate_metrics, AnalysisResult, Error, Result, SessionMetrics, TranscriptMessage};

use super::access::{authorize_owner, require_credential, resolve_caller, session_not_found, Credentials};
use super::analysis_provider::ProviderError;
use super::conversation_provider::{ConversationProvider, ConversationRecord};
use super::demo_cache::{DemoEntry, SharedDemoCache};
use crate::db::{analysis, analytics, sessions};

/// Canonical session view; the same shape for every domain
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub domain: SessionDomain,
    /// Canonical status, or the mapped provider status for ThirdParty
    pub status: String,
    pub processing_status: Option<ProcessingStatus>,
    pub scenario: Option<String>,
    pub duration_seconds: Option<f64>,
    pub transcript: Vec<TranscriptMessage>,
    pub audio_quality: Option<Value>,
    /// Persisted scale (0–100)
    pub overall_score: Option<f64>,
    /// Presentation scale (0–10)
    pub display_score: Option<f64>,
    pub feedback: Option<String>,
    /// Provider summary (ThirdParty only)
    pub summary: Option<String>,
    #[serde(flatten)]
    pub dates: SessionDates,
}

impl SessionView {
    pub fn from_session(session: &Session, domain: SessionDomain, has_analysis: bool) -> Self {
        let raw = RawDates {
            created_at: Some(session.created_at),
            started_at: session.started_at,
            ended_at: session.ended_at,
            analyzed_at: session.analyzed_at,
            updated_at: session.updated_at,
        };

        Self {
            id: session.id.clone(),
            domain,
            status: normalize_status(&session.status, has_analysis).as_str().to_string(),
            processing_status: session.processing_status,
            scenario: session.scenario.clone(),
            duration_seconds: session.duration_seconds,
            transcript: session.transcript.clone(),
            audio_quality: session.audio_quality.clone(),
            overall_score: session.overall_score,
            display_score: session.overall_score.map(|s| to_display_score(Some(s))),
            feedback: session.feedback.clone(),
            summary: None,
            dates: normalize_dates(raw, chrono::Utc::now()),
        }
    }

    /// Provider sessions are never scored locally
    pub fn from_conversation(record: &ConversationRecord) -> Self {
        let raw = RawDates {
            started_at: record.start_time,
            ended_at: record.end_time,
            ..Default::default()
        };

        Self {
            id: record.conversation_id.clone(),
            domain: SessionDomain::ThirdParty,
            status: record.status.clone(),
            processing_status: None,
            scenario: None,
            duration_seconds: record.duration_seconds,
            transcript: record.transcript.clone(),
            audio_quality: None,
            overall_score: None,
            display_score: None,
            feedback: None,
            summary: record.summary.clone(),
            dates: normalize_dates(raw, chrono::Utc::now()),
        }
    }
}

/// get-session payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    pub session: SessionView,
    pub analysis: Option<AnalysisResult>,
    pub metrics: SessionMetrics,
    pub is_demo: bool,
}

impl SessionDetails {
    fn from_demo_entry(entry: &DemoEntry) -> Self {
        let session = &entry.session;
        Self {
            session: SessionView::from_session(session, SessionDomain::Local, entry.analysis.is_some()),
            analysis: entry.analysis.clone(),
            metrics: entry
                .metrics
                .unwrap_or_else(|| generate_metrics(&session.transcript, session.duration_seconds)),
            is_demo: true,
        }
    }
}

pub struct SessionReader {
    db: SqlitePool,
    demo_cache: SharedDemoCache,
    conversations: Arc<dyn ConversationProvider>,
    internal_secret: Option<String>,
}

impl SessionReader {
    pub fn new(
        db: SqlitePool,
        demo_cache: SharedDemoCache,
        conversations: Arc<dyn ConversationProvider>,
        internal_secret: Option<String>,
    ) -> Self {
        Self {
            db,
            demo_cache,
            conversations,
            internal_secret,
        }
    }

    pub async fn get(&self, session_id: &str, credentials: &Credentials) -> Result<SessionDetails> {
        match classify(session_id) {
            SessionDomain::Local => self
                .demo_cache
                .read()
                .await
                .get(session_id)
                .map(SessionDetails::from_demo_entry)
                .ok_or_else(|| session_not_found(session_id)),
            SessionDomain::ThirdParty => self.get_third_party(session_id).await,
            SessionDomain::Persisted => self.get_persisted(session_id, credentials).await,
        }
    }

    /// Cached demo sessions, most recent first
    pub async fn list_demo(&self) -> Vec<SessionDetails> {
        self.demo_cache
            .read()
            .await
            .list()
            .map(SessionDetails::from_demo_entry)
            .collect()
    }

    async fn get_persisted(&self, session_id: &str, credentials: &Credentials) -> Result<SessionDetails> {
        let caller = resolve_caller(&self.db, self.internal_secret.as_deref(), credentials).await?;
        let session = sessions::load_session(&self.db, session_id).await?;

        // Rows stored with a demo status are served like Local sessions
        if let Some(session) = session.as_ref().filter(|s| is_stored_demo(s)) {
            return self.stored_details(session, SessionDomain::Local).await;
        }

        require_credential(&caller)?;
        let session = session.ok_or_else(|| session_not_found(session_id))?;
        authorize_owner(&caller, &session.id, session.owner_id.as_deref().unwrap_or_default())?;

        self.stored_details(&session, SessionDomain::Persisted).await
    }

    async fn stored_details(&self, session: &Session, domain: SessionDomain) -> Result<SessionDetails> {
        let stored = analysis::load_analysis(&self.db, &session.id).await?;
        let metrics = match analytics::load_metrics(&self.db, &session.id).await? {
            Some(metrics) => metrics,
            None => generate_metrics(&session.transcript, session.duration_seconds),
        };

        Ok(SessionDetails {
            session: SessionView::from_session(session, domain, stored.is_some()),
            is_demo: domain == SessionDomain::Local || stored.as_ref().map_or(false, |s| s.is_mock),
            analysis: stored.map(|s| s.analysis),
            metrics,
        })
    }

    async fn get_third_party(&self, session_id: &str) -> Result<SessionDetails> {
        let record = self
            .conversations
            .fetch_conversation(session_id)
            .await
            .map_err(|err| match err {
                ProviderError::NotFound(_) => session_not_found(session_id),
                other => Error::Internal(format!("conversation provider unavailable: {}", other)),
            })?;

        Ok(SessionDetails {
            metrics: generate_metrics(&record.transcript, record.duration_seconds),
            session: SessionView::from_conversation(&record),
            analysis: None,
            is_demo: false,
        })
    }
}

/// Whether a stored row carries an explicit demo status
pub(crate) fn is_stored_demo(session: &Session) -> bool {
    classify_with_status(&session.id, Some(&session.status)) == SessionDomain::Local
}
