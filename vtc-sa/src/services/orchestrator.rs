//! Analysis orchestrator
//!
//! Runs one analysis end to end:
//! receive → (authorize) → resolve transcript → metrics → qualitative
//! analysis → persist (best-effort) → deliver.
//!
//! Only validation and authorization errors leave this module as errors.
//! Provider failures and timeouts degrade to the mock generator with the
//! real metrics kept; storage failures are logged and swallowed; anything
//! unexpected is caught by [`AnalysisOrchestrator::analyze_guarded`] and
//! turned into a fully mock response.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use vtc_common::identity::{classify, SessionDomain};
use vtc_common::models::{ProcessingStatus, RequesterInfo, Session, SessionStatus};
use vtc_common::normalize::to_persisted_score;
use vtc_common::transcript::{dialogue_text, plain_text};
use vtc_common::{generate_metrics, AnalysisResult, Error, Result, SessionMetrics, TranscriptMessage};

use super::access::{
    authorize_owner, require_credential, resolve_caller, session_not_found, Caller, Credentials,
};
use super::analysis_provider::{AnalysisPrompt, AnalysisProvider, ProviderError};
use super::analysis_queue::AnalysisJob;
use super::conversation_provider::ConversationProvider;
use super::demo_cache::{DemoEntry, SharedDemoCache};
use super::mock_analysis::{generate_mock_analysis, mock_transcript, MOCK_TRANSCRIPT_DURATION_SECS};
use super::session_reader::is_stored_demo;
use crate::config::ServiceConfig;
use crate::db::{analysis, analytics, audit, sessions};
use crate::db::audit::AuditAction;

/// Longest feedback summary stored on the session row
pub const FEEDBACK_MAX_CHARS: usize = 500;

/// Tunables taken from the service configuration
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub min_transcript_chars: usize,
    pub provider_timeout: Duration,
    pub store_timeout: Duration,
    pub internal_secret: Option<String>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            min_transcript_chars: config.min_transcript_chars,
            provider_timeout: config.analysis.timeout,
            store_timeout: config.store_timeout,
            internal_secret: config.internal_secret.clone(),
        }
    }
}

/// Typed analyze request (built from the validated request body)
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub session_id: String,
    pub transcript: Option<Vec<TranscriptMessage>>,
    pub duration_seconds: Option<f64>,
    pub requester: Option<RequesterInfo>,
}

/// Where the delivered analysis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Real provider result
    Provider,
    /// Transcript too short or provider unconfigured
    Mock,
    /// Provider failed, timed out or returned an invalid document
    Fallback,
    /// Pipeline failure; transcript is mock too
    Catastrophic,
}

impl AnalysisSource {
    pub fn is_mock(self) -> bool {
        self != AnalysisSource::Provider
    }
}

/// Result delivered to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub analysis: AnalysisResult,
    pub metrics: SessionMetrics,
    pub is_demo: bool,
    pub analysis_source: AnalysisSource,
    /// Only set on the catastrophic path, where the transcript is mock
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptMessage>>,
    /// Whether the Persisted-domain write landed
    #[serde(skip)]
    pub persisted: bool,
}

/// Fully mock response: mock transcript, its metrics, mock analysis
pub fn catastrophic_outcome() -> AnalysisOutcome {
    let transcript = mock_transcript();
    let metrics = generate_metrics(&transcript, Some(MOCK_TRANSCRIPT_DURATION_SECS));
    AnalysisOutcome {
        analysis: generate_mock_analysis(),
        metrics,
        is_demo: true,
        analysis_source: AnalysisSource::Catastrophic,
        transcript: Some(transcript),
        persisted: false,
    }
}

enum Authority {
    Credentials(Credentials),
    /// Background jobs queued by an already-authorized request
    Trusted,
}

pub struct AnalysisOrchestrator {
    db: SqlitePool,
    provider: Arc<dyn AnalysisProvider>,
    conversations: Arc<dyn ConversationProvider>,
    demo_cache: SharedDemoCache,
    settings: OrchestratorSettings,
}

impl AnalysisOrchestrator {
    pub fn new(
        db: SqlitePool,
        provider: Arc<dyn AnalysisProvider>,
        conversations: Arc<dyn ConversationProvider>,
        demo_cache: SharedDemoCache,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            db,
            provider,
            conversations,
            demo_cache,
            settings,
        }
    }

    /// Analyze on behalf of an HTTP caller
    ///
    /// Runs the pipeline on its own task so a panic is contained. Caller-facing
    /// errors (validation, authorization) are returned; any other failure
    /// becomes [`catastrophic_outcome`].
    pub async fn analyze_guarded(
        self: &Arc<Self>,
        request: AnalyzeRequest,
        credentials: Credentials,
    ) -> Result<AnalysisOutcome> {
        let session_id = request.session_id.clone();
        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            orchestrator
                .execute(request, Authority::Credentials(credentials))
                .await
        });

        match handle.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) if err.is_caller_facing() => Err(err),
            Ok(Err(err)) => {
                error!(session_id = %session_id, error = %err, "Analysis pipeline failed; returning mock session");
                Ok(catastrophic_outcome())
            }
            Err(join_err) => {
                error!(session_id = %session_id, error = %join_err, "Analysis pipeline aborted; returning mock session");
                Ok(catastrophic_outcome())
            }
        }
    }

    /// Analyze a queued job; the enqueuing request was already authorized
    pub async fn run_job(&self, job: AnalysisJob) -> Result<AnalysisOutcome> {
        let request = AnalyzeRequest {
            session_id: job.session_id,
            transcript: Some(job.transcript),
            duration_seconds: job.duration_seconds,
            requester: None,
        };
        self.execute(request, Authority::Trusted).await
    }

    /// Record a failed background analysis
    ///
    /// Closes the `analyzing` sub-state so the session does not look stuck.
    /// Best-effort like every other write here.
    pub async fn record_failure(&self, session_id: &str, message: &str) {
        if classify(session_id) != SessionDomain::Persisted {
            return;
        }

        let write = async {
            sessions::set_processing_status(&self.db, session_id, ProcessingStatus::Completed).await?;
            let mut conn = self.db.acquire().await?;
            audit::record(
                &mut conn,
                session_id,
                None,
                AuditAction::AnalysisFailed,
                Some(json!({ "error": message })),
            )
            .await
        };

        match timeout(self.settings.store_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(session_id, error = %err, "Failed to record analysis failure"),
            Err(_) => error!(session_id, "Timed out recording analysis failure"),
        }
    }

    async fn execute(&self, request: AnalyzeRequest, authority: Authority) -> Result<AnalysisOutcome> {
        let domain = classify(&request.session_id);

        // Local and ThirdParty sessions skip authentication entirely
        let stored = match domain {
            SessionDomain::Persisted => {
                Some(self.authorized_session(&request.session_id, &authority).await?)
            }
            SessionDomain::Local | SessionDomain::ThirdParty => None,
        };

        // Stored demo rows are analyzed but never rewritten
        let stored_demo = stored.as_ref().map_or(false, is_stored_demo);

        let (transcript, duration_seconds) =
            self.resolve_transcript(&request, domain, stored.as_ref()).await?;

        let metrics = generate_metrics(&transcript, duration_seconds);
        let (analysis, source) = self
            .obtain_analysis(&transcript, duration_seconds, metrics, request.requester.clone())
            .await;

        let persisted = match (domain, stored.as_ref()) {
            (SessionDomain::Persisted, Some(session)) if !stored_demo => {
                self.persist(session, &analysis, &metrics, source).await
            }
            (SessionDomain::Local, _) => {
                self.cache_local(&request.session_id, &transcript, duration_seconds, &analysis, metrics)
                    .await;
                false
            }
            _ => false,
        };

        let is_demo = source.is_mock() || domain == SessionDomain::Local || stored_demo;
        info!(
            session_id = %request.session_id,
            domain = ?domain,
            source = ?source,
            is_demo,
            persisted,
            "Analysis delivered"
        );

        Ok(AnalysisOutcome {
            analysis,
            metrics,
            is_demo,
            analysis_source: source,
            transcript: None,
            persisted,
        })
    }

    async fn authorized_session(&self, session_id: &str, authority: &Authority) -> Result<Session> {
        let caller = match authority {
            Authority::Trusted => Caller::Internal,
            Authority::Credentials(credentials) => {
                resolve_caller(&self.db, self.settings.internal_secret.as_deref(), credentials).await?
            }
        };
        let session = sessions::load_session(&self.db, session_id).await?;

        // Demo-status rows skip authentication like Local sessions
        if let Some(session) = session.as_ref().filter(|s| is_stored_demo(s)) {
            return Ok(session.clone());
        }

        require_credential(&caller)?;
        let session = session.ok_or_else(|| session_not_found(session_id))?;
        authorize_owner(&caller, &session.id, session.owner_id.as_deref().unwrap_or_default())?;

        Ok(session)
    }

    /// Supplied transcript first, then the domain's own copy
    async fn resolve_transcript(
        &self,
        request: &AnalyzeRequest,
        domain: SessionDomain,
        stored: Option<&Session>,
    ) -> Result<(Vec<TranscriptMessage>, Option<f64>)> {
        let supplied = request.transcript.clone().filter(|t| !t.is_empty());

        if let Some(transcript) = supplied {
            let duration = request
                .duration_seconds
                .or_else(|| stored.and_then(|s| s.duration_seconds));
            return Ok((transcript, duration));
        }

        match domain {
            SessionDomain::Persisted => {
                let session = stored.ok_or_else(|| session_not_found(&request.session_id))?;
                Ok((
                    session.transcript.clone(),
                    request.duration_seconds.or(session.duration_seconds),
                ))
            }
            SessionDomain::Local => {
                let cache = self.demo_cache.read().await;
                Ok(match cache.get(&request.session_id) {
                    Some(entry) => (
                        entry.session.transcript.clone(),
                        request.duration_seconds.or(entry.session.duration_seconds),
                    ),
                    None => (Vec::new(), request.duration_seconds),
                })
            }
            SessionDomain::ThirdParty => {
                match self.conversations.fetch_conversation(&request.session_id).await {
                    Ok(record) => Ok((
                        record.transcript,
                        request.duration_seconds.or(record.duration_seconds),
                    )),
                    Err(ProviderError::NotFound(_)) => Err(session_not_found(&request.session_id)),
                    Err(err) => {
                        warn!(
                            session_id = %request.session_id,
                            error = %err,
                            "Conversation fetch failed; analyzing without transcript"
                        );
                        Ok((Vec::new(), request.duration_seconds))
                    }
                }
            }
        }
    }

    async fn obtain_analysis(
        &self,
        transcript: &[TranscriptMessage],
        duration_seconds: Option<f64>,
        metrics: SessionMetrics,
        requester: Option<RequesterInfo>,
    ) -> (AnalysisResult, AnalysisSource) {
        let text_len = plain_text(transcript).chars().count();
        if text_len < self.settings.min_transcript_chars {
            debug!(text_len, "Transcript below meaningfulness threshold; using mock analysis");
            return (generate_mock_analysis(), AnalysisSource::Mock);
        }
        if !self.provider.is_configured() {
            debug!("Analysis provider not configured; using mock analysis");
            return (generate_mock_analysis(), AnalysisSource::Mock);
        }

        let prompt = AnalysisPrompt {
            transcript_text: dialogue_text(transcript),
            duration_seconds,
            metrics,
            requester,
        };

        match timeout(self.settings.provider_timeout, self.provider.analyze(&prompt)).await {
            Ok(Ok(analysis)) => (analysis, AnalysisSource::Provider),
            Ok(Err(err)) => {
                warn!(error = %err, "Analysis provider failed; using mock analysis");
                (generate_mock_analysis(), AnalysisSource::Fallback)
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.provider_timeout.as_secs(),
                    "Analysis provider timed out; using mock analysis"
                );
                (generate_mock_analysis(), AnalysisSource::Fallback)
            }
        }
    }

    /// Best-effort write; returns whether it landed
    async fn persist(
        &self,
        session: &Session,
        analysis: &AnalysisResult,
        metrics: &SessionMetrics,
        source: AnalysisSource,
    ) -> bool {
        let write = self.write_analysis(session, analysis, metrics, source);
        match timeout(self.settings.store_timeout, write).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                error!(session_id = %session.id, error = %err, "Failed to persist analysis");
                false
            }
            Err(_) => {
                error!(session_id = %session.id, "Timed out persisting analysis");
                false
            }
        }
    }

    async fn write_analysis(
        &self,
        session: &Session,
        result: &AnalysisResult,
        metrics: &SessionMetrics,
        source: AnalysisSource,
    ) -> Result<()> {
        let owner_id = session
            .owner_id
            .as_deref()
            .ok_or_else(|| Error::Internal(format!("Session {} has no owner", session.id)))?;
        let overall_score = to_persisted_score(result.overall_score);

        let mut tx = self.db.begin().await?;
        analysis::upsert_analysis(&mut *tx, &session.id, result, source.is_mock()).await?;
        sessions::mark_analyzed(
            &mut *tx,
            &session.id,
            overall_score,
            &result.feedback_summary(FEEDBACK_MAX_CHARS),
            Utc::now(),
        )
        .await?;
        analytics::upsert_analytics(&mut *tx, &session.id, owner_id, metrics, result).await?;
        audit::record(
            &mut *tx,
            &session.id,
            Some(owner_id),
            AuditAction::AnalysisPersisted,
            Some(json!({ "source": source, "overallScore": overall_score })),
        )
        .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn cache_local(
        &self,
        session_id: &str,
        transcript: &[TranscriptMessage],
        duration_seconds: Option<f64>,
        analysis: &AnalysisResult,
        metrics: SessionMetrics,
    ) {
        let now = Utc::now();
        let mut cache = self.demo_cache.write().await;
        let mut entry = cache
            .take(session_id)
            .unwrap_or_else(|| DemoEntry::new(Session::start(session_id.to_string(), None, None)));

        let session = &mut entry.session;
        session.transcript = transcript.to_vec();
        if duration_seconds.is_some() {
            session.duration_seconds = duration_seconds;
        }
        if session.ended_at.is_none() {
            session.ended_at = Some(now);
        }
        session.status = SessionStatus::Analyzed.as_str().to_string();
        session.processing_status = Some(ProcessingStatus::Completed);
        session.overall_score = Some(to_persisted_score(analysis.overall_score));
        session.feedback = Some(analysis.feedback_summary(FEEDBACK_MAX_CHARS));
        session.analyzed_at = Some(now);
        session.updated_at = Some(now);

        entry.analysis = Some(analysis.clone());
        entry.metrics = Some(metrics);
        cache.put(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tokens;
    use crate::services::conversation_provider::ConversationRecord;
    use crate::services::demo_cache::DemoCache;
    use async_trait::async_trait;
    use vtc_common::db::init_memory_database;

    enum Behavior {
        Succeed(f64),
        Fail,
        Hang,
        Panic,
    }

    struct StubProvider {
        behavior: Behavior,
    }

    #[async_trait]
    impl AnalysisProvider for StubProvider {
        fn is_configured(&self) -> bool {
            true
        }

        async fn analyze(&self, _prompt: &AnalysisPrompt) -> std::result::Result<AnalysisResult, ProviderError> {
            match self.behavior {
                Behavior::Succeed(score) => Ok(AnalysisResult {
                    overall_score: score,
                    strengths: vec!["Real strength".into()],
                    areas_for_improvement: vec!["Real improvement".into()],
                    effective_techniques: vec![],
                    techniques_needing_work: vec![],
                    objection_handling: None,
                    closing_effectiveness: None,
                    key_recommendations: vec![],
                    detailed_analysis: None,
                }),
                Behavior::Fail => Err(ProviderError::Parse("bad json".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(ProviderError::Network("unreachable".into()))
                }
                Behavior::Panic => panic!("provider exploded"),
            }
        }
    }

    struct NoConversations;

    #[async_trait]
    impl ConversationProvider for NoConversations {
        async fn fetch_conversation(&self, id: &str) -> std::result::Result<ConversationRecord, ProviderError> {
            Err(ProviderError::NotFound(id.to_string()))
        }
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            min_transcript_chars: 20,
            provider_timeout: Duration::from_millis(200),
            store_timeout: Duration::from_secs(5),
            internal_secret: None,
        }
    }

    async fn orchestrator(behavior: Behavior) -> (Arc<AnalysisOrchestrator>, SqlitePool) {
        let db = init_memory_database().await.unwrap();
        let orchestrator = AnalysisOrchestrator::new(
            db.clone(),
            Arc::new(StubProvider { behavior }),
            Arc::new(NoConversations),
            DemoCache::shared(),
            settings(),
        );
        (Arc::new(orchestrator), db)
    }

    fn long_transcript() -> Vec<TranscriptMessage> {
        vec![
            TranscriptMessage::new("user", "Thanks for taking the call today, I wanted to follow up"),
            TranscriptMessage::new("client", "Sure, what did you have in mind"),
        ]
    }

    fn request(session_id: &str, transcript: Vec<TranscriptMessage>) -> AnalyzeRequest {
        AnalyzeRequest {
            session_id: session_id.to_string(),
            transcript: Some(transcript),
            duration_seconds: Some(60.0),
            requester: None,
        }
    }

    async fn persisted_session(db: &SqlitePool, owner: &str) -> (String, String) {
        let session = Session::start(vtc_common::identity::persisted_session_id(), Some(owner.into()), None);
        let mut conn = db.acquire().await.unwrap();
        sessions::insert_session(&mut conn, &session).await.unwrap();
        drop(conn);
        let token = tokens::issue_token(db, owner, None).await.unwrap();
        (session.id, token)
    }

    #[tokio::test]
    async fn test_local_session_uses_provider_without_credentials() {
        let (orch, _db) = orchestrator(Behavior::Succeed(8.0)).await;
        let outcome = orch
            .analyze_guarded(request("demo-1", long_transcript()), Credentials::default())
            .await
            .unwrap();

        assert_eq!(outcome.analysis_source, AnalysisSource::Provider);
        assert_eq!(outcome.analysis.overall_score, 8.0);
        // Local domain is always demo
        assert!(outcome.is_demo);
        assert!(!outcome.persisted);

        let cache = orch.demo_cache.read().await;
        let entry = cache.get("demo-1").unwrap();
        assert_eq!(entry.session.status, "analyzed");
        assert_eq!(entry.analysis.as_ref().unwrap().overall_score, 8.0);
    }

    #[tokio::test]
    async fn test_short_transcript_gets_complete_mock() {
        let (orch, _db) = orchestrator(Behavior::Succeed(8.0)).await;
        let outcome = orch
            .analyze_guarded(
                request("conv_x", vec![TranscriptMessage::new("user", "0123456789")]),
                Credentials::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.analysis_source, AnalysisSource::Mock);
        assert!(outcome.is_demo);
        assert!(outcome.analysis.objection_handling.is_some());
        assert!(outcome.analysis.detailed_analysis.is_some());
    }

    #[tokio::test]
    async fn test_gate_measures_joined_text_length() {
        let (orch, _db) = orchestrator(Behavior::Succeed(8.0)).await;

        // 10 characters of content padded to 22
        let padded = vec![TranscriptMessage::new("user", format!("0123456789{}", " ".repeat(12)))];
        let outcome = orch
            .analyze_guarded(request("conv_x", padded), Credentials::default())
            .await
            .unwrap();
        assert_eq!(outcome.analysis_source, AnalysisSource::Provider);

        // Two 9-character messages join to 19
        let joined = vec![
            TranscriptMessage::new("user", "012345678"),
            TranscriptMessage::new("client", "012345678"),
        ];
        let outcome = orch
            .analyze_guarded(request("conv_x", joined), Credentials::default())
            .await
            .unwrap();
        assert_eq!(outcome.analysis_source, AnalysisSource::Mock);
    }

    #[tokio::test]
    async fn test_stored_demo_row_skips_auth_and_store_writes() {
        let (orch, db) = orchestrator(Behavior::Succeed(7.0)).await;
        let mut session = Session::start(
            vtc_common::identity::persisted_session_id(),
            Some("owner-1".into()),
            None,
        );
        session.status = SessionStatus::Demo.as_str().to_string();
        let mut conn = db.acquire().await.unwrap();
        sessions::insert_session(&mut conn, &session).await.unwrap();
        drop(conn);

        let outcome = orch
            .analyze_guarded(request(&session.id, long_transcript()), Credentials::default())
            .await
            .unwrap();

        assert_eq!(outcome.analysis_source, AnalysisSource::Provider);
        assert!(outcome.is_demo);
        assert!(!outcome.persisted);
        assert_eq!(analysis::count_for_session(&db, &session.id).await.unwrap(), 0);
        let stored = sessions::load_session(&db, &session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "demo");
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_real_metrics() {
        let (orch, _db) = orchestrator(Behavior::Fail).await;
        let transcript = long_transcript();
        let outcome = orch
            .analyze_guarded(request("conv_x", transcript.clone()), Credentials::default())
            .await
            .unwrap();

        assert_eq!(outcome.analysis_source, AnalysisSource::Fallback);
        assert!(outcome.is_demo);
        assert_eq!(outcome.metrics, generate_metrics(&transcript, Some(60.0)));
        assert!(outcome.transcript.is_none());
    }

    #[tokio::test]
    async fn test_provider_timeout_falls_back() {
        let (orch, _db) = orchestrator(Behavior::Hang).await;
        let outcome = orch
            .analyze_guarded(request("conv_x", long_transcript()), Credentials::default())
            .await
            .unwrap();
        assert_eq!(outcome.analysis_source, AnalysisSource::Fallback);
    }

    #[tokio::test]
    async fn test_panic_becomes_catastrophic_mock() {
        let (orch, _db) = orchestrator(Behavior::Panic).await;
        let outcome = orch
            .analyze_guarded(request("conv_x", long_transcript()), Credentials::default())
            .await
            .unwrap();

        assert_eq!(outcome.analysis_source, AnalysisSource::Catastrophic);
        assert!(outcome.is_demo);
        assert_eq!(outcome.transcript, Some(mock_transcript()));
    }

    #[tokio::test]
    async fn test_persisted_requires_credential() {
        let (orch, db) = orchestrator(Behavior::Succeed(7.0)).await;
        let (session_id, _token) = persisted_session(&db, "owner-1").await;

        let err = orch
            .analyze_guarded(request(&session_id, long_transcript()), Credentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_foreign_session_reported_as_not_found() {
        let (orch, db) = orchestrator(Behavior::Succeed(7.0)).await;
        let (session_id, _) = persisted_session(&db, "owner-1").await;
        let other_token = tokens::issue_token(&db, "owner-2", None).await.unwrap();

        let err = orch
            .analyze_guarded(request(&session_id, long_transcript()), Credentials::bearer(other_token))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_persisted_analysis_written_once_per_session() {
        let (orch, db) = orchestrator(Behavior::Succeed(6.0)).await;
        let (session_id, token) = persisted_session(&db, "owner-1").await;

        let first = orch
            .analyze_guarded(request(&session_id, long_transcript()), Credentials::bearer(token.clone()))
            .await
            .unwrap();
        assert!(first.persisted);
        assert!(!first.is_demo);

        let second = orch
            .analyze_guarded(request(&session_id, long_transcript()), Credentials::bearer(token))
            .await
            .unwrap();
        assert!(second.persisted);

        assert_eq!(analysis::count_for_session(&db, &session_id).await.unwrap(), 1);
        let session = sessions::load_session(&db, &session_id).await.unwrap().unwrap();
        assert_eq!(session.status, "analyzed");
        assert_eq!(session.overall_score, Some(60.0));
        assert_eq!(session.processing_status, Some(ProcessingStatus::Completed));
    }

    #[tokio::test]
    async fn test_third_party_not_found() {
        let (orch, _db) = orchestrator(Behavior::Succeed(7.0)).await;
        let err = orch
            .analyze_guarded(
                AnalyzeRequest {
                    session_id: "conv_missing".into(),
                    transcript: None,
                    duration_seconds: None,
                    requester: None,
                },
                Credentials::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
