//! Session lifecycle controller
//!
//! Created → Active → Ended → (Analyzing) → Analyzed | Completed
//!
//! The end transition answers as soon as its own writes commit. Analysis is
//! handed to the [`AnalysisQueue`] and never affects the end response.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::{info, warn};
use vtc_common::identity::{classify, demo_session_id, persisted_session_id, SessionDomain};
use vtc_common::models::{ProcessingStatus, Session, SessionStatus};
use vtc_common::normalize::{normalize_status, CanonicalStatus};
use vtc_common::{Error, Result, TranscriptMessage};

use super::access::{
    authorize_owner, require_credential, resolve_caller, session_not_found, Caller, Credentials,
};
use super::analysis_queue::{AnalysisJob, AnalysisQueue};
use super::demo_cache::{DemoEntry, SharedDemoCache};
use crate::db::audit::{self, AuditAction};
use crate::db::sessions::{self, EndUpdate};
use crate::db::usage;

/// Typed start request
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    /// Client-issued Local id; ignored for authenticated owners
    pub session_id: Option<String>,
    pub scenario: Option<String>,
    /// Required when a trusted caller starts a session on a user's behalf
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
    pub domain: SessionDomain,
    pub status: CanonicalStatus,
    pub started_at: DateTime<Utc>,
}

/// Typed end-session request
#[derive(Debug, Clone)]
pub struct EndRequest {
    pub session_id: String,
    pub duration_seconds: f64,
    pub transcript: Option<Vec<TranscriptMessage>>,
    pub audio_quality: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionResponse {
    pub status: CanonicalStatus,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub minute_cost: i64,
    pub minutes_used: i64,
    pub analysis_triggered: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessResponse {
    pub session_id: String,
    pub status: CanonicalStatus,
    pub analysis_triggered: bool,
}

pub struct SessionLifecycle {
    db: SqlitePool,
    demo_cache: SharedDemoCache,
    queue: AnalysisQueue,
    internal_secret: Option<String>,
}

impl SessionLifecycle {
    pub fn new(
        db: SqlitePool,
        demo_cache: SharedDemoCache,
        queue: AnalysisQueue,
        internal_secret: Option<String>,
    ) -> Self {
        Self {
            db,
            demo_cache,
            queue,
            internal_secret,
        }
    }

    async fn caller(&self, credentials: &Credentials) -> Result<Caller> {
        resolve_caller(&self.db, self.internal_secret.as_deref(), credentials).await
    }

    /// Created → Active
    ///
    /// Authenticated owners get a server-issued id in the store. Anonymous
    /// callers get a Local session in the demo cache, keeping a client-issued
    /// Local id when one is supplied.
    pub async fn start(&self, request: StartRequest, credentials: &Credentials) -> Result<StartedSession> {
        let caller = self.caller(credentials).await?;

        let owner_id = match caller {
            Caller::Owner(owner_id) => Some(owner_id),
            Caller::Internal => Some(request.owner_id.clone().ok_or_else(|| {
                Error::InvalidInput("ownerId is required for trusted callers".to_string())
            })?),
            Caller::Anonymous => None,
        };

        match owner_id {
            Some(owner_id) => self.start_persisted(owner_id, request.scenario).await,
            None => self.start_local(request).await,
        }
    }

    async fn start_persisted(&self, owner_id: String, scenario: Option<String>) -> Result<StartedSession> {
        let session = Session::start(persisted_session_id(), Some(owner_id.clone()), scenario);

        let mut tx = self.db.begin().await?;
        sessions::insert_session(&mut *tx, &session).await?;
        audit::record(
            &mut *tx,
            &session.id,
            Some(&owner_id),
            AuditAction::SessionStarted,
            session.scenario.as_ref().map(|s| json!({ "scenario": s })),
        )
        .await?;
        tx.commit().await?;

        info!(session_id = %session.id, owner_id = %owner_id, "Session started");
        Ok(started(&session, SessionDomain::Persisted))
    }

    async fn start_local(&self, request: StartRequest) -> Result<StartedSession> {
        let session_id = match request.session_id {
            Some(id) if classify(&id) == SessionDomain::Local => id,
            Some(id) => {
                return Err(Error::InvalidInput(format!(
                    "anonymous sessions need a demo- or temp- id, got '{}'",
                    id
                )))
            }
            None => demo_session_id(Utc::now().timestamp_millis()),
        };

        let session = Session::start(session_id, None, request.scenario);
        self.demo_cache.write().await.put(DemoEntry::new(session.clone()));

        info!(session_id = %session.id, "Demo session started");
        Ok(started(&session, SessionDomain::Local))
    }

    /// Active → Ended
    ///
    /// A repeated call for an ended session changes nothing and charges
    /// nothing; it reports the stored state with `analysisTriggered = false`.
    pub async fn end(&self, request: EndRequest, credentials: &Credentials) -> Result<EndSessionResponse> {
        if !request.duration_seconds.is_finite() || request.duration_seconds <= 0.0 {
            return Err(Error::InvalidInput("durationSeconds must be greater than 0".to_string()));
        }

        match classify(&request.session_id) {
            SessionDomain::Persisted => self.end_persisted(request, credentials).await,
            SessionDomain::Local => Ok(self.end_local(request).await),
            SessionDomain::ThirdParty => Ok(end_third_party(request)),
        }
    }

    async fn end_persisted(&self, request: EndRequest, credentials: &Credentials) -> Result<EndSessionResponse> {
        let caller = self.caller(credentials).await?;
        require_credential(&caller)?;

        let session = sessions::load_session(&self.db, &request.session_id)
            .await?
            .ok_or_else(|| session_not_found(&request.session_id))?;
        let owner_id = session
            .owner_id
            .clone()
            .ok_or_else(|| Error::Internal(format!("Session {} has no owner", session.id)))?;
        authorize_owner(&caller, &session.id, &owner_id)?;

        if session.is_ended() {
            return self.already_ended(&session, &owner_id).await;
        }

        let transcript = request.transcript.unwrap_or_default();
        let has_transcript = !transcript.is_empty();
        let ended_at = Utc::now();
        let minute_cost = usage::minute_cost(request.duration_seconds);

        let update = EndUpdate {
            duration_seconds: request.duration_seconds,
            transcript: transcript.clone(),
            audio_quality: request.audio_quality,
            processing_status: if has_transcript {
                ProcessingStatus::Analyzing
            } else {
                ProcessingStatus::Completed
            },
            ended_at,
        };

        let mut tx = self.db.begin().await?;
        if !sessions::end_session(&mut *tx, &session.id, &update).await? {
            // Lost a race with another end call
            tx.rollback().await?;
            let current = sessions::load_session(&self.db, &session.id)
                .await?
                .ok_or_else(|| session_not_found(&session.id))?;
            return self.already_ended(&current, &owner_id).await;
        }
        let minutes_used = usage::charge_minutes(&mut *tx, &owner_id, minute_cost).await?;
        audit::record(
            &mut *tx,
            &session.id,
            Some(&owner_id),
            AuditAction::SessionEnded,
            Some(json!({
                "durationSeconds": request.duration_seconds,
                "minuteCost": minute_cost,
                "hasTranscript": has_transcript,
            })),
        )
        .await?;
        tx.commit().await?;

        info!(
            session_id = %session.id,
            duration_seconds = request.duration_seconds,
            minute_cost,
            "Session ended"
        );

        let analysis_triggered = has_transcript && self.trigger(&session.id, transcript, request.duration_seconds);
        if has_transcript && !analysis_triggered {
            // Nothing will close the analyzing sub-state
            if let Err(err) =
                sessions::set_processing_status(&self.db, &session.id, ProcessingStatus::Completed).await
            {
                warn!(session_id = %session.id, error = %err, "Failed to reset processing status");
            }
        }

        Ok(EndSessionResponse {
            status: ended_status(analysis_triggered),
            ended_at,
            duration_seconds: request.duration_seconds,
            minute_cost,
            minutes_used,
            analysis_triggered,
        })
    }

    async fn already_ended(&self, session: &Session, owner_id: &str) -> Result<EndSessionResponse> {
        info!(session_id = %session.id, "Session already ended; end request is a no-op");
        let has_analysis = session.analyzed_at.is_some();

        Ok(EndSessionResponse {
            status: normalize_status(&session.status, has_analysis),
            ended_at: session.ended_at.unwrap_or_else(Utc::now),
            duration_seconds: session.duration_seconds.unwrap_or_default(),
            minute_cost: 0,
            minutes_used: usage::minutes_used(&self.db, owner_id).await?,
            analysis_triggered: false,
        })
    }

    async fn end_local(&self, request: EndRequest) -> EndSessionResponse {
        let now = Utc::now();
        let transcript = request.transcript.unwrap_or_default();
        let has_transcript = !transcript.is_empty();

        {
            let mut cache = self.demo_cache.write().await;
            let mut entry = cache.take(&request.session_id).unwrap_or_else(|| {
                DemoEntry::new(Session::start(request.session_id.clone(), None, None))
            });

            if entry.session.is_ended() {
                let response = EndSessionResponse {
                    status: normalize_status(&entry.session.status, entry.analysis.is_some()),
                    ended_at: entry.session.ended_at.unwrap_or(now),
                    duration_seconds: entry.session.duration_seconds.unwrap_or_default(),
                    minute_cost: 0,
                    minutes_used: 0,
                    analysis_triggered: false,
                };
                cache.put(entry);
                return response;
            }

            let session = &mut entry.session;
            session.status = SessionStatus::Completed.as_str().to_string();
            session.processing_status = Some(if has_transcript {
                ProcessingStatus::Analyzing
            } else {
                ProcessingStatus::Completed
            });
            session.duration_seconds = Some(request.duration_seconds);
            session.transcript = transcript.clone();
            if request.audio_quality.is_some() {
                session.audio_quality = request.audio_quality;
            }
            session.ended_at = Some(now);
            session.updated_at = Some(now);
            cache.put(entry);
        }

        info!(session_id = %request.session_id, "Demo session ended");
        let analysis_triggered =
            has_transcript && self.trigger(&request.session_id, transcript, request.duration_seconds);

        EndSessionResponse {
            status: ended_status(analysis_triggered),
            ended_at: now,
            duration_seconds: request.duration_seconds,
            minute_cost: 0,
            minutes_used: 0,
            analysis_triggered,
        }
    }

    /// Explicit reprocessing of an ended Persisted session
    pub async fn reprocess(&self, session_id: &str, credentials: &Credentials) -> Result<ReprocessResponse> {
        if classify(session_id) != SessionDomain::Persisted {
            return Err(Error::InvalidInput(
                "only stored sessions can be reprocessed".to_string(),
            ));
        }

        let caller = self.caller(credentials).await?;
        require_credential(&caller)?;

        let session = sessions::load_session(&self.db, session_id)
            .await?
            .ok_or_else(|| session_not_found(session_id))?;
        let owner_id = session.owner_id.clone().unwrap_or_default();
        authorize_owner(&caller, &session.id, &owner_id)?;

        if !session.is_ended() {
            return Err(Error::InvalidInput(format!("session {} has not ended", session_id)));
        }
        if session.transcript.is_empty() {
            return Err(Error::InvalidInput(format!(
                "session {} has no transcript to analyze",
                session_id
            )));
        }

        let mut tx = self.db.begin().await?;
        sessions::mark_reprocessing(&mut *tx, &session.id).await?;
        audit::record(
            &mut *tx,
            &session.id,
            Some(&owner_id),
            AuditAction::AnalysisReprocessRequested,
            None,
        )
        .await?;
        tx.commit().await?;

        let duration = session.duration_seconds.unwrap_or_default();
        let analysis_triggered = self.trigger(&session.id, session.transcript.clone(), duration);
        if !analysis_triggered {
            sessions::set_processing_status(&self.db, &session.id, ProcessingStatus::Completed).await?;
        }

        info!(session_id = %session.id, analysis_triggered, "Reprocessing requested");
        Ok(ReprocessResponse {
            session_id: session.id,
            status: ended_status(analysis_triggered),
            analysis_triggered,
        })
    }

    fn trigger(&self, session_id: &str, transcript: Vec<TranscriptMessage>, duration_seconds: f64) -> bool {
        self.queue
            .enqueue(AnalysisJob {
                session_id: session_id.to_string(),
                transcript,
                duration_seconds: Some(duration_seconds),
            })
            .is_ok()
    }
}

fn started(session: &Session, domain: SessionDomain) -> StartedSession {
    StartedSession {
        session_id: session.id.clone(),
        domain,
        status: normalize_status(&session.status, false),
        started_at: session.started_at.unwrap_or(session.created_at),
    }
}

/// Ended and waiting for analysis reads as `processing`; otherwise `completed`
fn ended_status(analysis_triggered: bool) -> CanonicalStatus {
    if analysis_triggered {
        CanonicalStatus::Processing
    } else {
        CanonicalStatus::Completed
    }
}

/// ThirdParty sessions are owned by the provider: acknowledge only
fn end_third_party(request: EndRequest) -> EndSessionResponse {
    info!(session_id = %request.session_id, "Provider-owned session ended; nothing stored");
    EndSessionResponse {
        status: CanonicalStatus::Completed,
        ended_at: Utc::now(),
        duration_seconds: request.duration_seconds,
        minute_cost: 0,
        minutes_used: 0,
        analysis_triggered: false,
    }
}
