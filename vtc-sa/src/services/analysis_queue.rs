//! Background analysis queue
//!
//! End-session and reprocess hand analysis work here instead of running it
//! inline, so their own response never depends on the analysis outcome.
//! Each job runs on its own task; outcomes go out on a broadcast channel
//! and failures are also kept as the service's `last_error`.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info};
use vtc_common::TranscriptMessage;

use super::orchestrator::AnalysisOrchestrator;

const OUTCOME_CHANNEL_CAPACITY: usize = 100;

/// One queued analysis
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub session_id: String,
    pub transcript: Vec<TranscriptMessage>,
    pub duration_seconds: Option<f64>,
}

/// Result of one background job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        session_id: String,
        is_demo: bool,
        persisted: bool,
    },
    Failed {
        session_id: String,
        error: String,
    },
}

impl JobOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            JobOutcome::Completed { session_id, .. } | JobOutcome::Failed { session_id, .. } => {
                session_id
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("analysis queue is full")]
    Full,

    #[error("analysis queue is closed")]
    Closed,
}

/// Handle for submitting jobs and watching outcomes
#[derive(Clone)]
pub struct AnalysisQueue {
    sender: mpsc::Sender<AnalysisJob>,
    outcomes: broadcast::Sender<JobOutcome>,
}

impl AnalysisQueue {
    /// Start the worker; must be called from within a Tokio runtime
    pub fn start(
        orchestrator: Arc<AnalysisOrchestrator>,
        capacity: usize,
        last_error: Arc<RwLock<Option<String>>>,
    ) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AnalysisJob>(capacity.max(1));
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);

        let worker_outcomes = outcomes.clone();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let orchestrator = Arc::clone(&orchestrator);
                let outcomes = worker_outcomes.clone();
                let last_error = Arc::clone(&last_error);
                tokio::spawn(run_job(orchestrator, job, outcomes, last_error));
            }
            debug!("Analysis queue worker stopped");
        });

        Self { sender, outcomes }
    }

    /// Queue a job without waiting for room
    pub fn enqueue(&self, job: AnalysisJob) -> Result<(), QueueError> {
        let session_id = job.session_id.clone();
        self.sender.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                error!(session_id = %session_id, "Analysis queue full; analysis not triggered");
                QueueError::Full
            }
            mpsc::error::TrySendError::Closed(_) => {
                error!(session_id = %session_id, "Analysis queue closed; analysis not triggered");
                QueueError::Closed
            }
        })?;
        debug!(session_id = %session_id, "Analysis job queued");
        Ok(())
    }

    /// Receive outcomes of jobs finishing after this call
    pub fn subscribe(&self) -> broadcast::Receiver<JobOutcome> {
        self.outcomes.subscribe()
    }
}

async fn run_job(
    orchestrator: Arc<AnalysisOrchestrator>,
    job: AnalysisJob,
    outcomes: broadcast::Sender<JobOutcome>,
    last_error: Arc<RwLock<Option<String>>>,
) {
    let session_id = job.session_id.clone();

    // Inner task contains panics from the pipeline
    let task_orchestrator = Arc::clone(&orchestrator);
    let handle = tokio::spawn(async move { task_orchestrator.run_job(job).await });

    let outcome = match handle.await {
        Ok(Ok(result)) => JobOutcome::Completed {
            session_id: session_id.clone(),
            is_demo: result.is_demo,
            persisted: result.persisted,
        },
        Ok(Err(err)) => JobOutcome::Failed {
            session_id: session_id.clone(),
            error: err.to_string(),
        },
        Err(join_err) => JobOutcome::Failed {
            session_id: session_id.clone(),
            error: format!("analysis task aborted: {}", join_err),
        },
    };

    match &outcome {
        JobOutcome::Completed { persisted, is_demo, .. } => {
            info!(session_id = %session_id, persisted, is_demo, "Background analysis completed");
        }
        JobOutcome::Failed { error: message, .. } => {
            error!(session_id = %session_id, error = %message, "Background analysis failed");
            *last_error.write().await = Some(format!("analysis of {}: {}", session_id, message));
            orchestrator.record_failure(&session_id, message).await;
        }
    }

    // No subscribers is fine
    let _ = outcomes.send(outcome);
}
