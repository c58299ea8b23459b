//! # VTC Common Library
//!
//! Shared code for the voice training coach services including:
//! - Canonical session, analysis and metrics models
//! - Transcript parsing and text extraction
//! - Session identity classification (local / third-party / persisted)
//! - Score and status normalization
//! - Transcript metrics engine
//! - Configuration loading
//! - Database schema initialization

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod time;
pub mod transcript;

pub use error::{Error, Result};
pub use identity::{classify, SessionDomain};
pub use metrics::generate_metrics;
pub use models::{AnalysisResult, ScoredSection, SessionMetrics};
pub use normalize::{normalize_score, normalize_status, CanonicalStatus, ScoreScale};
pub use transcript::TranscriptMessage;
