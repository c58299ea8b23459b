//! Bounded cache of Local-domain (demo) sessions
//!
//! Demo sessions never touch the relational store. The cache keeps the ten
//! most recently touched sessions with their analysis and metrics; writing
//! an id that is already cached moves it to the front instead of adding a
//! second entry.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use vtc_common::models::Session;
use vtc_common::{AnalysisResult, SessionMetrics};

pub const DEMO_CACHE_CAPACITY: usize = 10;

/// Shared handle used by handlers and the orchestrator
pub type SharedDemoCache = Arc<RwLock<DemoCache>>;

/// One cached demo session
#[derive(Debug, Clone, PartialEq)]
pub struct DemoEntry {
    pub session: Session,
    pub analysis: Option<AnalysisResult>,
    pub metrics: Option<SessionMetrics>,
}

impl DemoEntry {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            analysis: None,
            metrics: None,
        }
    }
}

/// Most-recent-first list, deduplicated by session id
#[derive(Debug)]
pub struct DemoCache {
    entries: VecDeque<DemoEntry>,
    capacity: usize,
}

impl Default for DemoCache {
    fn default() -> Self {
        Self::new(DEMO_CACHE_CAPACITY)
    }
}

impl DemoCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn shared() -> SharedDemoCache {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Insert or replace an entry and make it the most recent
    pub fn put(&mut self, entry: DemoEntry) {
        self.entries.retain(|e| e.session.id != entry.session.id);
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn get(&self, session_id: &str) -> Option<&DemoEntry> {
        self.entries.iter().find(|e| e.session.id == session_id)
    }

    /// Remove and return an entry, for read-modify-`put` updates
    pub fn take(&mut self, session_id: &str) -> Option<DemoEntry> {
        let index = self.entries.iter().position(|e| e.session.id == session_id)?;
        self.entries.remove(index)
    }

    /// Entries, most recent first
    pub fn list(&self) -> impl Iterator<Item = &DemoEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
