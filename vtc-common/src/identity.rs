//! Session identity classification
//!
//! An opaque session identifier decides where the session lives. The decision
//! is made from the string alone, before any credential is looked at, because
//! Local and ThirdParty sessions are served without authentication. A stored
//! row's status is only known after loading it; callers holding a row
//! re-classify with [`classify_with_status`].
//!
//! Rule order, first match wins:
//! 1. `Local`: prefix `demo-` or `temp-`, the substring `demo` anywhere, or an
//!    explicit status of `demo`
//! 2. `ThirdParty`: conversation-provider id shape (`conv_` prefix)
//! 3. `Persisted`: everything else; existence and ownership are checked
//!    against the store later

use serde::{Deserialize, Serialize};

/// Prefix for client-issued demo session ids
pub const DEMO_PREFIX: &str = "demo-";

/// Prefix for client-issued temporary session ids
pub const TEMP_PREFIX: &str = "temp-";

/// Prefix of conversation-provider ids
pub const THIRD_PARTY_PREFIX: &str = "conv_";

/// Storage domain of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionDomain {
    /// Unauthenticated, client-cached demo session
    Local,
    /// Session owned by the external conversation provider
    ThirdParty,
    /// Authenticated, server-owned session in the relational store
    Persisted,
}

impl SessionDomain {
    /// Whether requests for this domain must carry a credential
    pub fn requires_auth(self) -> bool {
        matches!(self, SessionDomain::Persisted)
    }
}

/// Classify a session identifier
pub fn classify(id: &str) -> SessionDomain {
    classify_with_status(id, None)
}

/// Classify a session identifier, honouring an explicit `demo` status field
pub fn classify_with_status(id: &str, status: Option<&str>) -> SessionDomain {
    // Substring match is deliberate: historical ids such as "user-demo-2"
    // must keep resolving to Local.
    if id.starts_with(DEMO_PREFIX)
        || id.starts_with(TEMP_PREFIX)
        || id.contains("demo")
        || status == Some("demo")
    {
        return SessionDomain::Local;
    }

    if id.starts_with(THIRD_PARTY_PREFIX) {
        return SessionDomain::ThirdParty;
    }

    SessionDomain::Persisted
}

/// Build a client-style demo id from a millisecond timestamp
pub fn demo_session_id(epoch_millis: i64) -> String {
    format!("{}{}", DEMO_PREFIX, epoch_millis)
}

/// Server-issued id for a persisted session
pub fn persisted_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
