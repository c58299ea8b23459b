//! Caller resolution and ownership checks for Persisted-domain sessions
//!
//! Credentials are only looked at when a Persisted session is involved;
//! Local and ThirdParty requests never resolve a caller.

use sqlx::SqlitePool;
use tracing::debug;
use vtc_common::{Error, Result};

use crate::db::tokens;

/// Raw credentials as presented on a request
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// `Authorization: Bearer <token>`
    pub bearer: Option<String>,
    /// `X-Internal-Secret`
    pub internal_secret: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
            internal_secret: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bearer.is_none() && self.internal_secret.is_none()
    }
}

/// Who is calling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Server-to-server caller holding the internal secret
    Internal,
    /// End user identified by bearer token
    Owner(String),
    Anonymous,
}

/// Resolve credentials to a caller
///
/// A presented credential that does not verify is rejected rather than
/// downgraded to anonymous.
pub async fn resolve_caller(
    db: &SqlitePool,
    configured_secret: Option<&str>,
    credentials: &Credentials,
) -> Result<Caller> {
    if let Some(presented) = credentials.internal_secret.as_deref() {
        return match configured_secret {
            Some(expected) if constant_time_eq(presented.as_bytes(), expected.as_bytes()) => {
                Ok(Caller::Internal)
            }
            _ => Err(Error::Unauthorized("invalid internal credential".to_string())),
        };
    }

    if let Some(token) = credentials.bearer.as_deref() {
        return match tokens::owner_for_token(db, token).await? {
            Some(owner_id) => {
                debug!(owner_id = %owner_id, "Bearer credential accepted");
                Ok(Caller::Owner(owner_id))
            }
            None => Err(Error::Unauthorized("invalid or expired token".to_string())),
        };
    }

    Ok(Caller::Anonymous)
}

/// Check that `caller` may act on a session owned by `owner_id`
///
/// Another owner's session is reported exactly like a missing one.
pub fn authorize_owner(caller: &Caller, session_id: &str, owner_id: &str) -> Result<()> {
    match caller {
        Caller::Internal => Ok(()),
        Caller::Owner(id) if id == owner_id => Ok(()),
        Caller::Owner(_) => Err(session_not_found(session_id)),
        Caller::Anonymous => Err(Error::Unauthorized("credential required".to_string())),
    }
}

/// Reject anonymous callers before any session lookup
pub fn require_credential(caller: &Caller) -> Result<()> {
    match caller {
        Caller::Anonymous => Err(Error::Unauthorized("credential required".to_string())),
        _ => Ok(()),
    }
}

/// The single not-found error used for missing and foreign sessions
pub fn session_not_found(session_id: &str) -> Error {
    Error::NotFound(format!("Session {}", session_id))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
