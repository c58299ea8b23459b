//! Credential extraction
//!
//! Handlers receive the raw [`Credentials`]; whether they are needed at all
//! depends on the session's domain, which the services decide.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::convert::Infallible;

use crate::services::Credentials;

/// Header carrying the server-to-server secret
pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

#[async_trait]
impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer);

        let internal_secret = parts
            .headers
            .get(INTERNAL_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Credentials {
            bearer,
            internal_secret,
        })
    }
}

/// Token from an `Authorization` value; the scheme is case-insensitive
fn parse_bearer(header: &str) -> Option<String> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}
