//! Request extractors: the caller's session and lenient numeric parameters.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use nb_core::Session;
use serde::Deserialize;

use crate::error::ApiError;
use crate::handlers::AppState;

#[derive(Debug, Default, Deserialize)]
struct SecretParam {
    secret: Option<String>,
}

/// The resolved session of the request.
///
/// The secret comes from the `secret` query parameter, falling back to an
/// `Authorization: Bearer` header. No secret means the anonymous guest.
pub struct Caller(pub Session);

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let from_query = Query::<SecretParam>::try_from_uri(&parts.uri)
            .map(|Query(param)| param.secret)
            .unwrap_or_default();
        let from_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string());

        let secret = from_query.or(from_header);
        let session = state.auth.authenticate(secret.as_deref()).await?;
        Ok(Caller(session))
    }
}

/// Parses a positive integer; anything else (missing, empty, zero, negative,
/// non-numeric) is `None`.
pub fn positive_id(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
}

/// Parses any integer, leaving range policy to the caller.
pub fn lenient_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}
