// =============================================================================
// Desk Token Authentication
// =============================================================================
//
// Mutating endpoints take an `AuthBearer` argument. The extractor reads the
// `Authorization` header and the expected token from `AURORA_DESK_TOKEN` on
// every request, then hands both to `check_bearer`. Any failure answers
// 403 `{ "error", "code": "forbidden" }` before the handler runs.
// =============================================================================

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::crypto::constant_time_eq;

pub const TOKEN_ENV: &str = "AURORA_DESK_TOKEN";

const SCHEME: &str = "Bearer ";

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No desk token configured; every authenticated call is refused.
    Unconfigured,
    /// Header absent, not UTF-8, or not a Bearer credential.
    MissingToken,
    WrongToken,
}

impl AuthFailure {
    fn message(self) -> &'static str {
        match self {
            AuthFailure::Unconfigured => "Server authentication not configured",
            AuthFailure::MissingToken => "Missing or invalid authorization token",
            AuthFailure::WrongToken => "Invalid authorization token",
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message(), "code": "forbidden" });
        (StatusCode::FORBIDDEN, Json(body)).into_response()
    }
}

/// Match a raw `Authorization` header value against the desk token.
pub fn check_bearer(header: Option<&str>, expected: &str) -> Result<String, AuthFailure> {
    if expected.is_empty() {
        return Err(AuthFailure::Unconfigured);
    }
    let token = header
        .and_then(|h| h.strip_prefix(SCHEME))
        .ok_or(AuthFailure::MissingToken)?;
    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(token.to_string())
    } else {
        Err(AuthFailure::WrongToken)
    }
}

/// Proof that the request carried the desk token.
pub struct AuthBearer(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthBearer
where
    S: Send + Sync,
{
    type Rejection = AuthFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let expected = std::env::var(TOKEN_ENV).unwrap_or_default();
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

        check_bearer(header, &expected).map(AuthBearer).map_err(|failure| {
            warn!(?failure, path = %parts.uri.path(), "authenticated request refused");
            failure
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_token() {
        assert_eq!(check_bearer(Some("Bearer s3cret"), "s3cret"), Ok("s3cret".to_string()));
    }

    #[test]
    fn unconfigured_server_refuses_everything() {
        assert_eq!(check_bearer(Some("Bearer "), ""), Err(AuthFailure::Unconfigured));
        assert_eq!(check_bearer(None, ""), Err(AuthFailure::Unconfigured));
    }

    #[test]
    fn missing_or_foreign_scheme() {
        assert_eq!(check_bearer(None, "s3cret"), Err(AuthFailure::MissingToken));
        assert_eq!(check_bearer(Some("Basic s3cret"), "s3cret"), Err(AuthFailure::MissingToken));
        assert_eq!(check_bearer(Some("s3cret"), "s3cret"), Err(AuthFailure::MissingToken));
    }

    #[test]
    fn wrong_token() {
        assert_eq!(check_bearer(Some("Bearer s3crex"), "s3cret"), Err(AuthFailure::WrongToken));
        assert_eq!(check_bearer(Some("Bearer "), "s3cret"), Err(AuthFailure::WrongToken));
    }

    #[test]
    fn failures_render_as_forbidden() {
        let resp = AuthFailure::WrongToken.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
