/// Request identity and optional API token enforcement for `/api/*`

use crate::error::Error;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Calling user, taken from the `X-User-Id` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or_else(|| Error::Unauthorized("Missing X-User-Id header".to_string()))
    }
}

/// Shared bearer token; `None` leaves the API open
#[derive(Debug, Clone, Default)]
pub struct ApiToken(pub Option<Arc<str>>);

impl ApiToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()).map(Arc::from))
    }
}

/// Middleware enforcing `Authorization: Bearer <token>` when a token is configured
///
/// Missing or malformed credentials are 401, a wrong token is 403.
pub async fn require_api_token(
    State(token): State<ApiToken>,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    let Some(expected) = token.0.as_deref() else {
        return Ok(next.run(request).await);
    };

    let supplied = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Unauthorized("Missing bearer token".to_string()))?;

    if !bool::from(supplied.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!("🚫 Rejected API request with wrong token: {}", request.uri().path());
        return Err(Error::Forbidden("Invalid API token".to_string()));
    }

    Ok(next.run(request).await)
}
