use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum AdminAuthError {
    #[error("admin auth not configured")]
    MissingConfig,
    #[error("admin token required")]
    MissingToken,
    #[error("admin token invalid")]
    InvalidToken,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Moderator routes need `Authorization: Bearer <QUILL_ADMIN_TOKEN>`.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AdminAuthError> {
    let secret = state
        .config
        .admin_token
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or(AdminAuthError::MissingConfig)?;

    let token = extract_bearer_token(&request).ok_or(AdminAuthError::MissingToken)?;
    if !token_matches(secret, &token) {
        tracing::warn!(path = %request.uri().path(), "rejected admin token");
        return Err(AdminAuthError::InvalidToken);
    }
    Ok(next.run(request).await)
}

fn token_matches(secret: &str, token: &str) -> bool {
    Sha256::digest(secret.as_bytes()) == Sha256::digest(token.as_bytes())
}

fn extract_bearer_token<B>(request: &Request<B>) -> Option<String> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let header = header.trim();
    let value = header.strip_prefix("Bearer ")?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn is_https(headers: &axum::http::HeaderMap) -> bool {
    if let Some(value) = headers.get("x-forwarded-proto") {
        if let Ok(value) = value.to_str() {
            if value.split(',').any(|part| part.trim().eq_ignore_ascii_case("https")) {
                return true;
            }
        }
    }
    if let Some(value) = headers.get("forwarded") {
        if let Ok(value) = value.to_str() {
            for part in value.split(';') {
                let part = part.trim();
                if let Some(proto) = part.strip_prefix("proto=") {
                    if proto.trim().eq_ignore_ascii_case("https") {
                        return true;
                    }
                }
            }
        }
    }
    false
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminAuthError::MissingConfig => StatusCode::SERVICE_UNAVAILABLE,
            AdminAuthError::MissingToken | AdminAuthError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
