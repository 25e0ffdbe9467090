use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quill_core::error::CoreError;
use quill_infra::db::StoreError;
use serde::Serialize;
use thiserror::Error;

use crate::submission::SubmitError;

pub const UNHANDLED_STORAGE_MESSAGE: &str = "storage raised an unhandled error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(err) => err.into(),
            SubmitError::Forbidden(reason) => ApiError::Forbidden(reason),
            SubmitError::Title(err) => {
                tracing::warn!(error = %err, "page title lookup failed");
                ApiError::NotFound("uri does not exist or its title cannot be read".to_string())
            }
            SubmitError::Store(err) => ApiError::Store(err),
        }
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message.clone()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            ApiError::Store(err) => match err {
                StoreError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                StoreError::InvalidParam(_) | StoreError::InvalidParent(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                StoreError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
                StoreError::Timeout => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
                StoreError::Unhandled(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    UNHANDLED_STORAGE_MESSAGE.to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use quill_infra::db::StoreError;

    use super::ApiError;
    use crate::submission::SubmitError;

    fn status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(status(StoreError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(StoreError::InvalidParent(3).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(StoreError::Conflict("thread".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(status(StoreError::Timeout.into()), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status(StoreError::Unhandled(sqlx::Error::PoolClosed).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn submit_errors_map_to_statuses() {
        assert_eq!(
            status(SubmitError::Forbidden("ratelimit exceeded".to_string()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(SubmitError::Store(StoreError::InvalidParent(1)).into()),
            StatusCode::BAD_REQUEST
        );
    }
}
