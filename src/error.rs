use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Central error taxonomy. Each variant carries enough information for its
/// caller to decide whether to retry, requeue, or surface to an HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed")]
    ValidationFailed(HashMap<String, String>),

    #[error("too many requests in flight")]
    TooManyRequests,

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("worker {0} not found")]
    WorkerNotFound(String),

    #[error("worker {0} is already online")]
    WorkerAlreadyOnline(String),

    #[error("recoverable transport error: {0}")]
    RecoverableTransport(#[source] anyhow::Error),

    #[error("permanent payload error: {0}")]
    PermanentPayload(#[source] anyhow::Error),

    #[error("fatal: {0}")]
    Fatal(#[source] anyhow::Error),
}

impl AppError {
    /// Whether a broker delivery that failed with this error should be
    /// requeued (recoverable) or dead-lettered (permanent). This is the
    /// classification kitchen-worker and notification-subscriber consult
    /// before nacking a delivery; unlike the always-recoverable shortcut
    /// this replaces, only a narrow set of variants requeue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::RecoverableTransport(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::OrderNotFound("unknown".into()),
            other => AppError::RecoverableTransport(other.into()),
        }
    }
}

impl From<lapin::Error> for AppError {
    fn from(err: lapin::Error) -> Self {
        AppError::RecoverableTransport(err.into())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ErrorBody {
    Fields(HashMap<String, String>),
    Message(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ValidationFailed(fields) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorBody::Fields(fields))
            }
            AppError::TooManyRequests => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::Message("internal error".into()),
            ),
            AppError::OrderNotFound(number) => (
                StatusCode::NOT_FOUND,
                ErrorBody::Message(format!("order {number} not found")),
            ),
            AppError::WorkerNotFound(name) => (
                StatusCode::NOT_FOUND,
                ErrorBody::Message(format!("worker {name} not found")),
            ),
            AppError::WorkerAlreadyOnline(name) => (
                StatusCode::CONFLICT,
                ErrorBody::Message(format!("worker {name} is already online")),
            ),
            AppError::RecoverableTransport(err) => {
                tracing::error!(error = %err, "recoverable transport error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::Message("internal error".into()),
                )
            }
            AppError::PermanentPayload(err) => {
                tracing::error!(error = %err, "permanent payload error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::Message("internal error".into()),
                )
            }
            AppError::Fatal(err) => {
                tracing::error!(error = %err, "fatal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::Message("internal error".into()),
                )
            }
        };
        (status, Json(ErrorEnvelope { error: body })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
