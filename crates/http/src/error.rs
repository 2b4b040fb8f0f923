//! Error handling for the libris HTTP layer
//!
//! [`AppError`] is the only place that decides the status code and body of a
//! failed request. Handlers return it through `?` and never render failures
//! themselves.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Request, State,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use libris_db::DbError;
use serde_json::{json, Value};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

tokio::task_local! {
    /// Whether error bodies rendered by the current request carry a `stack`.
    static DIAGNOSTICS: bool;
}

/// Middleware that scopes the diagnostics flag around the rest of the stack.
/// Installed by `RouterBuilder::with_error_diagnostics`.
pub async fn scope_diagnostics(State(enabled): State<bool>, request: Request, next: Next) -> Response {
    DIAGNOSTICS.scope(enabled, next.run(request)).await
}

/// Outside a diagnostics scope errors never carry a `stack`.
fn diagnostics_enabled() -> bool {
    DIAGNOSTICS.try_with(|enabled| *enabled).unwrap_or(false)
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<Value>,
        message: String,
    },

    #[error("Invalid {field}: {value}.")]
    InvalidId { field: String, value: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Failure that already knows its status, e.g. an extractor rejection.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidId { .. } | AppError::BadRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Status { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::InvalidId { .. } => "invalid_id",
            AppError::NotFound { .. } => "not_found",
            AppError::BadRequest { .. } => "bad_request",
            AppError::Status { .. } => "request_rejected",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        let message = err.to_string();
        match err {
            DbError::Validation { errors, .. } => {
                let details = errors
                    .into_iter()
                    .map(|error| json!({"field": error.field, "message": error.message}))
                    .collect();
                AppError::validation(details, message)
            }
            DbError::InvalidId { field, value } => AppError::InvalidId {
                field: field.to_string(),
                value,
            },
            other => AppError::Internal(anyhow::Error::new(other).context("store operation failed")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Status {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Status {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                error_code = code,
                status_code = status.as_u16(),
                error = ?self,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = code,
                status_code = status.as_u16(),
                "Request rejected"
            );
        }

        let stack = match &self {
            AppError::Internal(err) if diagnostics_enabled() => Some(format!("{err:?}")),
            _ => None,
        };

        let (message, details) = match self {
            AppError::Validation { details, message } => (message, Some(details)),
            AppError::NotFound { message }
            | AppError::BadRequest { message }
            | AppError::Status { message, .. } => (message, None),
            other @ AppError::InvalidId { .. } => (other.to_string(), None),
            AppError::Internal(err) => (format!("{err:#}"), None),
        };

        let mut body = json!({
            "status": status.as_u16(),
            "code": code,
            "message": message,
            "trace_id": error_id.to_string(),
            "timestamp": timestamp
        });
        if let Some(details) = details {
            body["details"] = Value::Array(details);
        }
        if let Some(stack) = stack {
            body["stack"] = Value::String(stack);
        }

        (status, Json(body)).into_response()
    }
}
