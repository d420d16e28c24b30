use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use platform_authz::{AuthzError, DenyReason, LifecycleError};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

mod page;
mod validation;

pub use page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageParams};
pub use validation::{FieldErrors, NON_FIELD_ERRORS, REQUIRED};

/// Shared handler result type.
pub type ApiResult<T> = Result<T, ApiError>;

const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
const FORBIDDEN: &str = "You do not have permission to perform this action.";
const GENERIC: &str = "An error occurred while processing your request.";
const UNEXPECTED: &str = "An unexpected error occurred.";

static EXPOSE_DETAIL: AtomicBool = AtomicBool::new(false);

/// Echo internal error detail to clients. Off unless configured.
pub fn expose_error_detail(enabled: bool) {
    EXPOSE_DETAIL.store(enabled, Ordering::Relaxed);
}

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("{0}")]
    AuthenticationRequired(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    InvalidStateTransition(String),
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("Not found.")]
    NotFound,
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::AuthenticationRequired(_) => "AUTHENTICATION_REQUIRED",
            ApiError::PermissionDenied(_) => "PERMISSION_DENIED",
            ApiError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            ApiError::Validation(_) => "VALIDATION",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidStateTransition(_) | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::AuthenticationRequired(NOT_AUTHENTICATED.into())
    }

    pub fn forbidden() -> Self {
        Self::PermissionDenied(FORBIDDEN.into())
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field(NON_FIELD_ERRORS, message)
    }

    /// `(message, error)` pair of the response envelope.
    fn envelope_parts(&self) -> (String, Value) {
        match self {
            ApiError::Validation(errors) => (GENERIC.to_string(), json!(errors)),
            ApiError::Internal(err) => {
                let detail = if EXPOSE_DETAIL.load(Ordering::Relaxed) {
                    format!("{err:#}")
                } else {
                    "internal server error".to_string()
                };
                (UNEXPECTED.to_string(), Value::String(detail))
            }
            other => {
                let detail = other.to_string();
                (detail.clone(), json!({ "detail": detail }))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            error!(error = ?err, "request failed");
        }
        let (message, error) = self.envelope_parts();
        let body = json!({
            "success": false,
            "message": message,
            "error": error,
            "data": Value::Null,
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(value: sea_orm::DbErr) -> Self {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) = value.sql_err() {
            return Self::non_field("A record with these values already exists.");
        }
        Self::internal(value.into())
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated => Self::unauthenticated(),
            AuthzError::Denied {
                reason: DenyReason::SelfRoleChange,
                ..
            } => Self::PermissionDenied("You cannot change your own role.".into()),
            AuthzError::Denied {
                reason: DenyReason::ProtectedUser,
                ..
            } => Self::PermissionDenied("You don't have permission to update this user.".into()),
            AuthzError::Denied { .. } => Self::forbidden(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::InvalidState(message) => Self::InvalidStateTransition(message),
            LifecycleError::Forbidden { .. } => Self::forbidden(),
            LifecycleError::Unauthenticated => Self::unauthenticated(),
        }
    }
}

/// Malformed or mistyped JSON bodies are validation failures, not 422s.
impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(value: axum::extract::rejection::JsonRejection) -> Self {
        Self::non_field(value.body_text())
    }
}

impl From<FieldErrors> for ApiError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use platform_authz::{Operation, ResourceKind};

    use super::*;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_are_masked() {
        let (status, body) = render(ApiError::internal(anyhow::anyhow!("boom"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!(UNEXPECTED));
        assert_eq!(body["error"], json!("internal server error"));
        assert_eq!(body["data"], Value::Null);
    }

    #[tokio::test]
    async fn validation_errors_are_field_keyed() {
        let mut errors = FieldErrors::new();
        errors.required("scheduled_date");
        let (status, body) = render(errors.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            json!({ "scheduled_date": ["This field is required."] })
        );
    }

    #[tokio::test]
    async fn denials_map_to_status_codes() {
        let (status, body) = render(AuthzError::Unauthenticated.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], json!(NOT_AUTHENTICATED));

        let denied = AuthzError::Denied {
            operation: Operation::UPDATE,
            kind: ResourceKind::Loan,
            reason: DenyReason::Ownership,
        };
        let (status, body) = render(denied.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["detail"], json!(FORBIDDEN));
    }

    #[tokio::test]
    async fn invalid_transitions_are_bad_requests() {
        let err = LifecycleError::InvalidState("Paid loans cannot be written off.".into());
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Paid loans cannot be written off."));
    }
}
