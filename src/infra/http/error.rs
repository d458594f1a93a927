//! JSON error responses.
//!
//! Bodies stay generic (`{"error": ...}`, plus `retryAfter` on 429); the full
//! error chain is attached as an [`ErrorReport`] extension for the logging
//! middleware instead of being sent to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::admin::AdminError;
use crate::application::auth::AuthError;
use crate::application::blog::BlogError;
use crate::application::error::ErrorReport;
use crate::application::events::EventError;
use crate::application::users::UserError;

const SOURCE: &str = "infra::http::error";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retry_after: Option<u64>,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Too many requests.".to_string(),
            retry_after: Some(retry_after_secs),
            detail: None,
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").with_detail(detail)
    }

    fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
        )
        .with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message.clone(),
            retry_after: self.retry_after,
        };
        let mut response = (self.status, Json(body)).into_response();

        if let Some(retry_after) = self.retry_after
            && let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string())
        {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, value);
        }

        let detail = self.detail.unwrap_or(self.message);
        ErrorReport::from_message(SOURCE, self.status, detail).attach(&mut response);
        response
    }
}

impl From<UserError> for ApiError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::RateLimited { retry_after_secs } => Self::rate_limited(retry_after_secs),
            UserError::Validation(message) => Self::validation(message),
            UserError::EmailTaken => Self::new(StatusCode::CONFLICT, "Email already in use."),
            UserError::NotFound => Self::not_found("User not found"),
            UserError::Repo(inner) => Self::internal(inner.to_string()),
            UserError::Store(inner) => Self::unavailable(inner.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::RateLimited { retry_after_secs } => Self::rate_limited(retry_after_secs),
            AuthError::Validation(message) => Self::validation(message),
            AuthError::EmailTaken => Self::new(StatusCode::CONFLICT, "Email already in use."),
            AuthError::InvalidCredentials => Self::unauthorized("Invalid credentials."),
            AuthError::Unauthorized => Self::unauthorized("Invalid or expired token."),
            AuthError::NotFound => Self::not_found("Account not found"),
            AuthError::Repo(inner) => Self::internal(inner.to_string()),
            AuthError::Store(inner) => Self::unavailable(inner.to_string()),
        }
    }
}

impl From<BlogError> for ApiError {
    fn from(error: BlogError) -> Self {
        match error {
            BlogError::RateLimited { retry_after_secs } => Self::rate_limited(retry_after_secs),
            BlogError::Validation(message) => Self::validation(message),
            BlogError::NotFound => Self::not_found("Resource not found"),
            BlogError::Forbidden => Self::new(StatusCode::FORBIDDEN, "Not authorized"),
            BlogError::Repo(inner) => Self::internal(inner.to_string()),
            BlogError::Store(inner) => Self::unavailable(inner.to_string()),
        }
    }
}

impl From<EventError> for ApiError {
    fn from(error: EventError) -> Self {
        match error {
            EventError::RateLimited { retry_after_secs } => Self::rate_limited(retry_after_secs),
            EventError::Validation(message) => Self::validation(message),
            EventError::NotFound => Self::not_found("Event not found"),
            EventError::Repo(inner) => Self::internal(inner.to_string()),
            EventError::Store(inner) => Self::unavailable(inner.to_string()),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(error: AdminError) -> Self {
        match error {
            AdminError::Store(inner) => Self::unavailable(inner.to_string()),
        }
    }
}
