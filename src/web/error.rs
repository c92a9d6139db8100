//! API error handling for warden.
//!
//! Every failure leaves the service as the standard envelope
//! `{ success: false, message, data?, errors? }` with the status carrying
//! the error class.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthError;
use crate::rate_limit::retry_after_secs;
use crate::web::dto::{ApiResponse, FieldError};

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    data: Option<Value>,
    errors: Option<Vec<FieldError>>,
    retry_after: Option<u64>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
            errors: None,
            retry_after: None,
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Create a service unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Create a validation error with field-level details.
    pub fn validation(mut errors: Vec<FieldError>) -> Self {
        errors.sort_by(|a, b| a.field.cmp(&b.field).then(a.message.cmp(&b.message)));
        Self {
            errors: Some(errors),
            ..Self::bad_request("Validation failed")
        }
    }

    /// Create a validation error from validator::ValidationErrors.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let mut details = Vec::new();

        for (field, field_errors) in errors.field_errors() {
            for e in field_errors {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                details.push(FieldError {
                    field: field.to_string(),
                    message,
                });
            }
        }

        Self::validation(details)
    }

    /// Attach envelope data.
    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body: ApiResponse<Value> = ApiResponse {
            success: false,
            message: Some(self.message),
            data: self.data,
            errors: self.errors,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = err.status();
        let message = err.to_string();
        match err {
            AuthError::Banned(info) => {
                ApiError::new(status, message).with_data(serde_json::json!({ "ban": info }))
            }
            AuthError::Validation(details) => {
                let errors = details
                    .into_iter()
                    .flat_map(|(field, messages)| {
                        messages.into_iter().map(move |message| FieldError {
                            field: field.clone(),
                            message,
                        })
                    })
                    .collect();
                ApiError::validation(errors)
            }
            AuthError::RateLimited { retry_after } => {
                let secs = retry_after_secs(retry_after);
                ApiError {
                    retry_after: Some(secs),
                    ..ApiError::new(
                        status,
                        format!("Too many requests, please try again in {secs} seconds"),
                    )
                }
            }
            AuthError::Dependency(detail) => {
                tracing::error!(detail = %detail, "Dependency failure");
                ApiError::new(status, message)
            }
            _ => ApiError::new(status, message),
        }
    }
}

impl From<crate::WardenError> for ApiError {
    fn from(err: crate::WardenError) -> Self {
        AuthError::from(err).into()
    }
}
