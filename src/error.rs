//! The single error type every handler returns.
//!
//! An [`ApiError`] is built once, at the point of failure, and never mutated
//! afterwards. Rendering happens in `IntoResponse`, and the response carries
//! the underlying error in its extensions so the centralized formatter in
//! [`crate::lifecycle`] can log it and, in debug mode, expose the cause.

use std::{fmt, sync::Arc};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
    errors: Vec<String>,
    cause: Option<String>,
}

/// Wire shape of a failure: `{statusCode, success:false, data:null, message, errors}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub success: bool,
    pub data: Option<()>,
    pub message: String,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Marker placed in response extensions by [`ApiError::into_response`].
#[derive(Debug, Clone)]
pub struct ErrorReport(pub Arc<ApiError>);

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
            cause: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Storage or object-store failure. The message is what clients see; the
    /// cause stays server side unless debug errors are enabled.
    pub fn upstream(message: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message).with_cause(cause)
    }

    pub fn with_details<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors = errors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    pub fn body(&self, include_cause: bool) -> ErrorBody {
        ErrorBody {
            status_code: self.status.as_u16(),
            success: false,
            data: None,
            message: self.message.clone(),
            errors: self.errors.clone(),
            stack: if include_cause {
                self.cause.clone()
            } else {
                None
            },
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::upstream("Internal server error", format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body(false))).into_response();
        response.extensions_mut().insert(ErrorReport(Arc::new(self)));
        response
    }
}
