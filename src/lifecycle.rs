//! Request lifecycle: everything between the socket and a handler's
//! `Result`.
//!
//! Handlers return [`ApiResult`] and bail out with `?`; nothing is caught and
//! continued. The layers installed by [`with_lifecycle`] then guarantee that
//! every response leaving the server is either a success envelope or a
//! failure envelope:
//!
//! * handler and extractor failures render themselves as envelopes and are
//!   logged here, once, by [`format_errors`];
//! * framework-generated errors (unknown route, wrong method, body too large)
//!   are rewritten into the same envelope;
//! * panics are caught and answered with a 500 instead of tearing down the
//!   connection.

use std::{any::Any, sync::Arc};

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tokio::task;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::error::{ApiError, ApiResult, ErrorReport};

/// Runs blocking store work off the async executor. Join failures and store
/// errors both surface as opaque 500s.
pub async fn blocking<F, T>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::upstream("Internal server error", format!("task join error: {err}")))?
        .map_err(ApiError::from)
}

/// Settings the formatter needs; cheap to clone into the middleware state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorFormatting {
    pub debug: bool,
}

/// Wraps `router` in the error formatter, panic catcher and request tracing.
pub fn with_lifecycle<S>(router: Router<S>, formatting: ErrorFormatting) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(formatting, format_errors))
        .layer(TraceLayer::new_for_http())
}

pub async fn format_errors(
    State(formatting): State<ErrorFormatting>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;

    if let Some(ErrorReport(err)) = response.extensions().get::<ErrorReport>().cloned() {
        log_failure(&err, &method, &uri);
        if formatting.debug && err.cause().is_some() {
            return render(err, true);
        }
        return response;
    }

    let status = response.status();
    if status_is_failure(status) {
        let message = status.canonical_reason().unwrap_or("Request failed");
        let err = Arc::new(ApiError::new(status, message));
        log_failure(&err, &method, &uri);
        let allow = response.headers().get(header::ALLOW).cloned();
        let mut rendered = render(err, false);
        if let Some(allow) = allow {
            rendered.headers_mut().insert(header::ALLOW, allow);
        }
        return rendered;
    }

    response
}

fn render(err: Arc<ApiError>, include_cause: bool) -> Response {
    let mut response = (err.status(), Json(err.body(include_cause))).into_response();
    response.extensions_mut().insert(ErrorReport(err));
    response
}

fn log_failure(err: &ApiError, method: &Method, uri: &Uri) {
    let status = err.status().as_u16();
    if err.status().is_server_error() {
        tracing::error!(
            %method,
            path = uri.path(),
            status,
            cause = err.cause().unwrap_or_default(),
            "{}",
            err.message()
        );
    } else {
        tracing::warn!(%method, path = uri.path(), status, "{}", err.message());
    }
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };

    let mut response = ApiError::upstream("Internal server error", format!("handler panicked: {detail}"))
        .into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Fallback for paths no route matches.
pub async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {} not found", uri.path()))
}

fn status_is_failure(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}
