//! Request logging middleware
//!
//! Logs every request and its outcome with a trace ID for correlation. The
//! trace ID is taken from `x-trace-id` or `x-request-id` when the caller
//! sends one, stored in request extensions, and echoed on the response.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Header name for trace ID
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Header name for request ID (alias for trace ID)
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension type for storing trace ID in request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_headers(request: &Request) -> Self {
        [TRACE_ID_HEADER, REQUEST_ID_HEADER]
            .iter()
            .find_map(|name| {
                request
                    .headers()
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.is_empty())
            })
            .map(|v| Self(v.to_string()))
            .unwrap_or_default()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Middleware to log HTTP requests and responses
///
/// ```ignore
/// Router::new()
///     .layer(axum::middleware::from_fn(log_request))
/// ```
pub async fn log_request(mut request: Request, next: Next) -> Response<Body> {
    let start = Instant::now();
    let trace_id = TraceId::from_headers(&request);

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        path = %path,
        user_agent = %user_agent,
        "Incoming request"
    );

    request.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );
    let mut response = next.run(request).instrument(span).await;

    let status = response.status();
    let duration_ms = format!("{:.2}", start.elapsed().as_secs_f64() * 1000.0);
    log_outcome(status, &trace_id, &method, &path, &duration_ms);

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value.clone());
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

fn log_outcome(
    status: StatusCode,
    trace_id: &TraceId,
    method: &axum::http::Method,
    path: &str,
    duration_ms: &str,
) {
    let code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(trace_id = %trace_id, method = %method, path = %path, status = code, duration_ms = %duration_ms, "Server error");
    } else if status.is_client_error() {
        tracing::warn!(trace_id = %trace_id, method = %method, path = %path, status = code, duration_ms = %duration_ms, "Client error");
    } else {
        tracing::info!(trace_id = %trace_id, method = %method, path = %path, status = code, duration_ms = %duration_ms, "Request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Extension, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/echo", get(|Extension(id): Extension<TraceId>| async move { id.0 }))
            .layer(middleware::from_fn(log_request))
    }

    #[test]
    fn test_trace_id_generation() {
        let trace_id = TraceId::new();
        // UUID v4 format: xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx
        assert_eq!(trace_id.as_str().len(), 36);
        assert_ne!(trace_id, TraceId::new());
    }

    #[tokio::test]
    async fn test_incoming_trace_id_is_kept() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/echo")
                    .header(REQUEST_ID_HEADER, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(TRACE_ID_HEADER).unwrap(), "req-123");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"req-123");
    }

    #[tokio::test]
    async fn test_trace_id_generated_when_absent() {
        let response = app()
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response.headers().get(TRACE_ID_HEADER).unwrap().to_str().unwrap().to_string();
        assert_eq!(header.len(), 36);
        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), header.as_str());
    }
}
