//! Admin authentication middleware
//!
//! Operator routes (key status, forced exhaustion, notification ping, key
//! tests) require the configured admin key in `x-admin-key` or
//! `Authorization: Bearer <key>`. Without a configured key they stay closed.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::services::key_pool::redact;

/// Header carrying the admin key
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// State required by [`require_admin_key`]
#[derive(Clone, Default)]
pub struct AdminAuth {
    admin_key: Option<Arc<str>>,
}

impl AdminAuth {
    pub fn new(admin_key: Option<String>) -> Self {
        Self {
            admin_key: admin_key.map(Arc::from),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.admin_key.is_some()
    }
}

/// Extract the presented admin key from request headers
pub fn extract_admin_key<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string())
        })
}

/// Middleware guarding the operator routes
///
/// # Errors
/// - 403 Forbidden: no admin key is configured
/// - 401 Unauthorized: key missing or wrong
pub async fn require_admin_key(
    State(auth): State<AdminAuth>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = auth.admin_key.as_deref() else {
        tracing::warn!(path = %request.uri().path(), "Admin route called but ADMIN_API_KEY is not set");
        return Err(ApiError::Forbidden("Admin routes are disabled".to_string()));
    };

    let Some(presented) = extract_admin_key(&request) else {
        tracing::warn!(path = %request.uri().path(), "Admin request missing key");
        return Err(ApiError::Unauthorized(
            "Missing admin key. Include 'x-admin-key' or 'Authorization: Bearer <key>' header.".to_string(),
        ));
    };

    if presented != expected {
        tracing::warn!(key = %redact(&presented), "Invalid admin key");
        return Err(ApiError::Unauthorized("Invalid admin key".to_string()));
    }

    Ok(next.run(request).await)
}
