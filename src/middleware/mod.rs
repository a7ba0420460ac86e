//! Middleware module
//!
//! HTTP middleware for admin authentication and request logging.

pub mod auth;
pub mod logging;

pub use auth::{require_admin_key, AdminAuth, ADMIN_KEY_HEADER};
pub use logging::{log_request, TraceId, REQUEST_ID_HEADER, TRACE_ID_HEADER};
