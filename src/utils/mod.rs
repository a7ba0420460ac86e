//! Utility modules
//!
//! Timeout handling and string helpers.

pub mod string;
pub mod timeout;

pub use string::{preview, truncate_str};
pub use timeout::{with_timeout, TimeoutError, DEFAULT_ATTEMPT_TIMEOUT};
