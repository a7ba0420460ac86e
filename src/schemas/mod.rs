//! Schema module
//!
//! Wire types for the HTTP routes and the upstream Gemini and Stable Horde APIs.

pub mod game;
pub mod gemini;
pub mod horde;
