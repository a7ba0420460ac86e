//! API endpoint handlers module
//!
//! Contains all HTTP endpoint handler implementations.

pub mod admin;
pub mod game;
pub mod health;
pub mod image;
