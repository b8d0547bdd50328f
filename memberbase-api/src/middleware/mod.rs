//! Middleware for the API server
//!
//! - `context`: per-request trace ID and execution deadline

pub mod context;
