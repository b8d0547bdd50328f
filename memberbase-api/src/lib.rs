//! # Memberbase API Server Library
//!
//! HTTP surface over the member repository in `memberbase-shared`.
//!
//! ## Modules
//!
//! - `app`: application state, router and JWT guard
//! - `config`: configuration from the environment
//! - `error`: error handling and HTTP response mapping
//! - `middleware`: per-request execution context
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
