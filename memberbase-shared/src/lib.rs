//! # Memberbase Shared Library
//!
//! Member data-access core used by the Memberbase API server.
//!
//! ## Module Organization
//!
//! - `models`: member records, search criteria and paging
//! - `db`: store traits, PostgreSQL and in-memory stores, filter builder,
//!   transaction coordinator, pool and migrations
//! - `repository`: the member repository and its injected collaborators
//! - `auth`: password hashing and JWT helpers
//! - `error`: store, validation and repository error types

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;

/// Current version of the Memberbase shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
