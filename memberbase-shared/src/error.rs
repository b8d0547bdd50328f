//! Error types for the member data-access layer
//!
//! Three layers of errors flow through the repository:
//!
//! - [`StoreError`]: failures of the underlying store (transport, transaction
//!   primitives, unique-key violations, cancellation)
//! - [`ValidationError`]: input rejected before any store access
//! - [`MemberError`]: what repository callers see; wraps the two above and adds
//!   the domain outcomes (duplicate, not found, authentication, suspended)
//!
//! Authentication failures deliberately carry no detail: a wrong password and
//! an unknown username produce the same [`MemberError::Authentication`].

/// Error raised by a store or by the transaction coordinator
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Error reported by the database driver
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A unique index rejected the write
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// The execution context was cancelled while `op` was running
    #[error("Operation cancelled during {op}")]
    Cancelled { op: &'static str },

    /// The execution context's deadline passed while `op` was running
    #[error("Deadline exceeded during {op}")]
    DeadlineExceeded { op: &'static str },

    /// A stored row could not be mapped back into a record
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

/// Input rejected before touching the store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is missing or blank
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    /// Neither phone number nor email was supplied
    #[error("phone number or email must be filled")]
    PhoneOrEmailRequired,

    /// Page numbers are 1-based
    #[error("page must be at least 1, got {0}")]
    InvalidPage(i64),

    /// Page size must be positive
    #[error("page size must be at least 1, got {0}")]
    InvalidPageSize(i64),
}

impl ValidationError {
    /// Name of the offending field, for structured error responses
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingField(field) => field,
            ValidationError::PhoneOrEmailRequired => "phone_number",
            ValidationError::InvalidPage(_) => "page",
            ValidationError::InvalidPageSize(_) => "size",
        }
    }
}

/// Error returned by member repository operations
#[derive(Debug, thiserror::Error)]
pub enum MemberError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Username, phone number or email already registered
    #[error("Data registration has been taken")]
    Duplicate,

    #[error("Member not found: {0}")]
    NotFound(String),

    /// Unknown username or wrong credential
    #[error("Invalid username or password")]
    Authentication,

    #[error("Account is suspended")]
    Suspended,

    /// The stored credential hash could not be checked
    #[error("Credential verification failed: {0}")]
    Credential(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MemberError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { .. } => MemberError::Duplicate,
            other => MemberError::Store(other),
        }
    }
}
