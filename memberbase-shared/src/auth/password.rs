/// Password hashing with Argon2id
///
/// Parameters: 64 MiB memory, 3 passes, 4 lanes, 32-byte output. They are
/// encoded in the PHC string, so verification reads them back from the hash
/// instead of assuming the current defaults.
///
/// [`Argon2Verifier`] adapts [`verify_password`] to the repository's
/// [`CredentialVerifier`] seam.
///
/// # Example
///
/// ```
/// use memberbase_shared::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("Tr0ub4dor&3").unwrap();
/// assert!(verify_password("Tr0ub4dor&3", &hash).unwrap());
/// assert!(!verify_password("tr0ub4dor&3", &hash).unwrap());
/// ```

use crate::repository::collaborators::CredentialVerifier;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};
use std::sync::OnceLock;

static DECOY_HASH: OnceLock<String> = OnceLock::new();

/// Password hashing and verification errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// The stored value is not a PHC hash string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes `password` with a fresh random salt
///
/// # Errors
///
/// Only if the Argon2 parameters are rejected, which indicates a build
/// problem rather than bad input.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Checks `password` against a stored PHC hash in constant time
///
/// `Ok(false)` means the password is wrong; `Err` means the hash itself is
/// unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Minimum strength for newly registered passwords
///
/// At least 8 characters with an uppercase letter, a lowercase letter, a
/// digit and a symbol.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(char::is_numeric) {
        return Err("Password must contain at least one digit".to_string());
    }
    if password.chars().all(char::is_alphanumeric) {
        return Err("Password must contain at least one special character".to_string());
    }
    Ok(())
}

/// Argon2id credential verifier used by the member repository
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn verify(&self, credential: &str, hash: &str) -> Result<bool, PasswordError> {
        verify_password(credential, hash)
    }

    fn decoy_hash(&self) -> String {
        decoy_hash().to_string()
    }
}

/// Process-wide hash with the same parameters as stored hashes
///
/// Computed on first use. Matches no password anyone registers.
pub fn decoy_hash() -> &'static str {
    DECOY_HASH.get_or_init(|| {
        let token = uuid::Uuid::new_v4().simple().to_string();
        hash_password(&token).unwrap_or_default()
    })
}
