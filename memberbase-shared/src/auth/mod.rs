/// Authentication primitives for Memberbase
///
/// # Modules
///
/// - [`password`]: Argon2id hashing, verification and the repository's
///   credential verifier
/// - [`jwt`]: access and refresh token issuing and validation
///
/// # Example
///
/// ```
/// use memberbase_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use memberbase_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Secret#123")?;
/// assert!(verify_password("Secret#123", &hash)?);
///
/// let secret = "an-example-secret-that-is-32-bytes!";
/// let token = create_token(&Claims::new("Member-3f2a", TokenType::Access), secret)?;
/// assert_eq!(validate_token(&token, secret)?.sub, "Member-3f2a");
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod password;
