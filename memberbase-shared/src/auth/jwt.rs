/// JWT issuing and validation
///
/// Tokens are HS256-signed. The subject is the member ID and the issuer is
/// always [`ISSUER`]. Access tokens live 24 hours and authorize API calls;
/// refresh tokens live 30 days and can only be exchanged for a new pair.
/// Tokens issued at login carry the device the member logged in from.
///
/// # Example
///
/// ```
/// use memberbase_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
///
/// let secret = "an-example-secret-that-is-32-bytes!";
/// let claims = Claims::new("Member-3f2a", TokenType::Access).with_device(Some("pixel-7".into()));
///
/// let token = create_token(&claims, secret).unwrap();
/// let decoded = validate_access_token(&token, secret).unwrap();
/// assert_eq!(decoded.sub, "Member-3f2a");
/// assert_eq!(decoded.device_id.as_deref(), Some("pixel-7"));
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// `iss` claim of every token
pub const ISSUER: &str = "memberbase";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    /// Access token presented where a refresh token was expected, or the reverse
    #[error("Expected {expected} token, got {actual} token")]
    WrongTokenType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid issuer")]
    InvalidIssuer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Registered claims plus the token type and login device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Member ID
    pub sub: String,

    pub iss: String,

    pub iat: i64,

    pub exp: i64,

    pub nbf: i64,

    pub token_type: TokenType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Claims {
    /// Claims expiring after the token type's default lifetime
    pub fn new(member_id: impl Into<String>, token_type: TokenType) -> Self {
        Self::with_expiration(member_id, token_type, token_type.default_expiration())
    }

    pub fn with_expiration(
        member_id: impl Into<String>,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: member_id.into(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
            device_id: None,
        }
    }

    pub fn with_device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds left before expiry, `None` once expired
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        (self.exp > now).then(|| Duration::seconds(self.exp - now))
    }
}

/// Signs `claims` with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, issuer, `exp` and `nbf`; accepts either token type
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            _ => JwtError::ValidationError(e.to_string()),
        })
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Access)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Refresh)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::WrongTokenType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::hours(24));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(30));
    }

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new("Member-1", TokenType::Refresh);

        assert_eq!(claims.sub, "Member-1");
        assert_eq!(claims.iss, "memberbase");
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.device_id, None);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_custom_expiration() {
        let claims = Claims::with_expiration("Member-1", TokenType::Access, Duration::hours(1));
        let left = claims.time_until_expiration().unwrap();
        assert!(left.num_seconds() > 3500);
        assert!(left.num_seconds() <= 3600);
    }

    #[test]
    fn test_create_and_validate() {
        let claims = Claims::new("Member-1", TokenType::Access).with_device(Some("tab-9".to_string()));
        let token = create_token(&claims, SECRET).unwrap();

        let decoded = validate_token(&token, SECRET).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(&Claims::new("Member-1", TokenType::Access), SECRET).unwrap();
        let result = validate_token(&token, "a-different-secret-that-is-long-enough");
        assert!(matches!(result, Err(JwtError::ValidationError(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims::with_expiration("Member-1", TokenType::Access, Duration::hours(-2));
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut claims = Claims::new("Member-1", TokenType::Access);
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::InvalidIssuer)));
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let access = create_token(&Claims::new("Member-1", TokenType::Access), SECRET).unwrap();
        let refresh = create_token(&Claims::new("Member-1", TokenType::Refresh), SECRET).unwrap();

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongTokenType { expected: "access", actual: "refresh" })
        ));
        assert!(matches!(
            validate_refresh_token(&access, SECRET),
            Err(JwtError::WrongTokenType { expected: "refresh", actual: "access" })
        ));
    }
}
