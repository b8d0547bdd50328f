/// Member model
///
/// A member is a registered account that can authenticate with a username and
/// password. Members are created once, mutated by profile updates and logins,
/// and never hard-deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE members (
///     id VARCHAR(64) PRIMARY KEY,
///     username VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     full_name VARCHAR(255) NOT NULL,
///     member_type VARCHAR(64) NOT NULL,
///     is_suspended BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     last_login_at TIMESTAMPTZ,
///     device_id VARCHAR(255),
///     push_token VARCHAR(512),
///     phone_number VARCHAR(32) UNIQUE,
///     email VARCHAR(255) UNIQUE,
///     photo_url VARCHAR(512)
/// );
/// ```

use crate::error::ValidationError;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every member ID
pub const MEMBER_ID_PREFIX: &str = "Member-";

/// Builds a member ID from a random token
///
/// # Example
///
/// ```
/// use memberbase_shared::models::member::member_id;
///
/// assert_eq!(member_id("3f2a"), "Member-3f2a");
/// ```
pub fn member_id(token: &str) -> String {
    format!("{}{}", MEMBER_ID_PREFIX, token)
}

/// Persisted member record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// `Member-<token>`, assigned once at creation
    pub id: String,

    pub username: String,

    /// Argon2id password hash, never the plaintext
    pub password_hash: String,

    pub full_name: String,

    /// Lowercase slug, e.g. `gold-member`
    pub member_type: String,

    pub is_suspended: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Last successful login, in the configured login offset
    pub last_login_at: Option<DateTime<FixedOffset>>,

    pub device_id: Option<String>,

    pub push_token: Option<String>,

    pub phone_number: Option<String>,

    pub email: Option<String>,

    pub photo_url: Option<String>,
}

impl MemberRecord {
    /// Builds a fresh record from validated creation data
    ///
    /// Blank optional fields are stored as `None` and the member type is
    /// slugified. Callers are expected to have run [`CreateMember::validate`].
    pub fn new(id: String, data: CreateMember, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username: data.username.trim().to_string(),
            password_hash: data.password_hash,
            full_name: data.full_name.trim().to_string(),
            member_type: slugify(&data.member_type),
            is_suspended: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
            device_id: None,
            push_token: None,
            phone_number: non_blank(data.phone_number),
            email: non_blank(data.email),
            photo_url: non_blank(data.photo_url),
        }
    }

    /// Checks the phone-or-email invariant
    pub fn validate_contact(&self) -> Result<(), ValidationError> {
        if is_blank(self.phone_number.as_deref()) && is_blank(self.email.as_deref()) {
            return Err(ValidationError::PhoneOrEmailRequired);
        }
        Ok(())
    }

    /// Normalizes blank optional fields to `None`
    pub fn normalized(mut self) -> Self {
        self.device_id = non_blank(self.device_id);
        self.push_token = non_blank(self.push_token);
        self.phone_number = non_blank(self.phone_number);
        self.email = non_blank(self.email);
        self.photo_url = non_blank(self.photo_url);
        self
    }
}

/// Input for registering a new member
///
/// The password must already be hashed; the repository never sees plaintext
/// passwords on this path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMember {
    pub username: String,

    pub password_hash: String,

    pub full_name: String,

    /// Free-form type label, slugified on creation
    pub member_type: String,

    pub phone_number: Option<String>,

    pub email: Option<String>,

    pub photo_url: Option<String>,
}

impl CreateMember {
    /// Validates required fields and the phone-or-email rule
    ///
    /// # Errors
    ///
    /// Returns the first failed rule, checked in the order username,
    /// password, full name, member type, contact.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(Some(&self.username)) {
            return Err(ValidationError::MissingField("username"));
        }
        if is_blank(Some(&self.password_hash)) {
            return Err(ValidationError::MissingField("password"));
        }
        if is_blank(Some(&self.full_name)) {
            return Err(ValidationError::MissingField("full_name"));
        }
        if slugify(&self.member_type).is_empty() {
            return Err(ValidationError::MissingField("member_type"));
        }
        if is_blank(self.phone_number.as_deref()) && is_blank(self.email.as_deref()) {
            return Err(ValidationError::PhoneOrEmailRequired);
        }
        Ok(())
    }
}

/// Login request handed to the repository
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberAuthRequest {
    pub username: String,

    /// Raw credential, verified against the stored hash
    pub password: String,

    /// Replaces the stored device ID when non-blank
    pub device_id: Option<String>,

    /// Replaces the stored push token when non-blank
    pub push_token: Option<String>,
}

/// Lowercase, hyphen-separated slug of `input`
///
/// Runs of non-alphanumeric characters collapse into a single `-`, and
/// leading/trailing separators are dropped.
///
/// # Example
///
/// ```
/// use memberbase_shared::models::member::slugify;
///
/// assert_eq!(slugify("  Gold Member!! "), "gold-member");
/// assert_eq!(slugify("VIP__Tier 2"), "vip-tier-2");
/// ```
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// `None` for absent or whitespace-only values
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
