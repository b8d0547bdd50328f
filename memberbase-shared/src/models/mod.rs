/// Data models for Memberbase
///
/// # Models
///
/// - `member`: Member records, creation input, login input
/// - `search`: Search criteria, sort keys and paging for member listings
///
/// # Example
///
/// ```
/// use memberbase_shared::models::member::{CreateMember, slugify};
///
/// let data = CreateMember {
///     username: "alice".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     full_name: "Alice Liddell".to_string(),
///     member_type: "Gold Member".to_string(),
///     email: Some("alice@example.com".to_string()),
///     ..Default::default()
/// };
///
/// assert!(data.validate().is_ok());
/// assert_eq!(slugify(&data.member_type), "gold-member");
/// ```

pub mod member;
pub mod search;
