/// Search criteria and paging for member listings
///
/// [`SearchCriteria`] is a bag of optional fields; every present field adds
/// one clause to the keyword predicate built by
/// [`crate::db::filter::build_criteria`]. [`PageRequest`] adds paging and
/// sorting on top.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Member columns that can be filtered or sorted on
///
/// The set is closed so that column names interpolated into SQL always come
/// from this enum, never from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberField {
    Id,
    Username,
    FullName,
    MemberType,
    IsSuspended,
    CreatedAt,
    UpdatedAt,
    LastLoginAt,
    PhoneNumber,
    Email,
}

impl MemberField {
    /// Column name in the `members` table
    pub fn column(&self) -> &'static str {
        match self {
            MemberField::Id => "id",
            MemberField::Username => "username",
            MemberField::FullName => "full_name",
            MemberField::MemberType => "member_type",
            MemberField::IsSuspended => "is_suspended",
            MemberField::CreatedAt => "created_at",
            MemberField::UpdatedAt => "updated_at",
            MemberField::LastLoginAt => "last_login_at",
            MemberField::PhoneNumber => "phone_number",
            MemberField::Email => "email",
        }
    }
}

impl fmt::Display for MemberField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for MemberField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(MemberField::Id),
            "username" => Ok(MemberField::Username),
            "full_name" => Ok(MemberField::FullName),
            "member_type" => Ok(MemberField::MemberType),
            "is_suspended" => Ok(MemberField::IsSuspended),
            "created_at" => Ok(MemberField::CreatedAt),
            "updated_at" => Ok(MemberField::UpdatedAt),
            "last_login_at" => Ok(MemberField::LastLoginAt),
            "phone_number" => Ok(MemberField::PhoneNumber),
            "email" => Ok(MemberField::Email),
            other => Err(format!("Unknown member field: {}", other)),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One `field direction` pair of an ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: MemberField,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: MemberField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: MemberField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }

    /// Sort used when the request names none: newest updates first
    pub fn default_order() -> Vec<SortKey> {
        vec![SortKey::desc(MemberField::UpdatedAt)]
    }
}

/// Parses `field` or `field:asc` / `field:desc`
///
/// # Example
///
/// ```
/// use memberbase_shared::models::search::{MemberField, SortKey};
///
/// let key: SortKey = "username:asc".parse().unwrap();
/// assert_eq!(key, SortKey::asc(MemberField::Username));
///
/// let key: SortKey = "created_at".parse().unwrap();
/// assert_eq!(key, SortKey::desc(MemberField::CreatedAt));
/// ```
impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(':') {
            Some((field, dir)) => (field, dir),
            None => (s, "desc"),
        };

        let field: MemberField = field.trim().parse()?;
        let direction = match direction.trim().to_ascii_lowercase().as_str() {
            "asc" | "1" => SortDirection::Asc,
            "desc" | "-1" => SortDirection::Desc,
            other => return Err(format!("Unknown sort direction: {}", other)),
        };

        Ok(SortKey { field, direction })
    }
}

/// Optional-field search over members
///
/// Text fields are matched exactly or fuzzily depending on the caller;
/// `member_type` and `is_suspended` are always exact. Each date range only
/// applies when its `from` bound is set; a missing `to` means "until now".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub member_type: Option<String>,
    pub is_suspended: Option<bool>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub updated_from: Option<DateTime<Utc>>,
    pub updated_to: Option<DateTime<Utc>>,
    pub last_login_from: Option<DateTime<Utc>>,
    pub last_login_to: Option<DateTime<Utc>>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

/// Paged, sorted member listing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number
    pub page: i64,

    /// Maximum members per page
    pub size: i64,

    /// Empty means [`SortKey::default_order`]
    pub sort: Vec<SortKey>,

    pub criteria: SearchCriteria,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page,
            size,
            sort: Vec::new(),
            criteria: SearchCriteria::default(),
        }
    }

    /// Rows to skip: `size * (page - 1)`
    ///
    /// # Errors
    ///
    /// Rejects pages below 1 and sizes below 1.
    ///
    /// # Example
    ///
    /// ```
    /// use memberbase_shared::models::search::PageRequest;
    ///
    /// assert_eq!(PageRequest::new(1, 10).offset().unwrap(), 0);
    /// assert_eq!(PageRequest::new(2, 10).offset().unwrap(), 10);
    /// assert!(PageRequest::new(0, 10).offset().is_err());
    /// ```
    pub fn offset(&self) -> Result<i64, ValidationError> {
        if self.page < 1 {
            return Err(ValidationError::InvalidPage(self.page));
        }
        if self.size < 1 {
            return Err(ValidationError::InvalidPageSize(self.size));
        }
        Ok(self.size.saturating_mul(self.page - 1))
    }

    /// Requested sort, or the default order
    pub fn sort_or_default(&self) -> Vec<SortKey> {
        if self.sort.is_empty() {
            SortKey::default_order()
        } else {
            self.sort.clone()
        }
    }
}

/// One page of members plus the total match count
#[derive(Debug, Clone, Serialize)]
pub struct MemberPage<T> {
    pub members: Vec<T>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(1, 10).offset(), Ok(0));
        assert_eq!(PageRequest::new(2, 10).offset(), Ok(10));
        assert_eq!(PageRequest::new(5, 25).offset(), Ok(100));
    }

    #[test]
    fn test_offset_rejects_invalid_input() {
        assert_eq!(
            PageRequest::new(0, 10).offset(),
            Err(ValidationError::InvalidPage(0))
        );
        assert_eq!(
            PageRequest::new(-3, 10).offset(),
            Err(ValidationError::InvalidPage(-3))
        );
        assert_eq!(
            PageRequest::new(1, 0).offset(),
            Err(ValidationError::InvalidPageSize(0))
        );
    }

    #[test]
    fn test_default_sort() {
        let req = PageRequest::new(1, 10);
        assert_eq!(
            req.sort_or_default(),
            vec![SortKey::desc(MemberField::UpdatedAt)]
        );
    }

    #[test]
    fn test_parse_sort_key() {
        assert_eq!(
            "email:ASC".parse::<SortKey>(),
            Ok(SortKey::asc(MemberField::Email))
        );
        assert_eq!(
            "last_login_at:-1".parse::<SortKey>(),
            Ok(SortKey::desc(MemberField::LastLoginAt))
        );
        assert!("password:asc".parse::<SortKey>().is_err());
        assert!("username:sideways".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_field_round_trip_through_column_name() {
        for field in [
            MemberField::Username,
            MemberField::FullName,
            MemberField::LastLoginAt,
        ] {
            assert_eq!(field.column().parse::<MemberField>(), Ok(field));
        }
    }
}
