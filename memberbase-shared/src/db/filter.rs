//! Member filter builder
//!
//! Turns [`SearchCriteria`] into a [`Predicate`]: every present field becomes
//! one clause and all clauses are OR-ed together, so a record qualifies when
//! any field matches (keyword search, not a multi-field AND filter). The
//! caller wraps the group with [`Predicate::all_of`], which leaves room for
//! further independent groups without touching the OR semantics.
//!
//! A predicate can be evaluated in memory ([`Predicate::matches`]) or
//! compiled onto an `sqlx::QueryBuilder` ([`Predicate::push_sql`]).
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use memberbase_shared::db::filter::{build_criteria, Predicate};
//! use memberbase_shared::models::search::SearchCriteria;
//!
//! let criteria = SearchCriteria {
//!     phone_number: Some("555".to_string()),
//!     ..Default::default()
//! };
//!
//! let filter = Predicate::all_of(vec![build_criteria(&criteria, true, Utc::now())]);
//! assert!(!filter.is_match_all());
//! ```

use crate::models::member::MemberRecord;
use crate::models::search::{MemberField, SearchCriteria};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

/// Value compared against a member field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
}

/// Composable filter over member records
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record
    MatchAll,

    /// All sub-predicates match; empty matches everything
    And(Vec<Predicate>),

    /// Any sub-predicate matches; empty matches nothing
    Or(Vec<Predicate>),

    /// Exact equality
    Eq(MemberField, FieldValue),

    /// Case-insensitive substring match on a text field
    Contains(MemberField, String),

    /// Inclusive timestamp range; absent timestamps never match
    Between(MemberField, DateTime<Utc>, DateTime<Utc>),
}

impl Predicate {
    pub fn eq_text(field: MemberField, value: impl Into<String>) -> Self {
        Predicate::Eq(field, FieldValue::Text(value.into()))
    }

    pub fn eq_bool(field: MemberField, value: bool) -> Self {
        Predicate::Eq(field, FieldValue::Bool(value))
    }

    /// Outer AND wrapper over independent criteria groups
    pub fn all_of(groups: Vec<Predicate>) -> Self {
        Predicate::And(groups)
    }

    pub fn any_of(clauses: Vec<Predicate>) -> Self {
        Predicate::Or(clauses)
    }

    /// `true` if this predicate cannot exclude any record
    pub fn is_match_all(&self) -> bool {
        match self {
            Predicate::MatchAll => true,
            Predicate::And(groups) => groups.iter().all(Predicate::is_match_all),
            _ => false,
        }
    }

    /// Evaluates the predicate against one record
    pub fn matches(&self, member: &MemberRecord) -> bool {
        match self {
            Predicate::MatchAll => true,
            Predicate::And(groups) => groups.iter().all(|p| p.matches(member)),
            Predicate::Or(clauses) => clauses.iter().any(|p| p.matches(member)),
            Predicate::Eq(field, FieldValue::Text(expected)) => {
                text_value(member, *field).map_or(false, |actual| actual == expected)
            }
            Predicate::Eq(field, FieldValue::Bool(expected)) => {
                bool_value(member, *field).map_or(false, |actual| actual == *expected)
            }
            Predicate::Contains(field, needle) => text_value(member, *field).map_or(false, |actual| {
                actual.to_lowercase().contains(&needle.to_lowercase())
            }),
            Predicate::Between(field, from, to) => time_value(member, *field)
                .map_or(false, |actual| actual >= *from && actual <= *to),
        }
    }

    /// Appends this predicate as a parenthesized SQL boolean expression
    ///
    /// Values are always bound as parameters; only column names from
    /// [`MemberField`] are interpolated.
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Predicate::MatchAll => {
                qb.push("TRUE");
            }
            Predicate::And(groups) => push_joined(qb, groups, " AND ", "TRUE"),
            Predicate::Or(clauses) => push_joined(qb, clauses, " OR ", "FALSE"),
            Predicate::Eq(field, FieldValue::Text(value)) => {
                qb.push(field.column()).push(" = ").push_bind(value.clone());
            }
            Predicate::Eq(field, FieldValue::Bool(value)) => {
                qb.push(field.column()).push(" = ").push_bind(*value);
            }
            Predicate::Contains(field, needle) => {
                qb.push(field.column())
                    .push(" ILIKE ")
                    .push_bind(format!("%{}%", escape_like(needle)));
            }
            Predicate::Between(field, from, to) => {
                qb.push(field.column())
                    .push(" BETWEEN ")
                    .push_bind(*from)
                    .push(" AND ")
                    .push_bind(*to);
            }
        }
    }
}

fn push_joined(
    qb: &mut QueryBuilder<'_, Postgres>,
    parts: &[Predicate],
    separator: &str,
    empty: &str,
) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }

    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        qb.push("(");
        part.push_sql(qb);
        qb.push(")");
    }
    qb.push(")");
}

/// Escapes LIKE metacharacters so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn text_value(member: &MemberRecord, field: MemberField) -> Option<&str> {
    match field {
        MemberField::Id => Some(&member.id),
        MemberField::Username => Some(&member.username),
        MemberField::FullName => Some(&member.full_name),
        MemberField::MemberType => Some(&member.member_type),
        MemberField::PhoneNumber => member.phone_number.as_deref(),
        MemberField::Email => member.email.as_deref(),
        _ => None,
    }
}

pub(crate) fn bool_value(member: &MemberRecord, field: MemberField) -> Option<bool> {
    match field {
        MemberField::IsSuspended => Some(member.is_suspended),
        _ => None,
    }
}

pub(crate) fn time_value(member: &MemberRecord, field: MemberField) -> Option<DateTime<Utc>> {
    match field {
        MemberField::CreatedAt => Some(member.created_at),
        MemberField::UpdatedAt => Some(member.updated_at),
        MemberField::LastLoginAt => member.last_login_at.map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

/// Builds the keyword predicate for `search`
///
/// - text fields (username, full name, phone, email): equality, or
///   case-insensitive substring when `fuzzy`
/// - member type and suspension flag: always exact
/// - date ranges: only when `from` is set; a missing `to` becomes `now`
///
/// Clauses are OR-ed into one group. With no clauses the result is
/// [`Predicate::MatchAll`].
pub fn build_criteria(search: &SearchCriteria, fuzzy: bool, now: DateTime<Utc>) -> Predicate {
    let mut clauses = Vec::new();

    let text = |field: MemberField, value: &str| {
        if fuzzy {
            Predicate::Contains(field, value.to_string())
        } else {
            Predicate::eq_text(field, value)
        }
    };

    if let Some(username) = present(&search.username) {
        clauses.push(text(MemberField::Username, username));
    }
    if let Some(full_name) = present(&search.full_name) {
        clauses.push(text(MemberField::FullName, full_name));
    }
    if let Some(member_type) = present(&search.member_type) {
        clauses.push(Predicate::eq_text(MemberField::MemberType, member_type));
    }
    if let Some(is_suspended) = search.is_suspended {
        clauses.push(Predicate::eq_bool(MemberField::IsSuspended, is_suspended));
    }

    let ranges = [
        (MemberField::CreatedAt, search.created_from, search.created_to),
        (MemberField::UpdatedAt, search.updated_from, search.updated_to),
        (MemberField::LastLoginAt, search.last_login_from, search.last_login_to),
    ];
    for (field, from, to) in ranges {
        if let Some(from) = from {
            clauses.push(Predicate::Between(field, from, to.unwrap_or(now)));
        }
    }

    if let Some(phone_number) = present(&search.phone_number) {
        clauses.push(text(MemberField::PhoneNumber, phone_number));
    }
    if let Some(email) = present(&search.email) {
        clauses.push(text(MemberField::Email, email));
    }

    if clauses.is_empty() {
        Predicate::MatchAll
    } else {
        Predicate::any_of(clauses)
    }
}

/// Records sharing any unique key with `member`
///
/// Matches an equal username, or an equal phone number or email when
/// `member` has one. Used as the fast duplicate check before inserting.
pub fn registration_conflicts(member: &MemberRecord) -> Predicate {
    let mut clauses = vec![Predicate::eq_text(MemberField::Username, member.username.as_str())];

    if let Some(phone_number) = &member.phone_number {
        clauses.push(Predicate::eq_text(MemberField::PhoneNumber, phone_number.as_str()));
    }
    if let Some(email) = &member.email {
        clauses.push(Predicate::eq_text(MemberField::Email, email.as_str()));
    }

    Predicate::any_of(clauses)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
