//! Member endpoints (access token required)
//!
//! - `GET /v1/members` - Search and page through members
//! - `GET /v1/members/:id` - Fetch one member
//! - `PUT /v1/members/:id` - Update a member's profile

use crate::{
    app::{AppState, AuthMember},
    error::{ApiError, ApiResult},
    routes::validation_failed,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use memberbase_shared::{
    db::context::ExecContext,
    models::{
        member::MemberRecord,
        search::{PageRequest, SearchCriteria, SortKey},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Public view of a member; never carries the password hash
#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub member_type: String,
    pub is_suspended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<FixedOffset>>,
    pub device_id: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl MemberResponse {
    /// Renders `last_login_at` in `login_offset`
    pub fn from_record(member: MemberRecord, login_offset: FixedOffset) -> Self {
        Self {
            id: member.id,
            username: member.username,
            full_name: member.full_name,
            member_type: member.member_type,
            is_suspended: member.is_suspended,
            created_at: member.created_at,
            updated_at: member.updated_at,
            last_login_at: member.last_login_at.map(|t| t.with_timezone(&login_offset)),
            device_id: member.device_id,
            phone_number: member.phone_number,
            email: member.email,
            photo_url: member.photo_url,
        }
    }
}

/// Query string of `GET /v1/members`
///
/// `sort` is a comma-separated list of `field[:asc|desc]`. Text filters are
/// case-insensitive substring matches; filters combine with OR.
#[derive(Debug, Default, Deserialize)]
pub struct ListMembersQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub sort: Option<String>,
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

impl ListMembersQuery {
    pub fn into_page_request(self) -> ApiResult<PageRequest> {
        let sort = match self.sort.as_deref() {
            Some(keys) => keys
                .split(',')
                .filter(|key| !key.trim().is_empty())
                .map(|key| key.parse::<SortKey>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ApiError::invalid("sort", e))?,
            None => Vec::new(),
        };

        Ok(PageRequest {
            page: self.page.unwrap_or(1),
            size: self.size.unwrap_or(DEFAULT_PAGE_SIZE),
            sort,
            criteria: SearchCriteria {
                username: self.username,
                full_name: self.full_name,
                member_type: self.member_type,
                is_suspended: self.is_suspended,
                created_from: self.created_from,
                created_to: self.created_to,
                updated_from: self.updated_from,
                updated_to: self.updated_to,
                last_login_from: self.last_login_from,
                last_login_to: self.last_login_to,
                phone_number: self.phone_number,
                email: self.email,
            },
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListMembersResponse {
    pub members: Vec<MemberResponse>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

/// Profile fields a member update may change; absent fields are kept
///
/// An empty string clears an optional contact field, subject to the
/// phone-or-email rule.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMemberRequest {
    #[validate(length(min = 1, max = 255, message = "Full name must be 1-255 characters"))]
    pub full_name: Option<String>,

    #[validate(length(min = 1, max = 64, message = "Member type must be 1-64 characters"))]
    pub member_type: Option<String>,

    #[validate(length(max = 32, message = "Phone number must be at most 32 characters"))]
    pub phone_number: Option<String>,

    #[validate(length(max = 255, message = "Email must be at most 255 characters"))]
    pub email: Option<String>,

    #[validate(length(max = 512, message = "Photo URL must be at most 512 characters"))]
    pub photo_url: Option<String>,

    pub is_suspended: Option<bool>,
}

impl UpdateMemberRequest {
    fn apply(self, member: &mut MemberRecord) {
        if let Some(full_name) = self.full_name {
            member.full_name = full_name.trim().to_string();
        }
        if let Some(member_type) = self.member_type {
            member.member_type = member_type;
        }
        if let Some(phone_number) = self.phone_number {
            member.phone_number = Some(phone_number);
        }
        if let Some(email) = self.email {
            member.email = Some(email);
        }
        if let Some(photo_url) = self.photo_url {
            member.photo_url = Some(photo_url);
        }
        if let Some(is_suspended) = self.is_suspended {
            member.is_suspended = is_suspended;
        }
    }
}

/// `GET /v1/members?page=1&size=10&username=ali&sort=username:asc`
///
/// ```json
/// { "members": [ ... ], "total": 42, "page": 1, "size": 10 }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: page or size below 1, unknown sort field
pub async fn list_members(
    State(state): State<AppState>,
    Extension(ctx): Extension<ExecContext>,
    Query(query): Query<ListMembersQuery>,
) -> ApiResult<Json<ListMembersResponse>> {
    let request = query.into_page_request()?;
    let (page, size) = (request.page, request.size);

    let result = state.members.find_all(&ctx, request).await?;
    let offset = state.members.login_offset();

    Ok(Json(ListMembersResponse {
        members: result
            .members
            .into_iter()
            .map(|m| MemberResponse::from_record(m, offset))
            .collect(),
        total: result.total,
        page,
        size,
    }))
}

/// `GET /v1/members/:id`
///
/// # Errors
///
/// - `404 Not Found`: no member with that ID
pub async fn get_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<ExecContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MemberResponse>> {
    let member = state.members.find_one_by_id(&ctx, &id).await?;
    Ok(Json(MemberResponse::from_record(
        member,
        state.members.login_offset(),
    )))
}

/// `PUT /v1/members/:id`
///
/// ```json
/// { "full_name": "Alice L.", "email": "", "phone_number": "555-0100" }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: no member with that ID
/// - `422 Unprocessable Entity`: invalid fields, or neither phone nor email left
pub async fn update_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<ExecContext>,
    Extension(caller): Extension<AuthMember>,
    Path(id): Path<String>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<Json<MemberResponse>> {
    req.validate().map_err(validation_failed)?;

    let mut member = state.members.find_one_by_id(&ctx, &id).await?;
    req.apply(&mut member);

    let updated = state.members.update_member(&ctx, member).await?;
    tracing::info!(member_id = %updated.id, updated_by = %caller.member_id, "Member profile updated");

    Ok(Json(MemberResponse::from_record(
        updated,
        state.members.login_offset(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use memberbase_shared::models::search::MemberField;

    #[test]
    fn test_query_defaults() {
        let request = ListMembersQuery::default().into_page_request().unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.size, DEFAULT_PAGE_SIZE);
        assert!(request.sort.is_empty());
        assert_eq!(request.criteria, SearchCriteria::default());
    }

    #[test]
    fn test_query_sort_parsing() {
        let query = ListMembersQuery {
            sort: Some("username:asc, created_at".to_string()),
            ..Default::default()
        };
        let request = query.into_page_request().unwrap();
        assert_eq!(
            request.sort,
            vec![
                SortKey::asc(MemberField::Username),
                SortKey::desc(MemberField::CreatedAt)
            ]
        );

        let query = ListMembersQuery {
            sort: Some("password_hash".to_string()),
            ..Default::default()
        };
        assert!(query.into_page_request().is_err());
    }

    #[test]
    fn test_response_renders_login_in_offset() {
        let now = Utc::now();
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let record = MemberRecord {
            id: "Member-1".to_string(),
            username: "alice".to_string(),
            password_hash: "secret-hash".to_string(),
            full_name: "Alice".to_string(),
            member_type: "regular".to_string(),
            is_suspended: false,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now.fixed_offset()),
            device_id: None,
            push_token: Some("push".to_string()),
            phone_number: None,
            email: Some("alice@example.com".to_string()),
            photo_url: None,
        };

        let response = MemberResponse::from_record(record, offset);
        assert_eq!(response.last_login_at.unwrap().offset(), &offset);

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_update_request_keeps_absent_fields() {
        let now = Utc::now();
        let mut member = MemberRecord {
            id: "Member-1".to_string(),
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            full_name: "Alice".to_string(),
            member_type: "regular".to_string(),
            is_suspended: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
            device_id: None,
            push_token: None,
            phone_number: Some("555".to_string()),
            email: None,
            photo_url: None,
        };

        UpdateMemberRequest {
            email: Some("alice@example.com".to_string()),
            is_suspended: Some(true),
            ..Default::default()
        }
        .apply(&mut member);

        assert_eq!(member.full_name, "Alice");
        assert_eq!(member.phone_number.as_deref(), Some("555"));
        assert_eq!(member.email.as_deref(), Some("alice@example.com"));
        assert!(member.is_suspended);
    }
}
