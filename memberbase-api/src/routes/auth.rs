//! Authentication endpoints
//!
//! - `POST /v1/auth/register` - Register a member and get tokens
//! - `POST /v1/auth/login` - Login and get tokens
//! - `POST /v1/auth/refresh` - Exchange a refresh token for new tokens

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{members::MemberResponse, validation_failed},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use memberbase_shared::{
    auth::{jwt, password},
    db::context::ExecContext,
    models::member::{CreateMember, MemberAuthRequest, MemberRecord},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,

    /// Checked for strength, then hashed before it reaches the repository
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 255, message = "Full name must be 1-255 characters"))]
    pub full_name: String,

    #[validate(length(min = 1, max = 64, message = "Member type must be 1-64 characters"))]
    pub member_type: String,

    #[validate(length(max = 32, message = "Phone number must be at most 32 characters"))]
    pub phone_number: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(url(message = "Invalid photo URL"))]
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    pub device_id: Option<String>,

    pub push_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Tokens plus the member they were issued for
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub member: MemberResponse,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

fn issue_tokens(
    state: &AppState,
    member: MemberRecord,
    device_id: Option<String>,
) -> ApiResult<AuthResponse> {
    let access_claims =
        jwt::Claims::new(member.id.clone(), jwt::TokenType::Access).with_device(device_id.clone());
    let refresh_claims =
        jwt::Claims::new(member.id.clone(), jwt::TokenType::Refresh).with_device(device_id);

    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh_claims, state.jwt_secret())?;

    Ok(AuthResponse {
        member: MemberResponse::from_record(member, state.members.login_offset()),
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt::TokenType::Access.default_expiration().num_seconds(),
    })
}

/// Register a new member
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "username": "alice",
///   "password": "SecureP@ss123",
///   "full_name": "Alice Liddell",
///   "member_type": "Gold Member",
///   "email": "alice@example.com"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: username, phone number or email already registered
/// - `422 Unprocessable Entity`: invalid fields, weak password, no phone or email
pub async fn register(
    State(state): State<AppState>,
    Extension(ctx): Extension<ExecContext>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate().map_err(validation_failed)?;

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::invalid("password", e))?;

    let plain = req.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| ApiError::InternalError(format!("Password hashing task failed: {}", e)))??;

    let member = state
        .members
        .create_member(
            &ctx,
            CreateMember {
                username: req.username,
                password_hash,
                full_name: req.full_name,
                member_type: req.member_type,
                phone_number: req.phone_number,
                email: req.email,
                photo_url: req.photo_url,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(issue_tokens(&state, member, None)?)))
}

/// Login with username and password
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "username": "alice",
///   "password": "SecureP@ss123",
///   "device_id": "ios-8f14",
///   "push_token": "apns-..."
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: unknown username or wrong password
/// - `403 Forbidden`: account suspended
pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<ExecContext>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate().map_err(validation_failed)?;

    let member = state
        .members
        .authenticate(
            &ctx,
            MemberAuthRequest {
                username: req.username,
                password: req.password,
                device_id: req.device_id,
                push_token: req.push_token,
            },
        )
        .await?;

    let device_id = member.device_id.clone();
    Ok(Json(issue_tokens(&state, member, device_id)?))
}

/// Exchange a refresh token for a fresh token pair
///
/// The member is re-loaded so that suspended or missing accounts cannot
/// keep refreshing.
///
/// # Errors
///
/// - `401 Unauthorized`: invalid, expired or non-refresh token; member gone
/// - `403 Forbidden`: account suspended since the token was issued
pub async fn refresh(
    State(state): State<AppState>,
    Extension(ctx): Extension<ExecContext>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let member = match state.members.find_one_by_id(&ctx, &claims.sub).await {
        Ok(member) => member,
        Err(memberbase_shared::error::MemberError::NotFound(_)) => {
            return Err(ApiError::Unauthorized("Member no longer exists".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    if member.is_suspended {
        return Err(ApiError::Forbidden("Account is suspended".to_string()));
    }

    Ok(Json(issue_tokens(&state, member, claims.device_id)?))
}
