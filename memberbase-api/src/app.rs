//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use memberbase_api::{app::AppState, config::Config};
//! use memberbase_shared::db::pool::{create_pool, DatabaseConfig};
//! use memberbase_shared::db::postgres::PgMemberStore;
//! use memberbase_shared::repository::MemberRepository;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let pool = create_pool(DatabaseConfig::from_url(config.database.url.clone())).await?;
//! let repo = MemberRepository::new(Arc::new(PgMemberStore::new(pool)));
//! let state = AppState::new(Arc::new(repo), config);
//! let app = memberbase_api::app::build_router(state);
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::ApiError;
use crate::middleware::context::request_context_layer;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use memberbase_shared::auth::jwt;
use memberbase_shared::repository::MemberRepo;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub members: Arc<dyn MemberRepo>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(members: Arc<dyn MemberRepo>, config: Config) -> Self {
        Self {
            members,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Identity of the caller, inserted by [`jwt_auth_layer`]
#[derive(Debug, Clone)]
pub struct AuthMember {
    pub member_id: String,

    pub device_id: Option<String>,
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /register
///     │   ├── POST /login
///     │   └── POST /refresh
///     └── /members/               (access token required)
///         ├── GET  /
///         ├── GET  /:id
///         └── PUT  /:id
/// ```
///
/// Every request first gets an [`ExecContext`](memberbase_shared::db::context::ExecContext)
/// with a fresh trace ID and the configured request timeout.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let member_routes = Router::new()
        .route("/", get(routes::members::list_members))
        .route(
            "/:id",
            get(routes::members::get_member).put(routes::members::update_member),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/members", member_routes);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(from_fn_with_state(state.clone(), request_context_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Validates the bearer access token and injects [`AuthMember`]
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    req.extensions_mut().insert(AuthMember {
        member_id: claims.sub,
        device_id: claims.device_id,
    });

    Ok(next.run(req).await)
}
