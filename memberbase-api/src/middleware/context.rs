//! Per-request execution context middleware
//!
//! Assigns every request a UUID trace ID and an
//! [`ExecContext`](memberbase_shared::db::context::ExecContext) whose
//! deadline is the configured request timeout. Handlers pull the context
//! out with `Extension<ExecContext>` and pass it to the repository, so store
//! work stops once the request runs out of time. The trace ID is echoed in
//! the `x-request-id` response header.

use crate::app::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use memberbase_shared::db::context::ExecContext;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_context_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    let ctx = ExecContext::new(trace_id.clone()).with_timeout(state.config.request_timeout());
    req.extensions_mut().insert(ctx);

    let span = tracing::info_span!("request", trace_id = %trace_id);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
