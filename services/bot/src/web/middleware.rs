//! services/bot/src/web/middleware.rs
//!
//! Shared-secret middleware for the webhook and trigger routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::state::AppState;

/// The header Telegram echoes back from `setWebhook`'s `secret_token`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Rejects requests whose secret header does not match `WEBHOOK_SECRET`.
///
/// When no secret is configured every request passes.
pub async fn require_secret(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(expected) = state.config.webhook_secret.as_deref() {
        let provided = req
            .headers()
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok());

        if provided != Some(expected) {
            warn!(path = %req.uri().path(), "Rejected request with a missing or wrong secret");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    Ok(next.run(req).await)
}
