//! services/bot/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{state::AppState, webhook};
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        trigger_handler,
        webhook::telegram_webhook,
    ),
    components(
        schemas(HealthResponse, TriggerResponse)
    ),
    tags(
        (name = "LifeLine API", description = "Webhook intake and scheduler control for the LifeLine bot.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

/// Returned when a scheduler pass has been requested.
#[derive(Serialize, ToSchema)]
pub struct TriggerResponse {
    triggered: bool,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "The service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Request an immediate scheduler pass.
///
/// Triggers coalesce: a burst of requests produces at most one extra pass.
#[utoipa::path(
    post,
    path = "/scheduler/trigger",
    responses(
        (status = 202, description = "Pass requested", body = TriggerResponse),
        (status = 401, description = "Missing or wrong secret token")
    ),
    params(
        ("x-telegram-bot-api-secret-token" = Option<String>, Header, description = "Required when WEBHOOK_SECRET is set.")
    )
)]
pub async fn trigger_handler(
    State(app_state): State<Arc<AppState>>,
) -> (StatusCode, Json<TriggerResponse>) {
    app_state.scheduler.trigger();
    info!("Scheduler pass requested over HTTP");
    (StatusCode::ACCEPTED, Json(TriggerResponse { triggered: true }))
}
