pub mod commands;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod session;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;
pub mod webhook;

pub use middleware::require_secret;
pub use rest::{health_handler, trigger_handler};
pub use webhook::telegram_webhook;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::{rest::ApiDoc, state::AppState};

/// Builds the full HTTP surface: webhook, trigger, health and Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Routes guarded by the shared secret
    let protected_routes = Router::new()
        .route("/telegram/webhook", post(telegram_webhook))
        .route("/scheduler/trigger", post(trigger_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_secret,
        ));

    let api_router = Router::new()
        .route("/health", get(health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{PgStore, TelegramClient};
    use crate::config::Config;
    use crate::web::session::SessionStore;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use lifeline_core::{
        OccurrenceAdvancer, Repositories, Scheduler, SchedulerConfig, SystemClock, TextFormatter,
    };
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use tower::ServiceExt;

    /// State backed by a lazy pool that never connects; none of the routes
    /// exercised here touch the database.
    fn test_state(secret: Option<&str>) -> (Arc<AppState>, Scheduler) {
        let mut pairs = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/lifeline_test".to_string()),
            ("TELEGRAM_TOKEN".to_string(), "1:test".to_string()),
        ];
        if let Some(secret) = secret {
            pairs.push(("WEBHOOK_SECRET".to_string(), secret.to_string()));
        }
        let config = Config::from_lookup(|key| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();

        let pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        let repos = Repositories::from_store(Arc::new(PgStore::new(pool)));
        let telegram = Arc::new(TelegramClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            "1:test",
        ));
        let clock = Arc::new(SystemClock);
        let scheduler = Scheduler::new(
            repos.clone(),
            telegram.clone(),
            Arc::new(TextFormatter),
            clock.clone(),
            SchedulerConfig::default(),
        );

        let state = Arc::new(AppState {
            advancer: OccurrenceAdvancer::new(repos.reminders.clone(), repos.events.clone()),
            repos,
            chat: telegram,
            intents: None,
            sessions: Arc::new(SessionStore::new(Duration::from_secs(600))),
            scheduler: scheduler.handle(),
            clock,
            config: Arc::new(config),
        });
        (state, scheduler)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _scheduler) = test_state(Some("s3cret"));
        let response = build_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn trigger_requires_secret_when_configured() {
        let (state, _scheduler) = test_state(Some("s3cret"));
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(Request::post("/scheduler/trigger").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::post("/scheduler/trigger")
                    .header(middleware::SECRET_HEADER, "s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn webhook_rejects_wrong_secret() {
        let (state, _scheduler) = test_state(Some("s3cret"));
        let response = build_router(state)
            .oneshot(
                Request::post("/telegram/webhook")
                    .header(middleware::SECRET_HEADER, "guess")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"update_id": 1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn webhook_accepts_empty_update_without_secret() {
        let (state, _scheduler) = test_state(None);
        let response = build_router(state)
            .oneshot(
                Request::post("/telegram/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"update_id": 1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn openapi_document_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/health", "/scheduler/trigger", "/telegram/webhook"] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
