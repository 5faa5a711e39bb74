//! services/bot/src/bin/bot.rs

use async_openai::{config::OpenAIConfig, Client};
use bot_lib::{
    adapters::{OpenAiIntentAdapter, PgStore, TelegramClient},
    config::Config,
    error::BotError,
    web::{build_router, session::SessionStore, state::AppState},
};
use lifeline_core::{
    ports::{Clock, IntentParser, Repositories, SystemClock},
    OccurrenceAdvancer, Scheduler, TextFormatter,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting LifeLine...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");
    let repos = Repositories::from_store(store);

    // --- 3. Initialize Service Adapters ---
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| BotError::Internal(format!("Failed to build HTTP client: {e}")))?;
    let telegram = Arc::new(TelegramClient::new(
        http,
        &config.telegram_api_base,
        &config.telegram_token,
    ));

    let intents: Option<Arc<dyn IntentParser>> = match config.ai_api_key.as_deref() {
        Some(key) => {
            let openai_config = OpenAIConfig::new()
                .with_api_base(&config.ai_base_url)
                .with_api_key(key);
            info!(model = %config.ai_model, "Natural-language input enabled");
            Some(Arc::new(OpenAiIntentAdapter::new(
                Client::with_config(openai_config),
                config.ai_model.clone(),
            )))
        }
        None => {
            warn!("AI_API_KEY not set; natural-language input is disabled");
            None
        }
    };

    // --- 4. Build the Scheduler ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(Scheduler::new(
        repos.clone(),
        telegram.clone(),
        Arc::new(TextFormatter),
        clock.clone(),
        config.scheduler(),
    ));

    // --- 5. Build the Shared AppState ---
    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    let app_state = Arc::new(AppState {
        advancer: OccurrenceAdvancer::new(repos.reminders.clone(), repos.events.clone()),
        repos,
        chat: telegram,
        intents,
        sessions: sessions.clone(),
        scheduler: scheduler.handle(),
        clock,
        config: config.clone(),
    });

    // --- 6. Start Background Tasks ---
    let shutdown = CancellationToken::new();
    let scheduler_task = tokio::spawn({
        let scheduler = scheduler.clone();
        let cancel = shutdown.clone();
        async move { scheduler.run(cancel).await }
    });
    let sweeper_task = tokio::spawn({
        let cancel = shutdown.clone();
        async move { sessions.run_sweeper(cancel).await }
    });

    // --- 7. Start the Server ---
    let app = build_router(app_state);
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "Scheduler task ended abnormally");
    }
    if let Err(e) = sweeper_task.await {
        warn!(error = %e, "Session sweeper ended abnormally");
    }
    info!("Shutdown complete.");
    Ok(())
}

/// Resolves on Ctrl-C and cancels the background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        // Without a signal handler, wait for an explicit cancellation instead.
        shutdown.cancelled().await;
    }
    info!("Shutdown signal received.");
    shutdown.cancel();
}
