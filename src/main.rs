//! Parkping - a self-hosted parking session tracker with timed reminders

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parkping::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxCarRepository, SqlxParkingLocationRepository, SqlxParkingSessionRepository,
            SqlxUserRepository,
        },
    },
    dedup::create_dedup,
    services::{
        DisabledNotifier, Notifier, ReminderScheduler, SessionService, TelegramNotifier,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parkping=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Parkping...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize the delivery ledger
    let dedup = create_dedup(&config.dedup).await?;
    tracing::info!("Delivery ledger initialized: {:?}", config.dedup.driver);

    // Outbound notification channel
    let notifier: Arc<dyn Notifier> = match &config.telegram.bot_token {
        Some(token) => Arc::new(TelegramNotifier::new(
            token.clone(),
            config.telegram.api_base.clone(),
        )),
        None => {
            tracing::warn!("No Telegram bot token configured; reminders will be dropped");
            Arc::new(DisabledNotifier)
        }
    };

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let car_repo = SqlxCarRepository::boxed(pool.clone());
    let location_repo = SqlxParkingLocationRepository::boxed(pool.clone());
    let session_repo = SqlxParkingSessionRepository::boxed(pool.clone());

    // Reminder scheduler and the startup recovery sweep. The sweep must
    // finish before the server accepts requests so the single-task-per-
    // session rule holds; a failure here is fatal.
    let scheduler = Arc::new(ReminderScheduler::new(
        session_repo.clone(),
        car_repo.clone(),
        location_repo.clone(),
        user_repo.clone(),
        dedup,
        notifier.clone(),
    ));
    let recovered = scheduler.recover_active_sessions().await?;
    tracing::info!(count = recovered, "Recovery sweep finished");

    // Session lifecycle service
    let session_service = Arc::new(SessionService::new(
        session_repo,
        car_repo.clone(),
        location_repo.clone(),
        scheduler,
        notifier.clone(),
    ));

    // Build application state
    let state = AppState {
        user_repo,
        car_repo,
        location_repo,
        session_service,
        notifier,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
