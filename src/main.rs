//! Last Little Haven - community archive backend

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use haven::{
    api::{self, AppState},
    config::Config,
    db,
};

/// Rate limiter and expired session cleanup interval
const CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haven=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Last Little Haven backend...");

    // Load configuration; missing or invalid required settings are fatal
    let config = match Config::load_with_env(Path::new("config.yml")) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    tokio::fs::create_dir_all(&config.storage.path)
        .await
        .with_context(|| format!("Failed to create media directory {:?}", config.storage.path))?;

    let state = AppState::new(pool, &config);

    // Demo mode: create a default admin account on an empty database
    #[cfg(feature = "demo")]
    {
        use haven::services::RegisterInput;

        if state.user_service.is_first_user().await? {
            tracing::info!("Demo mode: creating default admin (admin@haven.local / haven-demo)");
            state
                .user_service
                .register(RegisterInput {
                    email: "admin@haven.local".to_string(),
                    password: "haven-demo".to_string(),
                    display_name: Some("Demo Admin".to_string()),
                })
                .await?;
        }
    }

    if !state.user_service.email_configured() {
        tracing::warn!("SMTP not configured, password reset links will only be logged");
    }

    // Periodic cleanup of rate limiter state and expired sessions
    {
        let limiter = state.rate_limiter.clone();
        let users = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
                match users.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "Expired sessions removed"),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
