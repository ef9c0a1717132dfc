use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use ladder_backend::clock::{Clock, SystemClock};
use ladder_backend::config::Config;
use ladder_backend::db::{create_pool, run_migrations};
use ladder_backend::http::{configure_routes, AppState};
use ladder_backend::middleware::cors_middleware;
use ladder_backend::models::RewardTiers;
use ladder_backend::service::{Collaborators, HttpGateway, LadderService, LogGateway, RetryConfig};
use ladder_backend::store::{PgJournal, Store};
use ladder_backend::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize telemetry
    init_telemetry(&config.server.rust_log);

    // Persistence: PostgreSQL when configured, memory otherwise
    let (store, db_pool) = match &config.database.url {
        Some(url) => {
            let pool = create_pool(&config.database, url)
                .await
                .context("Failed to create database pool")?;
            run_migrations(&pool).await.context("Failed to run migrations")?;
            let journal = Arc::new(PgJournal::new(pool.clone()));
            let store = Store::with_journal(journal)
                .await
                .context("Failed to load ladder state")?;
            (store, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, ladder state will not survive a restart");
            (Store::in_memory(), None)
        }
    };

    let collaborators = match &config.gateway.url {
        Some(url) => {
            let retry_config = RetryConfig {
                max_retries: config.gateway.max_retries,
                ..RetryConfig::default()
            };
            let gateway = HttpGateway::with_retry_config(
                url.as_str(),
                Duration::from_secs(config.gateway.timeout_secs),
                retry_config,
            )
            .context("Failed to build bot gateway client")?;
            Collaborators::from_gateway(Arc::new(gateway))
        }
        None => {
            tracing::warn!("BOT_GATEWAY_URL not set, gateway calls are only logged");
            Collaborators::from_gateway(Arc::new(LogGateway))
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ladder = Arc::new(LadderService::new(
        store,
        clock.clone(),
        collaborators,
        &config.ladder,
        RewardTiers::default_ladder(),
    ));

    // Periodic expiry of stale queue entries, rewards and perks
    let sweeper = ladder.clone();
    let sweep_interval = Duration::from_secs(config.ladder.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweeper.run_sweeps(clock.now()).await;
        }
    });

    tracing::info!("Starting ladder backend on {}:{}", config.server.host, config.server.port);

    let state = web::Data::new(AppState {
        ladder,
        db_pool,
        admin_token: config.admin.token.clone(),
    });

    let cors_origin = config.server.cors_origin.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_middleware(cors_origin.as_deref()))
            .wrap(actix_web::middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await?;
    Ok(())
}
