//! # FieldGuard API Server
//!
//! The main entry point for the Actix-web HTTP server: a rate-limited
//! front for the upstream auth service plus browser report intake.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;
mod upstream;

use background::WindowSweeper;
use config::AppConfig;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    telemetry::init_telemetry(&TelemetryConfig::from_env());

    // Load configuration
    let config = AppConfig::from_env();

    tracing::info!(
        "Starting FieldGuard API Server on {}:{}",
        config.host,
        config.port
    );

    // Build application state
    let state = AppState::new(&config).map_err(|e| std::io::Error::other(e.to_string()))?;

    let sweeper =
        WindowSweeper::start(state.limiter.clone(), config.rate_limit.gc_interval).await?;

    // Start HTTP server
    let server_state = state.clone();
    let result = HttpServer::new(move || {
        let state = server_state.clone();
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(move |cfg| handlers::configure_routes(cfg, &state))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    sweeper.shutdown().await;
    state.limiter.shutdown().await;
    tracing::info!("Server stopped");

    result
}
