//! # Voice Gateway - Main Application Entry Point
//!
//! A real-time voice analysis gateway. Browsers stream raw microphone PCM
//! over a WebSocket; the gateway segments the stream by voice activity,
//! fans each utterance out to the transcription, audio-analysis and
//! text-analysis services, persists the enriched results, and pushes them
//! back to the client as they complete.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **state**: shared application state and gateway metrics
//! - **audio**: frame decoding, voice activity detection, segmentation
//! - **session**: per-connection state, analysis fan-out, result writer
//! - **services**: typed clients for the backing analysis services
//! - **db**: SQLite persistence for records, segments and users
//! - **websocket**: the live `/ws` channel and session lifecycle
//! - **handlers**: the read-only query surface and user enrollment
//! - **middleware**: request logging and endpoint metrics

mod audio;
mod config;
mod db;
mod error;
mod handlers;
mod health;
mod middleware;
mod services;
mod session;
mod state;
mod websocket;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use db::Store;
use services::ServiceClients;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown flag set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voice-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let store = Store::new(&config.database.path)?;
    let service_clients = ServiceClients::from_config(&config.services)?;
    let app_state = AppState::new(config.clone(), store, service_clients);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::RequestTelemetry)
            // The live analysis channel
            .route("/ws", web::get().to(websocket::live_audio))
            // Read-only query surface and enrollment
            .route("/api/records", web::get().to(handlers::get_records))
            .route("/api/segments", web::get().to(handlers::get_segments))
            .route("/api/users", web::get().to(handlers::list_users))
            .route("/api/users", web::post().to(handlers::create_user))
            // Health and metrics
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics)),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Race the server against the shutdown signal.
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_gateway=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Install SIGTERM/SIGINT handlers that flip the shutdown flag. Graceful
/// shutdown lets in-flight requests and live sessions wind down first.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
