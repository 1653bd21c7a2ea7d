//! # Cyber Threat Map Server
//!
//! Binary entry point: runs the simulation engine and serves its events.

use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use threatmap_server::{Config, build_engine, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(
        version = threatmap_server::VERSION,
        "Starting Cyber Threat Map Server"
    );

    let (mut engine, state) = build_engine(&config)?;
    tracing::info!(
        scenario = ?config.scenario_path,
        centers = state.center_info.centers.len(),
        attack_speed_mps = config.simulation.attack_speed_mps,
        interceptor_speed_mps = config.simulation.intercept.interceptor_speed_mps,
        policy = ?config.simulation.intercept.launch_policy,
        "Simulation configured"
    );

    // The engine owns all simulation state inside this one task
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let engine_task = tokio::spawn(async move {
        engine
            .run(async {
                let _ = stop_rx.await;
            })
            .await
    });

    // Build router
    let app = build_router(state);

    // Start server
    let addr = config.server_addr;
    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Event feed available at ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_tx.send(());
    let stats = engine_task.await?;
    tracing::info!(
        generated = stats.generated,
        hits = stats.hits,
        intercepted = stats.intercepted,
        "Server shut down gracefully"
    );
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
