use std::sync::Arc;
use std::time::Duration;

use bidauth::{app, config, initialize_state, spawn_session_sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let state = initialize_state().await?;

    // periodic removal of expired and retired session rows.
    let sweep_interval = state
        .config
        .auth
        .as_ref()
        .map_or_else(
            || config::Auth::default().sweep_interval_seconds,
            |auth| auth.sweep_interval_seconds,
        );
    spawn_session_sweeper(
        Arc::new(state.auth.clone()),
        Duration::from_secs(sweep_interval),
    );

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_owned());
    let listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(%port, "server started");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
