// src/main.rs

use axum::serve;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webhook2matrix::{cli::Cli, run, AppError};

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "Received signal. Initiating graceful shutdown...") },
        () = terminate => { info!(signal = "Terminate", "Received signal. Initiating graceful shutdown...") },
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Cli::parse_args();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let (app, config) = run(&args.config).await.map_err(|e| {
        eprintln!("Application setup error: {e:?}");
        e
    })?;

    let addr = format!("{}:{}", config.listen_host, config.listen_port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(server.address = %addr, error = ?e, "Failed to bind to address. Exiting.");
        AppError::from(e)
    })?;
    info!(server.address = %addr, "Server listening");

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = ?e, "Server run loop encountered an error. Exiting.");
            AppError::from(e)
        })?;

    info!("Server shut down gracefully.");
    Ok(())
}
