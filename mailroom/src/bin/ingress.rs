//! Mailroom Ingress - web server that accepts inbound email.
//!
//! Authenticates relay and Mailgun deliveries and enqueues each message on
//! the mailbox_routing queue. Nothing is routed here.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailroom::web::{app, AppState};
use mailroom::{Config, Publisher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("ingress_starting");

    let config = Config::from_env();
    info!(
        port = config.port,
        max_body_bytes = config.max_body_bytes,
        relay_password_configured = config.ingress_password.is_some(),
        mailgun_signing_configured = config.mailgun_signing_key.is_some(),
        "config_loaded"
    );

    let publisher = Publisher::new(config.cloudamqp_url.clone());
    info!("rabbitmq_publisher_created");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, publisher.clone());

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "ingress_listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    publisher.close().await;

    info!("ingress_shutdown_complete");

    Ok(())
}

/// Completes when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("ingress_shutting_down");
}
