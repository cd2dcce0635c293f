//! Mailroom Router - RabbitMQ worker that routes inbound email to mailboxes.
//!
//! Consumes route jobs from the mailbox_routing queue, rebuilds each inbound
//! email from its raw source, selects a mailbox through the routing table and
//! runs it.

mod consumer;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailroom::{load_mailroom, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("router_starting");

    let config = Config::from_env();
    tracing::info!(
        cloudamqp_url_set = !config.cloudamqp_url.is_empty(),
        concurrency = config.worker_concurrency,
        routes_path = ?config.routes_path,
        "config_loaded"
    );

    // Fail fast on a malformed routing table or unbound mailbox
    let mailroom = load_mailroom(&config)?;

    consumer::run(config, mailroom).await?;

    Ok(())
}
