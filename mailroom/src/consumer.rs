//! RabbitMQ consumer for the mailbox_routing queue.
//!
//! Each delivery is a [`RouteJob`]. Jobs are performed on the blocking pool,
//! since mailboxes are synchronous, and acknowledged according to how they
//! failed:
//!
//! - success → ack
//! - unparseable payload or email, unknown destination → nack, drop
//! - mailbox error or panic → nack, requeue once; dropped if it fails again
//!   on redelivery

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tokio::signal;
use tracing::{error, info, warn};

use mailroom::queue::publisher::declare_routing_queue;
use mailroom::{perform_route_job, settle, Config, Mailroom, RouteJob, Settlement, ROUTING_QUEUE};

/// Run the RabbitMQ consumer until SIGINT/SIGTERM or the broker closes the
/// consumer.
pub async fn run(config: Config, mailroom: Mailroom) -> Result<()> {
    let mailroom = Arc::new(mailroom);

    info!(url_length = config.cloudamqp_url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(&config.cloudamqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    let channel = conn.create_channel().await.context("Failed to create channel")?;

    // Prefetch bounds the number of jobs in flight
    let prefetch_count = u16::try_from(config.worker_concurrency.max(1)).unwrap_or(u16::MAX);
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    declare_routing_queue(&channel).await?;

    let mut consumer = channel
        .basic_consume(
            ROUTING_QUEUE,
            "mailroom-router",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = ROUTING_QUEUE, "rabbitmq_consumer_started");
    info!("router_ready");

    let channel = Arc::new(channel);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("router_stopping");
                break;
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let mailroom = Arc::clone(&mailroom);
                        let channel = Arc::clone(&channel);
                        tokio::spawn(handle_delivery(mailroom, channel, delivery));
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    info!("router_shutdown_complete");
    Ok(())
}

async fn handle_delivery(mailroom: Arc<Mailroom>, channel: Arc<Channel>, delivery: Delivery) {
    let delivery_tag = delivery.delivery_tag;
    let message_id = delivery
        .properties
        .message_id()
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        queue = ROUTING_QUEUE,
        message_id = %message_id,
        delivery_tag = delivery_tag,
        redelivered = delivery.redelivered,
        body_length = delivery.data.len(),
        "rabbitmq_route_job_received"
    );

    let settlement = match serde_json::from_slice::<RouteJob>(&delivery.data) {
        Ok(job) => perform(mailroom, job, &message_id, delivery.redelivered).await,
        Err(e) => {
            error!(
                message_id = %message_id,
                error = %e,
                body_preview = %String::from_utf8_lossy(
                    &delivery.data[..delivery.data.len().min(500)]
                ),
                "route_job_parse_failed"
            );
            Settlement::Drop
        }
    };

    let result = match settlement {
        Settlement::Ack => channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await,
        Settlement::Requeue | Settlement::Drop => channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue: settlement == Settlement::Requeue,
                    ..Default::default()
                },
            )
            .await,
    };

    match result {
        Ok(()) => info!(
            message_id = %message_id,
            settlement = ?settlement,
            "rabbitmq_route_job_settled"
        ),
        Err(e) => error!(
            delivery_tag = delivery_tag,
            settlement = ?settlement,
            error = %e,
            "rabbitmq_settle_failed"
        ),
    }
}

async fn perform(
    mailroom: Arc<Mailroom>,
    job: RouteJob,
    message_id: &str,
    redelivered: bool,
) -> Settlement {
    let outcome = tokio::task::spawn_blocking(move || perform_route_job(&mailroom, job)).await;

    let settlement = match &outcome {
        Ok(outcome) => settle(outcome, redelivered),
        Err(_) => Settlement::retry_once(redelivered),
    };

    match outcome {
        Ok(Ok(_email)) => {}
        Ok(Err(e)) => error!(
            message_id = %message_id,
            error = %e,
            retryable = e.is_retryable(),
            redelivered = redelivered,
            settlement = ?settlement,
            "route_job_failed"
        ),
        Err(e) => error!(
            message_id = %message_id,
            error = %e,
            redelivered = redelivered,
            settlement = ?settlement,
            "route_job_panicked"
        ),
    }

    settlement
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
}
