//! Async RabbitMQ publisher for route jobs.
//!
//! One connection and channel are shared by every clone of the publisher and
//! re-established lazily when the broker drops them.

use std::sync::Arc;

use anyhow::{Context, Result};
use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{RouteJob, ROUTING_QUEUE};

/// Async RabbitMQ publisher with connection management.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    /// Create a new publisher with the given RabbitMQ URL.
    ///
    /// No connection is made until the first publish.
    pub fn new(url: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Another task may have reconnected while we waited for the lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        info!("rabbitmq_publisher_connected");

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        declare_routing_queue(&ch).await?;

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a route job to the mailbox_routing queue.
    pub async fn publish_route_job(&self, job: &RouteJob) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let body = serde_json::to_vec(job).context("Failed to serialize route job")?;

        channel
            .basic_publish(
                "",
                ROUTING_QUEUE,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_message_id(job.message_id.clone().into()),
            )
            .await
            .context("Failed to publish to routing queue")?
            .await
            .context("Failed to confirm publish")?;

        info!(
            queue = ROUTING_QUEUE,
            message_id = %job.message_id,
            body_length = body.len(),
            "rabbitmq_route_job_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

/// Declare the durable routing queue (idempotent).
pub async fn declare_routing_queue(channel: &Channel) -> Result<()> {
    channel
        .queue_declare(
            ROUTING_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare routing queue")?;

    info!(queue = ROUTING_QUEUE, "rabbitmq_queue_declared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publisher_starts_disconnected() {
        let publisher = Publisher::new("amqp://localhost:5672".to_string());
        let clone = publisher.clone();

        assert_eq!(Arc::strong_count(&publisher.inner), 2);
        assert!(clone.inner.channel.read().await.is_none());
        assert!(clone.inner.connection.read().await.is_none());
    }
}
