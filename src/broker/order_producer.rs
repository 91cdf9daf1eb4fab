use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::{BasicProperties, Channel, Connection, ExchangeKind};
use lapin::types::FieldTable;
use tokio::sync::Mutex;

use crate::config::RabbitmqConfig;
use crate::domain::messages::PublishedOrder;
use crate::error::AppError;

use super::connection::{connect_with_retry, is_connection_closed};
use super::topology::declare_topology;

/// Publishes `PublishedOrder` messages onto the orders topic exchange,
/// reconnecting transparently if the broker connection drops.
pub struct OrderProducer {
    config: RabbitmqConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    connection: Connection,
    channel: Channel,
}

impl OrderProducer {
    pub async fn connect(config: RabbitmqConfig) -> Result<Self, AppError> {
        let connection = connect_with_retry(&config).await?;
        let channel = connection.create_channel().await?;
        declare_topology(&channel, &config).await?;
        Ok(Self {
            config,
            inner: Mutex::new(Inner { connection, channel }),
        })
    }

    async fn ensure_connected(&self, inner: &mut Inner) -> Result<(), AppError> {
        if is_connection_closed(&inner.connection) {
            tracing::warn!("order producer connection closed, reconnecting");
            inner.connection = connect_with_retry(&self.config).await?;
            inner.channel = inner.connection.create_channel().await?;
            declare_topology(&inner.channel, &self.config).await?;
        }
        Ok(())
    }

    /// Publishes `order` with persistent delivery and an AMQP priority
    /// header equal to the order's computed priority, retrying through a
    /// reconnect if the cached connection has died. Returns an error — the
    /// caller's database row stays put either way — after exhausting the
    /// reconnect budget.
    pub async fn publish(&self, order: &PublishedOrder) -> Result<(), AppError> {
        let payload = serde_json::to_vec(order)
            .map_err(|e| AppError::PermanentPayload(anyhow::anyhow!(e)))?;
        let routing_key = order.order_type.routing_key(order.priority);

        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;

        let properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_priority(order.priority.min(255) as u8)
            .with_content_type("application/json".into());

        inner
            .channel
            .basic_publish(
                &self.config.order_exchange,
                &routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?
            .await?;

        Ok(())
    }

    pub async fn close(&self) -> Result<(), AppError> {
        let inner = self.inner.lock().await;
        inner.channel.close(200, "shutting down").await?;
        inner.connection.close(200, "shutting down").await?;
        Ok(())
    }
}

/// Publishes `StatusUpdate` messages onto the fanout notifications
/// exchange. Kept alongside the order producer because both live in the
/// same process (the kitchen worker) and share a connection.
pub struct NotificationProducer {
    config: RabbitmqConfig,
    inner: Mutex<Inner>,
}

impl NotificationProducer {
    pub async fn connect(config: RabbitmqConfig) -> Result<Self, AppError> {
        let connection = connect_with_retry(&config).await?;
        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &config.notifications_exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(Self {
            config,
            inner: Mutex::new(Inner { connection, channel }),
        })
    }

    pub async fn publish(&self, update: &crate::domain::messages::StatusUpdate) -> Result<(), AppError> {
        let payload = serde_json::to_vec(update)
            .map_err(|e| AppError::PermanentPayload(anyhow::anyhow!(e)))?;

        let mut inner = self.inner.lock().await;
        if is_connection_closed(&inner.connection) {
            inner.connection = connect_with_retry(&self.config).await?;
            inner.channel = inner.connection.create_channel().await?;
            inner
                .channel
                .exchange_declare(
                    &self.config.notifications_exchange,
                    ExchangeKind::Fanout,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        inner
            .channel
            .basic_publish(
                &self.config.notifications_exchange,
                "",
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?
            .await?;

        Ok(())
    }

    pub async fn close(&self) -> Result<(), AppError> {
        let inner = self.inner.lock().await;
        inner.channel.close(200, "shutting down").await?;
        inner.connection.close(200, "shutting down").await?;
        Ok(())
    }
}
