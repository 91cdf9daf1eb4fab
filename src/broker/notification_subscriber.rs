use std::time::Duration;

use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicRejectOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::Connection;
use tokio_util::sync::CancellationToken;

use crate::config::RabbitmqConfig;
use crate::domain::messages::StatusUpdate;
use crate::error::AppError;

use super::connection::{connect_with_retry, is_connection_closed};

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const BACKOFF_CAP: Duration = Duration::from_secs(2);

/// Subscribes to the notifications fanout exchange through a transient,
/// exclusive, auto-delete queue. Runs until `stop` fires or the reconnect
/// budget is exhausted.
pub async fn run<F>(config: RabbitmqConfig, stop: CancellationToken, mut on_update: F) -> Result<(), AppError>
where
    F: FnMut(StatusUpdate) + Send,
{
    let mut attempt = 0u32;

    loop {
        if stop.is_cancelled() {
            return Ok(());
        }

        match subscribe_once(&config, &stop, &mut on_update).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempt += 1;
                if attempt > MAX_RECONNECT_ATTEMPTS {
                    tracing::error!(error = %err, "exhausted notification subscriber reconnect attempts");
                    return Err(err);
                }
                let delay = Duration::from_secs(attempt as u64).min(BACKOFF_CAP);
                tracing::warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "reconnecting notification subscriber");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop.cancelled() => return Ok(()),
                }
            }
        }
    }
}

async fn subscribe_once<F>(
    config: &RabbitmqConfig,
    stop: &CancellationToken,
    on_update: &mut F,
) -> Result<(), AppError>
where
    F: FnMut(StatusUpdate) + Send,
{
    let connection = connect_with_retry(config).await?;
    let channel = connection.create_channel().await?;

    channel
        .exchange_declare(
            &config.notifications_exchange,
            lapin::ExchangeKind::Fanout,
            lapin::options::ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    let queue = channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            queue.name().as_str(),
            &config.notifications_exchange,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel
        .basic_consume(
            queue.name().as_str(),
            "notification-subscriber",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut liveness = tokio::time::interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            _ = stop.cancelled() => return Ok(()),
            _ = liveness.tick() => {
                if is_connection_closed(&connection) {
                    return Err(AppError::RecoverableTransport(anyhow::anyhow!(
                        "notification subscriber connection died"
                    )));
                }
            }
            delivery = consumer.next() => {
                let Some(delivery) = delivery else {
                    return Err(AppError::RecoverableTransport(anyhow::anyhow!(
                        "notification consumer stream closed"
                    )));
                };
                let delivery = delivery?;
                match serde_json::from_slice::<StatusUpdate>(&delivery.data) {
                    Ok(update) => {
                        delivery.ack(BasicAckOptions::default()).await?;
                        on_update(update);
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "failed to decode status update");
                        delivery.reject(BasicRejectOptions { requeue: false }).await?;
                    }
                }
            }
        }
    }
}

/// Reports the current number of bindings on the notifications fanout
/// exchange via the broker's HTTP management API. Best-effort: failures are
/// logged and treated as "unknown", never fatal to the subscriber.
pub async fn listener_count(config: &RabbitmqConfig) -> Option<usize> {
    let url = format!(
        "http://{}:15672/api/exchanges/%2f/{}/bindings/source",
        config.host, config.notifications_exchange
    );
    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .basic_auth(&config.user, Some(&config.password))
        .send()
        .await;

    match response {
        Ok(resp) => match resp.json::<Vec<serde_json::Value>>().await {
            Ok(bindings) => Some(bindings.len()),
            Err(err) => {
                tracing::debug!(error = %err, "could not parse management API response");
                None
            }
        },
        Err(err) => {
            tracing::debug!(error = %err, "could not reach broker management API");
            None
        }
    }
}
