use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use lapin::Connection;
use tokio_util::sync::CancellationToken;

use crate::broker::order_consumer::{consume_type_queue, InFlightCounter};
use crate::broker::order_producer::NotificationProducer;
use crate::db::order_repo::OrderRepository;
use crate::db::worker_repo::WorkerRepository;
use crate::domain::messages::{PublishedOrder, StatusUpdate};
use crate::domain::types::{OrderStatus, OrderType};
use crate::error::AppError;

pub struct KitchenWorkerConfig {
    pub name: String,
    pub order_types: Vec<OrderType>,
    pub heartbeat_interval: Duration,
    pub prefetch: u16,
}

impl KitchenWorkerConfig {
    /// Parses and validates the `--worker-name`/`--order-types`/
    /// `--heartbeat-interval` flags. An empty `order_types` string means
    /// "all three", not "none".
    pub fn parse(
        name: String,
        order_types_csv: &str,
        heartbeat_interval: Duration,
        prefetch: u16,
    ) -> Result<Self, AppError> {
        if name.is_empty() || name.chars().count() > 100 {
            return Err(AppError::Fatal(anyhow::anyhow!(
                "worker name must be 1-100 characters"
            )));
        }
        if heartbeat_interval <= Duration::from_secs(5) {
            return Err(AppError::Fatal(anyhow::anyhow!(
                "heartbeat interval must be greater than 5 seconds"
            )));
        }

        let order_types = if order_types_csv.trim().is_empty() {
            OrderType::ALL.to_vec()
        } else {
            let mut seen = HashSet::new();
            let mut types = Vec::new();
            for part in order_types_csv.split(',') {
                let part = part.trim();
                let parsed: OrderType = part
                    .parse()
                    .map_err(|e| AppError::Fatal(anyhow::anyhow!(e)))?;
                if !seen.insert(part.to_string()) {
                    return Err(AppError::Fatal(anyhow::anyhow!(
                        "duplicate order type '{part}' in --order-types"
                    )));
                }
                types.push(parsed);
            }
            types
        };

        Ok(Self {
            name,
            order_types,
            heartbeat_interval,
            prefetch,
        })
    }

    pub fn order_types_csv(&self) -> String {
        self.order_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

struct WorkerContext {
    name: String,
    order_repo: Arc<dyn OrderRepository>,
    worker_repo: Arc<dyn WorkerRepository>,
    notifications: Arc<NotificationProducer>,
    stop: CancellationToken,
}

/// Runs the kitchen worker until `external_stop` fires: registers online,
/// spawns one consumer per declared order type plus a heartbeat loop, then
/// on shutdown stops accepting new deliveries, lets in-flight processing
/// finish, and marks the worker offline.
pub async fn run(
    config: KitchenWorkerConfig,
    order_repo: Arc<dyn OrderRepository>,
    worker_repo: Arc<dyn WorkerRepository>,
    notifications: Arc<NotificationProducer>,
    connection: Connection,
    external_stop: CancellationToken,
) -> Result<(), AppError> {
    let heartbeat_chrono = chrono::Duration::from_std(config.heartbeat_interval)
        .unwrap_or_else(|_| chrono::Duration::seconds(30));

    worker_repo
        .mark_online(&config.name, &config.order_types_csv(), heartbeat_chrono)
        .await?;
    tracing::info!(worker = %config.name, order_types = %config.order_types_csv(), "worker online");

    let consumption_stop = CancellationToken::new();
    let in_flight = InFlightCounter::default();

    let ctx = Arc::new(WorkerContext {
        name: config.name.clone(),
        order_repo,
        worker_repo: worker_repo.clone(),
        notifications,
        stop: consumption_stop.clone(),
    });

    let heartbeat_handle = tokio::spawn(heartbeat_loop(
        config.name.clone(),
        worker_repo.clone(),
        config.heartbeat_interval,
        external_stop.clone(),
    ));

    let mut consumer_handles = Vec::new();
    for order_type in config.order_types.iter().copied() {
        let ctx = ctx.clone();
        let connection = connection.clone();
        let consumption_stop = consumption_stop.clone();
        let in_flight = in_flight.clone();
        let tag = format!("{}-{}", config.name, order_type.as_str());
        let prefetch = config.prefetch;
        consumer_handles.push(tokio::spawn(async move {
            consume_type_queue(
                &connection,
                order_type,
                prefetch,
                &tag,
                consumption_stop,
                in_flight,
                move |order, request_id| {
                    let ctx = ctx.clone();
                    async move { process_order(ctx, order, request_id).await }
                },
            )
            .await
        }));
    }

    external_stop.cancelled().await;
    tracing::info!(worker = %config.name, "shutdown requested, draining in-flight orders");
    consumption_stop.cancel();

    let drain = futures_util::future::join_all(consumer_handles);
    match tokio::time::timeout(Duration::from_secs(10), drain).await {
        Ok(results) => {
            for result in results {
                match result {
                    Err(join_err) => tracing::error!(error = %join_err, "consumer task panicked"),
                    Ok(Err(err)) => tracing::error!(error = %err, "consumer task exited with error"),
                    Ok(Ok(())) => {}
                }
            }
        }
        Err(_) => {
            tracing::warn!(worker = %config.name, in_flight = in_flight.count(), "drain timed out, marking offline anyway");
        }
    }

    heartbeat_handle.abort();
    worker_repo.mark_offline(&config.name).await?;
    tracing::info!(worker = %config.name, "worker offline");
    Ok(())
}

async fn heartbeat_loop(
    name: String,
    worker_repo: Arc<dyn WorkerRepository>,
    interval: Duration,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = worker_repo.update_last_seen(&name).await {
                    tracing::warn!(error = %err, worker = %name, "heartbeat update failed");
                }
            }
            _ = stop.cancelled() => return,
        }
    }
}

async fn process_order(
    ctx: Arc<WorkerContext>,
    order: PublishedOrder,
    request_id: Option<String>,
) -> Result<(), AppError> {
    let span = tracing::info_span!("process_order", order_number = %order.order_number, request_id = request_id.as_deref().unwrap_or(""));
    let _entered = span.enter();

    let old_status = ctx
        .order_repo
        .set_status(&order.order_number, &ctx.name, OrderStatus::Cooking, None)
        .await?;

    let cook_time = order.order_type.cook_time();
    let estimated_completion = chrono::Utc::now()
        + chrono::Duration::from_std(cook_time).unwrap_or(chrono::Duration::seconds(5));

    notify(&ctx, &order, old_status, OrderStatus::Cooking, Some(estimated_completion), request_id.clone()).await;

    wait_for_cook_time(cook_time, &ctx.stop).await;

    match ctx
        .order_repo
        .set_status(&order.order_number, &ctx.name, OrderStatus::Ready, None)
        .await
    {
        Ok(old_status) => {
            notify(&ctx, &order, old_status, OrderStatus::Ready, Some(estimated_completion), request_id).await;
        }
        Err(err) => {
            tracing::error!(error = %err, order_number = %order.order_number, "failed to mark order ready; order remains persisted as cooking");
        }
    }

    if let Err(err) = ctx.worker_repo.incr_orders_processed(&ctx.name).await {
        tracing::warn!(error = %err, worker = %ctx.name, "failed to increment orders-processed counter");
    }

    Ok(())
}

async fn notify(
    ctx: &WorkerContext,
    order: &PublishedOrder,
    old_status: OrderStatus,
    new_status: OrderStatus,
    estimated_completion: Option<chrono::DateTime<chrono::Utc>>,
    request_id: Option<String>,
) {
    let update = StatusUpdate {
        order_number: order.order_number.clone(),
        old_status,
        new_status,
        changed_by: ctx.name.clone(),
        timestamp: chrono::Utc::now(),
        estimated_completion,
        request_id,
    };
    if let Err(err) = ctx.notifications.publish(&update).await {
        tracing::warn!(error = %err, order_number = %order.order_number, "failed to publish status update; database remains authoritative");
    }
}

/// Sleeps for the simulated cook time. A shutdown request during the sleep
/// is logged once but never cuts the sleep short: the worker always
/// finishes the order it already started.
async fn wait_for_cook_time(duration: Duration, stop: &CancellationToken) {
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    let mut logged = false;
    loop {
        tokio::select! {
            _ = &mut sleep => return,
            _ = stop.cancelled(), if !logged => {
                tracing::info!("shutdown requested mid-cook; finishing current order before exiting");
                logged = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_order_types_means_all_three() {
        let config = KitchenWorkerConfig::parse("grill-1".into(), "", Duration::from_secs(30), 1).unwrap();
        assert_eq!(config.order_types.len(), 3);
    }

    #[test]
    fn duplicate_order_types_are_rejected() {
        let result = KitchenWorkerConfig::parse("grill-1".into(), "dine_in,dine_in", Duration::from_secs(30), 1);
        assert!(result.is_err());
    }

    #[test]
    fn heartbeat_interval_must_exceed_five_seconds() {
        let result = KitchenWorkerConfig::parse("grill-1".into(), "takeout", Duration::from_secs(5), 1);
        assert!(result.is_err());
    }

    #[test]
    fn valid_subset_parses_in_order() {
        let config = KitchenWorkerConfig::parse("grill-1".into(), "takeout,delivery", Duration::from_secs(30), 1).unwrap();
        assert_eq!(config.order_types, vec![OrderType::Takeout, OrderType::Delivery]);
    }
}
