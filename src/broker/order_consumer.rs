use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::messages::PublishedOrder;
use crate::domain::types::OrderType;
use crate::error::AppError;

/// Tracks in-flight deliveries so a shutdown can drain active work before
/// cancelling consumption, per the worker's cooperative-shutdown contract.
/// Guarded by a single `parking_lot::Mutex`, the only lock any in-process
/// component touches for this count.
#[derive(Clone, Default)]
pub struct InFlightCounter(Arc<Mutex<usize>>);

impl InFlightCounter {
    pub fn count(&self) -> usize {
        *self.0.lock()
    }

    fn enter(&self) -> InFlightGuard {
        *self.0.lock() += 1;
        InFlightGuard(self.0.clone())
    }
}

struct InFlightGuard(Arc<Mutex<usize>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        *self.0.lock() -= 1;
    }
}

/// Consumes `order_type`'s queue until `stop` fires, invoking `handle` for
/// each decoded message and translating its outcome into the ack/nack
/// policy: decode failures and permanent handler errors go to the DLQ,
/// recoverable handler errors are requeued, success is acked.
pub async fn consume_type_queue<F, Fut>(
    connection: &Connection,
    order_type: OrderType,
    prefetch: u16,
    consumer_tag: &str,
    stop: CancellationToken,
    in_flight: InFlightCounter,
    handle: F,
) -> Result<(), AppError>
where
    F: Fn(PublishedOrder, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send,
{
    let channel: Channel = connection.create_channel().await?;
    channel
        .basic_qos(prefetch, BasicQosOptions::default())
        .await?;

    let mut consumer = channel
        .basic_consume(
            &order_type.queue_name(),
            consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                tracing::info!(order_type = %order_type, "stopping consumption");
                return Ok(());
            }
            delivery = consumer.next() => {
                let Some(delivery) = delivery else {
                    return Err(AppError::RecoverableTransport(anyhow::anyhow!(
                        "consumer stream for {order_type} closed"
                    )));
                };
                let delivery = delivery?;
                let _guard = in_flight.enter();

                match serde_json::from_slice::<PublishedOrder>(&delivery.data) {
                    Err(err) => {
                        tracing::error!(error = %err, order_type = %order_type, "failed to decode order message");
                        delivery
                            .reject(BasicRejectOptions { requeue: false })
                            .await?;
                    }
                    Ok(order) => {
                        let request_id = order.request_id.clone();
                        match handle(order, request_id).await {
                            Ok(()) => {
                                delivery.ack(BasicAckOptions::default()).await?;
                            }
                            Err(err) => {
                                let requeue = err.is_recoverable();
                                tracing::error!(error = %err, requeue, "order handling failed");
                                delivery
                                    .reject(BasicRejectOptions { requeue })
                                    .await?;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_drop_decrements_the_shared_count() {
        let counter = InFlightCounter::default();
        assert_eq!(counter.count(), 0);
        {
            let _guard = counter.enter();
            assert_eq!(counter.count(), 1);
        }
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn nested_guards_stack_the_count() {
        let counter = InFlightCounter::default();
        let first = counter.enter();
        let second = counter.enter();
        assert_eq!(counter.count(), 2);
        drop(first);
        assert_eq!(counter.count(), 1);
        drop(second);
        assert_eq!(counter.count(), 0);
    }
}
