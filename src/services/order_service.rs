use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::broker::order_producer::OrderProducer;
use crate::db::order_repo::OrderRepository;
use crate::domain::messages::{PublishedOrder, PublishedOrderItem};
use crate::domain::order::CreateOrderDraft;
use crate::domain::order::Order;
use crate::error::AppError;

/// The Order Publisher's business logic: bounded admission, transactional
/// persistence, and a retrying publish onto the orders exchange.
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    producer: Arc<OrderProducer>,
    semaphore: Arc<Semaphore>,
    sem_wait: std::time::Duration,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        producer: Arc<OrderProducer>,
        max_concurrent: u32,
        sem_wait: std::time::Duration,
    ) -> Self {
        Self {
            repo,
            producer,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1) as usize)),
            sem_wait,
        }
    }

    pub async fn create_order(
        &self,
        draft: CreateOrderDraft,
        request_id: Option<String>,
    ) -> Result<Order, AppError> {
        let _permit = tokio::time::timeout(self.sem_wait, self.semaphore.acquire())
            .await
            .map_err(|_| AppError::TooManyRequests)?
            .map_err(|e| AppError::Fatal(anyhow::anyhow!(e)))?;

        let order = self.repo.create(&draft, "order-service", None).await?;

        let message = PublishedOrder {
            order_number: order.number.clone(),
            customer_name: order.customer_name.clone(),
            order_type: order.order_type,
            table_number: order.table_number.clone(),
            delivery_address: order.delivery_address.clone(),
            items: order
                .items
                .iter()
                .map(|item| PublishedOrderItem {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            total_amount: order.total_amount,
            priority: order.priority.as_u32(),
            request_id,
        };

        if let Err(err) = self.producer.publish(&message).await {
            tracing::error!(order_number = %order.number, error = %err, "publishing order failed after persistence; relying on at-least-once recovery");
            return Err(err);
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderItemDraft;
    use crate::domain::types::{OrderStatus, OrderType};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRepo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OrderRepository for StubRepo {
        async fn create(
            &self,
            draft: &CreateOrderDraft,
            changed_by: &str,
            _notes: Option<&str>,
        ) -> Result<Order, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let total = draft.total_amount();
            Ok(Order {
                id: uuid::Uuid::new_v4(),
                number: "ORD_20260728_001".into(),
                customer_name: draft.customer_name.clone(),
                order_type: draft.order_type,
                table_number: draft.table_number.clone(),
                delivery_address: draft.delivery_address.clone(),
                items: vec![],
                total_amount: total,
                priority: crate::domain::types::Priority::from_total(total),
                status: OrderStatus::Received,
                processed_by: Some(changed_by.to_string()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                completed_at: None,
            })
        }

        async fn get_and_increment_sequence(&self, _date: NaiveDate) -> Result<i64, AppError> {
            Ok(1)
        }

        async fn get_by_number(&self, _number: &str) -> Result<Order, AppError> {
            unimplemented!()
        }

        async fn set_status(
            &self,
            _number: &str,
            _worker_name: &str,
            _new_status: OrderStatus,
            _notes: Option<&str>,
        ) -> Result<OrderStatus, AppError> {
            unimplemented!()
        }

        async fn history(
            &self,
            _number: &str,
        ) -> Result<Vec<(OrderStatus, String, Option<String>, chrono::DateTime<Utc>)>, AppError> {
            unimplemented!()
        }
    }

    fn sample_draft() -> CreateOrderDraft {
        CreateOrderDraft {
            customer_name: "Alex".into(),
            order_type: OrderType::Takeout,
            table_number: None,
            delivery_address: None,
            items: vec![OrderItemDraft {
                name: "Soup".into(),
                quantity: 1,
                price: dec!(9.00),
            }],
        }
    }

    #[tokio::test]
    async fn admission_control_times_out_while_the_only_permit_is_held() {
        // publish() requires a live broker connection which this unit test
        // does not stand up; exercise only the semaphore gate directly.
        let semaphore = Arc::new(Semaphore::new(1));
        let _permit = semaphore.clone().acquire_owned().await.unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_millis(10), semaphore.acquire()).await;
        assert!(result.is_err(), "acquire should time out while the only permit is held");
    }

    #[tokio::test]
    async fn repo_create_derives_total_and_priority_from_draft() {
        let repo = StubRepo {
            calls: AtomicUsize::new(0),
        };
        let order = repo.create(&sample_draft(), "order-service", None).await.unwrap();
        assert_eq!(order.total_amount, dec!(9.00));
        assert_eq!(order.priority.0, 1);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }
}
