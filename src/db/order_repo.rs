use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::order::{format_order_number, CreateOrderDraft, Order, OrderItem};
use crate::domain::types::{OrderStatus, OrderType, Priority};
use crate::error::AppError;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(
        &self,
        draft: &CreateOrderDraft,
        changed_by: &str,
        notes: Option<&str>,
    ) -> Result<Order, AppError>;

    async fn get_and_increment_sequence(&self, date: NaiveDate) -> Result<i64, AppError>;

    async fn get_by_number(&self, number: &str) -> Result<Order, AppError>;

    /// Returns the old status alongside writing the new one plus a
    /// status-log row, all inside one transaction.
    async fn set_status(
        &self,
        number: &str,
        worker_name: &str,
        new_status: OrderStatus,
        notes: Option<&str>,
    ) -> Result<OrderStatus, AppError>;

    async fn history(&self, number: &str) -> Result<Vec<(OrderStatus, String, Option<String>, chrono::DateTime<Utc>)>, AppError>;
}

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(
        &self,
        draft: &CreateOrderDraft,
        changed_by: &str,
        notes: Option<&str>,
    ) -> Result<Order, AppError> {
        let today = Utc::now().date_naive();
        let sequence = self.get_and_increment_sequence(today).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "sequence allocation failed, falling back to a random order number");
            rand::random::<i64>().rem_euclid(90_000) + 10_000
        });

        let number = format_order_number(today, sequence);
        let total_amount = draft.total_amount();
        let priority = Priority::from_total(total_amount);
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, number, customer_name, order_type, table_number, \
             delivery_address, total_amount, priority, status, processed_by, created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$11)",
        )
        .bind(order_id)
        .bind(&number)
        .bind(&draft.customer_name)
        .bind(draft.order_type.as_str())
        .bind(&draft.table_number)
        .bind(&draft.delivery_address)
        .bind(total_amount)
        .bind(priority.as_u32() as i32)
        .bind(OrderStatus::Received.as_str())
        .bind(changed_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            let item_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO order_items (id, order_id, name, quantity, price) VALUES ($1,$2,$3,$4,$5)",
            )
            .bind(item_id)
            .bind(order_id)
            .bind(&item.name)
            .bind(item.quantity as i32)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
            items.push(OrderItem {
                id: item_id,
                name: item.name.clone(),
                quantity: item.quantity,
                price: item.price,
            });
        }

        sqlx::query(
            "INSERT INTO order_status_log (id, order_id, status, changed_by, notes, changed_at) \
             VALUES ($1,$2,$3,$4,$5,$6)",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(OrderStatus::Received.as_str())
        .bind(changed_by)
        .bind(notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Order {
            id: order_id,
            number,
            customer_name: draft.customer_name.clone(),
            order_type: draft.order_type,
            table_number: draft.table_number.clone(),
            delivery_address: draft.delivery_address.clone(),
            items,
            total_amount,
            priority,
            status: OrderStatus::Received,
            processed_by: Some(changed_by.to_string()),
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    async fn get_and_increment_sequence(&self, date: NaiveDate) -> Result<i64, AppError> {
        let row = sqlx::query(
            "INSERT INTO order_sequences (date, last_value, updated_at) VALUES ($1, 1, now()) \
             ON CONFLICT (date) DO UPDATE SET last_value = order_sequences.last_value + 1, \
             updated_at = now() RETURNING last_value",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("last_value")?)
    }

    async fn get_by_number(&self, number: &str) -> Result<Order, AppError> {
        let row = sqlx::query(
            "SELECT id, number, customer_name, order_type, table_number, delivery_address, \
             total_amount, priority, status, processed_by, created_at, updated_at, completed_at \
             FROM orders WHERE number = $1",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::OrderNotFound(number.to_string()))?;

        let items_rows = sqlx::query("SELECT id, name, quantity, price FROM order_items WHERE order_id = $1")
            .bind(row.try_get::<Uuid, _>("id")?)
            .fetch_all(&self.pool)
            .await?;

        let items = items_rows
            .into_iter()
            .map(|r| -> Result<OrderItem, AppError> {
                Ok(OrderItem {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                    quantity: r.try_get::<i32, _>("quantity")? as u32,
                    price: r.try_get::<Decimal, _>("price")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        row_to_order(row, items)
    }

    async fn set_status(
        &self,
        number: &str,
        worker_name: &str,
        new_status: OrderStatus,
        notes: Option<&str>,
    ) -> Result<OrderStatus, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query("SELECT id, status FROM orders WHERE number = $1 FOR UPDATE")
            .bind(number)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::OrderNotFound(number.to_string()))?;

        let order_id: Uuid = current.try_get("id")?;
        let old_status_str: String = current.try_get("status")?;
        let old_status = old_status_str
            .parse::<OrderStatus>()
            .map_err(|e| AppError::PermanentPayload(anyhow::anyhow!(e)))?;

        let now = Utc::now();
        if new_status == OrderStatus::Ready {
            sqlx::query(
                "UPDATE orders SET status = $1, processed_by = $2, updated_at = $3, completed_at = $3 \
                 WHERE id = $4",
            )
            .bind(new_status.as_str())
            .bind(worker_name)
            .bind(now)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE orders SET status = $1, processed_by = $2, updated_at = $3 WHERE id = $4")
                .bind(new_status.as_str())
                .bind(worker_name)
                .bind(now)
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO order_status_log (id, order_id, status, changed_by, notes, changed_at) \
             VALUES ($1,$2,$3,$4,$5,$6)",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(new_status.as_str())
        .bind(worker_name)
        .bind(notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(old_status)
    }

    async fn history(
        &self,
        number: &str,
    ) -> Result<Vec<(OrderStatus, String, Option<String>, chrono::DateTime<Utc>)>, AppError> {
        let rows = sqlx::query(
            "SELECT l.status, l.changed_by, l.notes, l.changed_at FROM order_status_log l \
             JOIN orders o ON o.id = l.order_id WHERE o.number = $1 ORDER BY l.changed_at ASC",
        )
        .bind(number)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(AppError::OrderNotFound(number.to_string()));
        }

        rows.into_iter()
            .map(|r| -> Result<_, AppError> {
                let status: String = r.try_get("status")?;
                let status = status
                    .parse::<OrderStatus>()
                    .map_err(|e| AppError::PermanentPayload(anyhow::anyhow!(e)))?;
                Ok((status, r.try_get("changed_by")?, r.try_get("notes")?, r.try_get("changed_at")?))
            })
            .collect()
    }
}

fn row_to_order(row: sqlx::postgres::PgRow, items: Vec<OrderItem>) -> Result<Order, AppError> {
    let order_type: String = row.try_get("order_type")?;
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        number: row.try_get("number")?,
        customer_name: row.try_get("customer_name")?,
        order_type: order_type
            .parse::<OrderType>()
            .map_err(|e| AppError::PermanentPayload(anyhow::anyhow!(e)))?,
        table_number: row.try_get("table_number")?,
        delivery_address: row.try_get("delivery_address")?,
        items,
        total_amount: row.try_get("total_amount")?,
        priority: Priority(row.try_get::<i32, _>("priority")? as u32),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| AppError::PermanentPayload(anyhow::anyhow!(e)))?,
        processed_by: row.try_get("processed_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}
