use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};

use crate::domain::worker::{Worker, WorkerStatus};
use crate::error::AppError;

#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// Registers `name` as online. Fails with `WorkerAlreadyOnline` if
    /// another live process already holds this name (status `online` with
    /// a recent heartbeat); otherwise inserts or reclaims the row.
    async fn mark_online(&self, name: &str, order_types: &str, heartbeat_interval: chrono::Duration) -> Result<(), AppError>;

    async fn update_last_seen(&self, name: &str) -> Result<(), AppError>;

    async fn incr_orders_processed(&self, name: &str) -> Result<(), AppError>;

    async fn mark_offline(&self, name: &str) -> Result<(), AppError>;

    async fn list(&self) -> Result<Vec<Worker>, AppError>;
}

pub struct PgWorkerRepository {
    pool: PgPool,
}

impl PgWorkerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerRepository for PgWorkerRepository {
    async fn mark_online(
        &self,
        name: &str,
        order_types: &str,
        heartbeat_interval: chrono::Duration,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT status, last_seen FROM workers WHERE name = $1 FOR UPDATE")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(row) = &existing {
            let status: String = row.try_get("status")?;
            let last_seen: chrono::DateTime<Utc> = row.try_get("last_seen")?;
            if status == WorkerStatus::Online.as_str() && Utc::now() - last_seen <= heartbeat_interval {
                return Err(AppError::WorkerAlreadyOnline(name.to_string()));
            }
        }

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO workers (name, order_types, status, orders_processed, last_seen) \
             VALUES ($1, $2, $3, 0, $4) \
             ON CONFLICT (name) DO UPDATE SET order_types = $2, status = $3, last_seen = $4",
        )
        .bind(name)
        .bind(order_types)
        .bind(WorkerStatus::Online.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_last_seen(&self, name: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE workers SET last_seen = $1 WHERE name = $2")
            .bind(Utc::now())
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn incr_orders_processed(&self, name: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE workers SET orders_processed = orders_processed + 1 WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_offline(&self, name: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE workers SET status = $1, last_seen = $2 WHERE name = $3")
            .bind(WorkerStatus::Offline.as_str())
            .bind(Utc::now())
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Worker>, AppError> {
        let rows = sqlx::query("SELECT name, order_types, status, orders_processed, last_seen FROM workers")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<Worker, AppError> {
                let status: String = row.try_get("status")?;
                Ok(Worker {
                    name: row.try_get("name")?,
                    order_types: row.try_get("order_types")?,
                    status: if status == WorkerStatus::Online.as_str() {
                        WorkerStatus::Online
                    } else {
                        WorkerStatus::Offline
                    },
                    orders_processed: row.try_get("orders_processed")?,
                    last_seen: row.try_get("last_seen")?,
                })
            })
            .collect()
    }
}
