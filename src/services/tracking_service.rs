use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::order_repo::OrderRepository;
use crate::db::worker_repo::WorkerRepository;
use crate::domain::order::Order;
use crate::domain::types::OrderStatus;
use crate::domain::worker::Worker;
use crate::error::AppError;

pub struct HistoryEntry {
    pub status: OrderStatus,
    pub changed_by: String,
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Read-only query surface: current order status, full status history, and
/// the liveness-adjusted worker roster.
pub struct TrackingService {
    order_repo: Arc<dyn OrderRepository>,
    worker_repo: Arc<dyn WorkerRepository>,
    heartbeat_interval: chrono::Duration,
}

impl TrackingService {
    pub fn new(
        order_repo: Arc<dyn OrderRepository>,
        worker_repo: Arc<dyn WorkerRepository>,
        heartbeat_interval: chrono::Duration,
    ) -> Self {
        Self {
            order_repo,
            worker_repo,
            heartbeat_interval,
        }
    }

    pub async fn get_status(&self, order_number: &str) -> Result<Order, AppError> {
        self.order_repo.get_by_number(order_number).await
    }

    pub async fn get_history(&self, order_number: &str) -> Result<Vec<HistoryEntry>, AppError> {
        let rows = self.order_repo.history(order_number).await?;
        Ok(rows
            .into_iter()
            .map(|(status, changed_by, notes, changed_at)| HistoryEntry {
                status,
                changed_by,
                notes,
                changed_at,
            })
            .collect())
    }

    /// Returns every worker with its `status` overridden by the
    /// heartbeat-derived liveness check; the stored column is advisory.
    pub async fn list_workers(&self) -> Result<Vec<Worker>, AppError> {
        let workers = self.worker_repo.list().await?;
        if workers.is_empty() {
            return Err(AppError::WorkerNotFound("*".into()));
        }
        let now = Utc::now();
        Ok(workers
            .into_iter()
            .map(|mut worker| {
                worker.status = worker.derived_status(now, self.heartbeat_interval);
                worker
            })
            .collect())
    }
}
