use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Offline,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Online => "online",
            WorkerStatus::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Worker {
    pub name: String,
    pub order_types: String,
    pub status: WorkerStatus,
    pub orders_processed: i64,
    pub last_seen: DateTime<Utc>,
}

impl Worker {
    /// The stored `status` is advisory only. A worker whose process died
    /// without a clean shutdown never flips its own row to offline, so the
    /// reader derives liveness from the heartbeat gap instead.
    pub fn is_online(&self, now: DateTime<Utc>, heartbeat_interval: chrono::Duration) -> bool {
        self.status == WorkerStatus::Online && now - self.last_seen <= heartbeat_interval
    }

    pub fn derived_status(&self, now: DateTime<Utc>, heartbeat_interval: chrono::Duration) -> WorkerStatus {
        if self.is_online(now, heartbeat_interval) {
            WorkerStatus::Online
        } else {
            WorkerStatus::Offline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(status: WorkerStatus, seconds_ago: i64) -> Worker {
        Worker {
            name: "grill-1".into(),
            order_types: "dine_in,takeout".into(),
            status,
            orders_processed: 0,
            last_seen: Utc::now() - chrono::Duration::seconds(seconds_ago),
        }
    }

    #[test]
    fn stale_heartbeat_is_derived_offline_even_if_row_says_online() {
        let w = worker(WorkerStatus::Online, 120);
        let derived = w.derived_status(Utc::now(), chrono::Duration::seconds(30));
        assert_eq!(derived, WorkerStatus::Offline);
    }

    #[test]
    fn fresh_heartbeat_is_online() {
        let w = worker(WorkerStatus::Online, 5);
        let derived = w.derived_status(Utc::now(), chrono::Duration::seconds(30));
        assert_eq!(derived, WorkerStatus::Online);
    }

    #[test]
    fn explicitly_offline_row_stays_offline_regardless_of_last_seen() {
        let w = worker(WorkerStatus::Offline, 1);
        let derived = w.derived_status(Utc::now(), chrono::Duration::seconds(30));
        assert_eq!(derived, WorkerStatus::Offline);
    }
}
