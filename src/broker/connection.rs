use lapin::{Connection, ConnectionProperties};

use crate::config::RabbitmqConfig;
use crate::error::AppError;

/// Dials the broker, retrying up to `config.reconnect_attempt` times with a
/// fixed `config.reconnect_delay` between attempts. Used both at startup and
/// whenever an adapter notices its connection has closed underneath it.
pub async fn connect_with_retry(config: &RabbitmqConfig) -> Result<Connection, AppError> {
    let props = ConnectionProperties::default()
        .with_executor(tokio_executor_trait::Tokio::current())
        .with_reactor(tokio_reactor_trait::Tokio);

    let mut last_err = None;
    for attempt in 1..=config.reconnect_attempt.max(1) {
        match Connection::connect(&config.amqp_uri(), props.clone()).await {
            Ok(conn) => return Ok(conn),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "broker connection attempt failed");
                last_err = Some(err);
                tokio::time::sleep(config.reconnect_delay_duration()).await;
            }
        }
    }

    Err(AppError::RecoverableTransport(anyhow::anyhow!(
        "exhausted {} connection attempts: {:?}",
        config.reconnect_attempt,
        last_err
    )))
}

/// Whether the connection is still usable. `lapin` surfaces closure
/// asynchronously; adapters poll this before reusing a cached connection.
pub fn is_connection_closed(conn: &Connection) -> bool {
    conn.status().state() == lapin::ConnectionState::Closed
}

