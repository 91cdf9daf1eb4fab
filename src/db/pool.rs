use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::PostgresConfig;
use crate::error::AppError;

/// Bootstraps the shared connection pool and runs pending migrations. Every
/// mode calls this once at startup before touching `OrderRepository` or
/// `WorkerRepository`.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_open_conn)
        .idle_timeout(config.max_idle_duration())
        .connect(&config.connection_string())
        .await
        .map_err(|e| AppError::Fatal(anyhow::anyhow!("connecting to postgres: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Fatal(anyhow::anyhow!("running migrations: {e}")))?;

    Ok(pool)
}
