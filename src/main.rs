mod broker;
mod cli;
mod config;
mod db;
mod domain;
mod error;
mod http;
mod logging;
mod services;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use broker::order_producer::{NotificationProducer, OrderProducer};
use cli::{Cli, Mode};
use config::{Config, MaskedConfig};
use db::order_repo::PgOrderRepository;
use db::worker_repo::PgWorkerRepository;
use error::AppError;
use services::kitchen_worker::KitchenWorkerConfig;
use services::order_service::OrderService;
use services::tracking_service::TrackingService;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let config = match Config::load(&cli.config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(config = %MaskedConfig(&config), "effective configuration loaded");

    let shutdown = root_cancellation_token();

    let result = match cli.mode {
        Mode::OrderService(args) => run_order_service(config, args, shutdown).await,
        Mode::KitchenWorker(args) => run_kitchen_worker(config, args, shutdown).await,
        Mode::TrackingService(args) => run_tracking_service(config, args, shutdown).await,
        Mode::NotificationSubscriber => run_notification_subscriber(config, shutdown).await,
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "unrecoverable runtime error");
        std::process::exit(1);
    }
}

/// A single `CancellationToken` rooted at process startup, cancelled once on
/// SIGINT/SIGTERM. Every mode derives its own shutdown sequencing from this
/// token rather than observing the signal directly.
fn root_cancellation_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            child.cancel();
        }
    });
    token
}

async fn run_order_service(
    config: Config,
    args: cli::OrderServiceArgs,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let pool = db::pool::connect(&config.postgres).await?;
    let order_repo: Arc<dyn db::order_repo::OrderRepository> =
        Arc::new(PgOrderRepository::new(pool));

    let producer = Arc::new(OrderProducer::connect(config.rabbitmq.clone()).await?);

    let service = Arc::new(OrderService::new(
        order_repo,
        producer.clone(),
        args.max_concurrent,
        config.order.sem_wait_duration(),
    ));

    let app = http::order_api::router(service);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .map_err(|e| AppError::Fatal(anyhow::anyhow!("binding port {}: {e}", args.port)))?;
    tracing::info!(port = args.port, "order-service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| AppError::Fatal(anyhow::anyhow!(e)))?;

    shutdown_with_timeout("order-service", async {
        producer.close().await
    })
    .await;

    Ok(())
}

async fn run_kitchen_worker(
    config: Config,
    args: cli::KitchenWorkerArgs,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let worker_config = KitchenWorkerConfig::parse(
        args.worker_name,
        &args.order_types,
        std::time::Duration::from_secs(args.heartbeat_interval),
        args.prefetch,
    )?;

    let pool = db::pool::connect(&config.postgres).await?;
    let order_repo: Arc<dyn db::order_repo::OrderRepository> =
        Arc::new(PgOrderRepository::new(pool.clone()));
    let worker_repo: Arc<dyn db::worker_repo::WorkerRepository> =
        Arc::new(PgWorkerRepository::new(pool));

    let connection = broker::connection::connect_with_retry(&config.rabbitmq).await?;
    let channel = connection.create_channel().await?;
    broker::topology::declare_topology(&channel, &config.rabbitmq).await?;

    let notifications = Arc::new(NotificationProducer::connect(config.rabbitmq.clone()).await?);

    services::kitchen_worker::run(
        worker_config,
        order_repo,
        worker_repo,
        notifications.clone(),
        connection,
        shutdown,
    )
    .await?;

    notifications.close().await.ok();
    Ok(())
}

async fn run_tracking_service(
    config: Config,
    args: cli::TrackingServiceArgs,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let pool = db::pool::connect(&config.postgres).await?;
    let order_repo: Arc<dyn db::order_repo::OrderRepository> =
        Arc::new(PgOrderRepository::new(pool.clone()));
    let worker_repo: Arc<dyn db::worker_repo::WorkerRepository> =
        Arc::new(PgWorkerRepository::new(pool));

    // Liveness is derived from the same heartbeat interval kitchen workers
    // are started with; tracked here independently since readers have no
    // direct handle on any worker process.
    let heartbeat_interval = chrono::Duration::seconds(30);
    let service = Arc::new(TrackingService::new(order_repo, worker_repo, heartbeat_interval));

    let app = http::tracking_api::router(service);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .map_err(|e| AppError::Fatal(anyhow::anyhow!("binding port {}: {e}", args.port)))?;
    tracing::info!(port = args.port, "tracking-service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| AppError::Fatal(anyhow::anyhow!(e)))?;

    Ok(())
}

async fn run_notification_subscriber(
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    if let Some(count) = broker::notification_subscriber::listener_count(&config.rabbitmq).await {
        tracing::info!(listener_count = count, "notifications fanout bindings at startup");
    }

    broker::notification_subscriber::run(config.rabbitmq, shutdown, |update| {
        tracing::info!(
            order_number = %update.order_number,
            old_status = %update.old_status,
            new_status = %update.new_status,
            changed_by = %update.changed_by,
            request_id = update.request_id.as_deref().unwrap_or(""),
            "order status update"
        );
    })
    .await
}

/// Bounds a shutdown step with the 5-10 second timeout every mode's
/// cancellation path is supposed to respect.
async fn shutdown_with_timeout<F, T>(mode: &str, fut: F)
where
    F: std::future::Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(std::time::Duration::from_secs(10), fut).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => tracing::warn!(mode, error = %err, "error while shutting down"),
        Err(_) => tracing::warn!(mode, "shutdown step timed out"),
    }
}
