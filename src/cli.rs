use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "restaurant-system", version, about = "Restaurant order-processing pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Mode,

    #[arg(long, global = true, default_value = "config.yaml")]
    pub config_path: std::path::PathBuf,

    #[arg(long, global = true, default_value = "INFO")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Accepts new orders over HTTP and publishes them to the broker.
    #[command(name = "order-service")]
    OrderService(OrderServiceArgs),
    /// Consumes one or more per-type queues and simulates preparation.
    #[command(name = "kitchen-worker")]
    KitchenWorker(KitchenWorkerArgs),
    /// Serves read-only order status/history/worker-liveness queries.
    #[command(name = "tracking-service")]
    TrackingService(TrackingServiceArgs),
    /// Subscribes to the notifications fanout and logs status updates.
    #[command(name = "notification-subscriber")]
    NotificationSubscriber,
}

#[derive(Debug, Args)]
pub struct OrderServiceArgs {
    #[arg(long, default_value_t = 3000, value_parser = clap::value_parser!(u16).range(1024..=65535))]
    pub port: u16,

    #[arg(long = "max-concurrent", default_value_t = 50, value_parser = clap::value_parser!(u32).range(0..=1000))]
    pub max_concurrent: u32,
}

#[derive(Debug, Args)]
pub struct KitchenWorkerArgs {
    #[arg(long = "worker-name")]
    pub worker_name: String,

    /// Comma-separated subset of dine_in,takeout,delivery. Empty means all three.
    #[arg(long = "order-types", default_value = "")]
    pub order_types: String,

    #[arg(long = "heartbeat-interval", default_value_t = 30)]
    pub heartbeat_interval: u64,

    #[arg(long = "prefetch", default_value_t = 1)]
    pub prefetch: u16,
}

#[derive(Debug, Args)]
pub struct TrackingServiceArgs {
    #[arg(long, default_value_t = 3002, value_parser = clap::value_parser!(u16).range(1024..=65535))]
    pub port: u16,
}
