use lapin::options::{QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};

use crate::config::RabbitmqConfig;
use crate::domain::types::OrderType;
use crate::error::AppError;

pub const DLX_EXCHANGE: &str = "dlx_exchange";

/// Declares the full broker topology idempotently: the orders topic
/// exchange, a durable per-type queue (with a dead-letter route) bound to
/// it, a matching DLQ bound to the dead-letter exchange, and the
/// notifications fanout exchange. Safe to call from both producer and
/// consumer processes at startup.
pub async fn declare_topology(channel: &Channel, config: &RabbitmqConfig) -> Result<(), AppError> {
    channel
        .exchange_declare(
            &config.order_exchange,
            ExchangeKind::Topic,
            lapin::options::ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .exchange_declare(
            &config.notifications_exchange,
            ExchangeKind::Fanout,
            lapin::options::ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .exchange_declare(
            DLX_EXCHANGE,
            ExchangeKind::Topic,
            lapin::options::ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    for order_type in OrderType::ALL {
        declare_type_queue(channel, config, order_type).await?;
    }

    Ok(())
}

async fn declare_type_queue(
    channel: &Channel,
    config: &RabbitmqConfig,
    order_type: OrderType,
) -> Result<(), AppError> {
    let mut args = FieldTable::default();
    args.insert("x-dead-letter-exchange".into(), DLX_EXCHANGE.into());
    args.insert(
        "x-dead-letter-routing-key".into(),
        order_type.dlq_name().into(),
    );

    channel
        .queue_declare(
            &order_type.queue_name(),
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            args,
        )
        .await?;

    channel
        .queue_bind(
            &order_type.queue_name(),
            &config.order_exchange,
            &order_type.binding_key(),
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(
            &order_type.dlq_name(),
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            &order_type.dlq_name(),
            DLX_EXCHANGE,
            &order_type.dlq_name(),
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    Ok(())
}
