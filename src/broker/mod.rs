pub mod connection;
pub mod notification_subscriber;
pub mod order_consumer;
pub mod order_producer;
pub mod topology;
