use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{OrderStatus, OrderType, Priority};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedOrderItem {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// Message carried on the orders topic exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedOrder {
    pub order_number: String,
    pub customer_name: String,
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    pub items: Vec<PublishedOrderItem>,
    pub total_amount: Decimal,
    pub priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Message fanned out to notification subscribers on every status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub order_number: String,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub changed_by: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Priority {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}
