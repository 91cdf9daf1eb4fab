use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeout,
    Delivery,
}

impl OrderType {
    pub const ALL: [OrderType; 3] = [OrderType::DineIn, OrderType::Takeout, OrderType::Delivery];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine_in",
            OrderType::Takeout => "takeout",
            OrderType::Delivery => "delivery",
        }
    }

    /// Simulated kitchen preparation time for this order type.
    pub fn cook_time(&self) -> std::time::Duration {
        match self {
            OrderType::DineIn => std::time::Duration::from_secs(8),
            OrderType::Takeout => std::time::Duration::from_secs(10),
            OrderType::Delivery => std::time::Duration::from_secs(12),
        }
    }

    pub fn queue_name(&self) -> String {
        format!("kitchen_{}_queue", self.as_str())
    }

    pub fn dlq_name(&self) -> String {
        format!("dlq.{}", self.queue_name())
    }

    pub fn binding_key(&self) -> String {
        format!("kitchen.{}.*", self.as_str())
    }

    pub fn routing_key(&self, priority: u32) -> String {
        format!("kitchen.{}.{}", self.as_str(), priority)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dine_in" => Ok(OrderType::DineIn),
            "takeout" => Ok(OrderType::Takeout),
            "delivery" => Ok(OrderType::Delivery),
            other => Err(format!("unknown order type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Received,
    Cooking,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Cooking => "cooking",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(OrderStatus::Received),
            "cooking" => Ok(OrderStatus::Cooking),
            "ready" => Ok(OrderStatus::Ready),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(pub u32);

impl Priority {
    /// Derives order priority from the total amount, per the three-tier
    /// schedule: > 100 is highest, 50..=100 is medium, everything else low.
    pub fn from_total(total: rust_decimal::Decimal) -> Priority {
        use rust_decimal_macros::dec;
        if total > dec!(100) {
            Priority(10)
        } else if total > dec!(50) {
            Priority(5)
        } else {
            Priority(1)
        }
    }
}
