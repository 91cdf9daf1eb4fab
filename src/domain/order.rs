use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{OrderStatus, OrderType, Priority};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemDraft {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// What a caller supplies to create an order; derived fields (number,
/// priority, total, status) are computed by the order service, never by
/// the caller.
#[derive(Debug, Clone)]
pub struct CreateOrderDraft {
    pub customer_name: String,
    pub order_type: OrderType,
    pub table_number: Option<String>,
    pub delivery_address: Option<String>,
    pub items: Vec<OrderItemDraft>,
}

impl CreateOrderDraft {
    pub fn total_amount(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub number: String,
    pub customer_name: String,
    pub order_type: OrderType,
    pub table_number: Option<String>,
    pub delivery_address: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub priority: Priority,
    pub status: OrderStatus,
    pub processed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusLogEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub changed_by: String,
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Formats the externally visible order number, widening the zero-padded
/// sequence from three to four to five digits as the per-day counter grows.
pub fn format_order_number(date: NaiveDate, sequence: i64) -> String {
    let width = if sequence < 1_000 {
        3
    } else if sequence < 10_000 {
        4
    } else {
        5
    };
    format!(
        "ORD_{}_{:0width$}",
        date.format("%Y%m%d"),
        sequence,
        width = width
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn number_widens_past_three_digits() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        assert_eq!(format_order_number(date, 1), "ORD_20260728_001");
        assert_eq!(format_order_number(date, 999), "ORD_20260728_999");
        assert_eq!(format_order_number(date, 1000), "ORD_20260728_1000");
        assert_eq!(format_order_number(date, 9999), "ORD_20260728_9999");
        assert_eq!(format_order_number(date, 10000), "ORD_20260728_10000");
    }

    #[test]
    fn total_amount_sums_quantity_times_price() {
        let draft = CreateOrderDraft {
            customer_name: "Jamie".into(),
            order_type: OrderType::Takeout,
            table_number: None,
            delivery_address: None,
            items: vec![
                OrderItemDraft {
                    name: "Burger".into(),
                    quantity: 2,
                    price: dec!(9.50),
                },
                OrderItemDraft {
                    name: "Fries".into(),
                    quantity: 1,
                    price: dec!(3.25),
                },
            ],
        };
        assert_eq!(draft.total_amount(), dec!(22.25));
    }

    #[test]
    fn priority_tiers_match_total_bands() {
        assert_eq!(Priority::from_total(dec!(10.00)).0, 1);
        assert_eq!(Priority::from_total(dec!(50.00)).0, 1);
        assert_eq!(Priority::from_total(dec!(50.01)).0, 5);
        assert_eq!(Priority::from_total(dec!(100.00)).0, 5);
        assert_eq!(Priority::from_total(dec!(100.01)).0, 10);
    }
}
