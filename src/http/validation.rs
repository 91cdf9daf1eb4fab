use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::order::{CreateOrderDraft, OrderItemDraft};
use crate::domain::types::OrderType;

static CUSTOMER_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z\s\-']+$").expect("valid regex"));

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub order_type: String,
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub table_number: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
}

/// Per-field validation errors, keyed the way the 422 envelope serializes
/// them: `{field: message}`.
pub type FieldErrors = HashMap<String, String>;

/// Validates a raw HTTP request body into a `CreateOrderDraft`, enforcing
/// every constraint in the spec's "Validation (pre-core)" section before the
/// core ever sees the draft. Returns every violation found, not just the
/// first, so the 422 body can report them all at once.
pub fn validate_create_order(req: CreateOrderRequest) -> Result<CreateOrderDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    if req.customer_name.is_empty() || req.customer_name.chars().count() > 100 {
        errors.insert(
            "customer_name".into(),
            "must be 1-100 characters".into(),
        );
    } else if !CUSTOMER_NAME_PATTERN.is_match(&req.customer_name) {
        errors.insert(
            "customer_name".into(),
            "must contain only letters, spaces, hyphens and apostrophes".into(),
        );
    }

    let order_type: Option<OrderType> = match req.order_type.parse() {
        Ok(t) => Some(t),
        Err(_) => {
            errors.insert(
                "order_type".into(),
                "must be one of dine_in, takeout, delivery".into(),
            );
            None
        }
    };

    if req.items.is_empty() || req.items.len() > 20 {
        errors.insert("items".into(), "must contain 1-20 items".into());
    }
    for (idx, item) in req.items.iter().enumerate() {
        if item.name.is_empty() || item.name.chars().count() > 50 {
            errors.insert(format!("items[{idx}].name"), "must be 1-50 characters".into());
        }
        if item.quantity == 0 || item.quantity > 10 {
            errors.insert(format!("items[{idx}].quantity"), "must be between 1 and 10".into());
        }
        if item.price < Decimal::new(1, 2) || item.price > Decimal::new(99999, 2) {
            errors.insert(format!("items[{idx}].price"), "must be between 0.01 and 999.99".into());
        }
    }

    if let Some(order_type) = order_type {
        validate_conditional_fields(order_type, &req, &mut errors);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(CreateOrderDraft {
        customer_name: req.customer_name,
        order_type: order_type.expect("validated above"),
        table_number: req.table_number,
        delivery_address: req.delivery_address,
        items: req
            .items
            .into_iter()
            .map(|item| OrderItemDraft {
                name: item.name,
                quantity: item.quantity,
                price: item.price,
            })
            .collect(),
    })
}

fn validate_conditional_fields(order_type: OrderType, req: &CreateOrderRequest, errors: &mut FieldErrors) {
    match order_type {
        OrderType::DineIn => {
            match &req.table_number {
                Some(table) if !table.is_empty() && table.chars().count() <= 100 => {}
                Some(_) => {
                    errors.insert("table_number".into(), "must be 1-100 characters".into());
                }
                None => {
                    errors.insert("table_number".into(), "required".into());
                }
            }
            if req.delivery_address.is_some() {
                errors.insert(
                    "delivery_address".into(),
                    "must not be present".into(),
                );
            }
        }
        OrderType::Delivery => {
            match &req.delivery_address {
                Some(addr) if addr.chars().count() >= 10 => {}
                Some(_) => {
                    errors.insert(
                        "delivery_address".into(),
                        "must be at least 10 characters".into(),
                    );
                }
                None => {
                    errors.insert("delivery_address".into(), "required".into());
                }
            }
            if req.table_number.is_some() {
                errors.insert("table_number".into(), "must not be present".into());
            }
        }
        OrderType::Takeout => {
            if req.table_number.is_some() {
                errors.insert("table_number".into(), "must not be present".into());
            }
            if req.delivery_address.is_some() {
                errors.insert(
                    "delivery_address".into(),
                    "must not be present".into(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: "John Doe".into(),
            order_type: "delivery".into(),
            items: vec![OrderItemRequest {
                name: "Pizza".into(),
                quantity: 2,
                price: dec!(15.99),
            }],
            table_number: None,
            delivery_address: Some("123 Main Street".into()),
        }
    }

    #[test]
    fn happy_path_delivery_order_validates() {
        let draft = validate_create_order(base_request()).unwrap();
        assert_eq!(draft.total_amount(), dec!(31.98));
    }

    #[test]
    fn dine_in_without_table_number_reports_required_and_unexpected_address() {
        let mut req = base_request();
        req.order_type = "dine_in".into();
        req.delivery_address = Some("X".into());
        req.table_number = None;
        let errors = validate_create_order(req).unwrap_err();
        assert_eq!(errors.get("table_number").map(String::as_str), Some("required"));
        assert_eq!(
            errors.get("delivery_address").map(String::as_str),
            Some("must not be present")
        );
    }

    #[test]
    fn takeout_rejects_both_address_fields() {
        let mut req = base_request();
        req.order_type = "takeout".into();
        req.table_number = Some("5".into());
        let errors = validate_create_order(req).unwrap_err();
        assert!(errors.contains_key("table_number"));
        assert!(errors.contains_key("delivery_address"));
    }

    #[test]
    fn customer_name_rejects_digits() {
        let mut req = base_request();
        req.customer_name = "John123".into();
        let errors = validate_create_order(req).unwrap_err();
        assert!(errors.contains_key("customer_name"));
    }

    #[test]
    fn item_count_bounds_are_enforced() {
        let mut req = base_request();
        req.items = Vec::new();
        let errors = validate_create_order(req).unwrap_err();
        assert!(errors.contains_key("items"));
    }

    #[test]
    fn item_price_out_of_range_is_reported() {
        let mut req = base_request();
        req.items[0].price = dec!(1000.00);
        let errors = validate_create_order(req).unwrap_err();
        assert!(errors.contains_key("items[0].price"));
    }
}
