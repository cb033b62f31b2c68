use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Chat identity of a buyer or administrator.
pub type UserId = i64;

/// A catalog entry. Cart lines snapshot name/price/details at add time, so a
/// product edit never reaches back into an already-placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    /// Per-unit details the buyer must supply before checkout (e.g. "MAC").
    #[serde(rename = "fields", default, skip_serializing_if = "Option::is_none")]
    pub required_fields: Option<Vec<String>>,
    /// Whether quantity purchases of this product qualify for the bulk discount.
    #[serde(rename = "discount", default, skip_serializing_if = "std::ops::Not::not")]
    pub discount_eligible: bool,
}

impl Product {
    pub fn new(name: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            name: name.into(),
            unit_price,
            required_fields: None,
            discount_eligible: false,
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = Some(fields);
        self
    }

    pub fn with_discount(mut self) -> Self {
        self.discount_eligible = true;
        self
    }
}

/// A named catalog section with its products in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub products: Vec<Product>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            products: Vec::new(),
        }
    }
}

/// One entry in a cart or order. `price` is already quantity- and
/// discount-resolved; it is never recomputed after the item is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl CartLineItem {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            price,
            details: BTreeMap::new(),
        }
    }

    pub fn with_details(mut self, details: BTreeMap<String, String>) -> Self {
        self.details = details;
        self
    }
}

/// Order lifecycle. Forward-only: an order leaves `Pending` exactly once and
/// never leaves `Delivered` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether `self -> to` is an allowed transition. A same-status update is
    /// treated as a no-op and allowed.
    pub fn can_transition(self, to: Self) -> bool {
        match (self, to) {
            (Self::Pending, Self::Paid) => true,
            (Self::Pending, Self::Cancelled) => true,
            (Self::Paid, Self::Delivered) => true,
            (from, to) if from == to => true,
            _ => false,
        }
    }
}

/// A committed purchase. Owns value copies of its line items; later catalog
/// edits cannot alter the recorded names or prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: UserId,
    pub items: Vec<CartLineItem>,
    pub status: OrderStatus,
    /// Gateway intent id. Absent only while no payment intent exists yet;
    /// once set it never reverts to absent.
    #[serde(rename = "payment_id", default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|item| item.price).sum()
    }
}

/// A registered buyer. Field names on the wire stay `nome`/`telefone` to keep
/// existing `users.json` files readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip)]
    pub id: UserId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "telefone")]
    pub phone: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            phone: phone.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn status_forward_transitions_allowed() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition(OrderStatus::Delivered));
    }

    #[test]
    fn status_skipping_and_backward_transitions_rejected() {
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Delivered));
        assert!(!OrderStatus::Paid.can_transition(OrderStatus::Pending));
        assert!(!OrderStatus::Paid.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::Paid));
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition(OrderStatus::Paid));
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
    }

    #[test]
    fn order_total_sums_line_prices() {
        let order = Order {
            id: "a1b2c3d4".to_string(),
            user_id: 10,
            items: vec![
                CartLineItem::new("QUICK PLAYER", dec!(65.00)),
                CartLineItem::new("SMART ONE", dec!(60.00)),
            ],
            status: OrderStatus::Pending,
            payment_reference: None,
            created_at: Utc::now(),
        };
        assert_eq!(order.total(), dec!(125.00));
    }

    #[test]
    fn user_serializes_with_portuguese_field_names() {
        let user = User::new(42, "Maria Silva", "11999999999");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["nome"], "Maria Silva");
        assert_eq!(json["telefone"], "11999999999");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn order_serializes_payment_reference_as_payment_id() {
        let order = Order {
            id: "deadbeef".to_string(),
            user_id: 7,
            items: vec![],
            status: OrderStatus::Paid,
            payment_reference: Some("123456789".to_string()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["payment_id"], "123456789");
        assert_eq!(json["status"], "paid");
    }

    #[test]
    fn product_wire_format_matches_catalog_layout() {
        let product = Product::new("NINJA PLAYER", dec!(65.00))
            .with_fields(vec!["MAC".to_string(), "CHAVE OTP".to_string()]);
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["fields"][1], "CHAVE OTP");
        assert!(json.get("discount").is_none());

        let credit: Product =
            serde_json::from_str(r#"{"name": "FAST PLAYER", "price": "13.50", "discount": true}"#)
                .unwrap();
        assert!(credit.discount_eligible);
        assert!(credit.required_fields.is_none());
    }
}
