use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{CartLineItem, Order, OrderStatus, UserId};
use crate::persistence::Snapshots;

/// Append-only ledger of orders. Orders own value copies of their line items
/// and are never deleted; the only mutations are attaching a payment
/// reference and moving the status forward.
pub struct OrderLedger {
    orders: DashMap<String, Order>,
    snapshots: Arc<Snapshots>,
}

impl OrderLedger {
    pub fn load(snapshots: Arc<Snapshots>) -> Self {
        let orders = DashMap::new();
        for (order_id, order) in snapshots.load_orders() {
            orders.insert(order_id, order);
        }
        Self { orders, snapshots }
    }

    /// Creates a pending order from a cart snapshot.
    pub fn create(&self, user_id: UserId, items: Vec<CartLineItem>) -> Order {
        let id = new_order_id();
        let order = Order {
            id: id.clone(),
            user_id,
            items,
            status: OrderStatus::Pending,
            payment_reference: None,
            created_at: Utc::now(),
        };
        self.orders.insert(id, order.clone());
        self.flush();
        order
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|order| order.clone())
    }

    /// Attaches the gateway's intent id to an order. The reference may be
    /// overwritten by a newer one but never cleared.
    pub fn set_payment_reference(
        &self,
        order_id: &str,
        reference: &str,
    ) -> Result<Order, ServiceError> {
        let mut entry = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;
        entry.payment_reference = Some(reference.to_string());
        let order = entry.clone();
        drop(entry);
        self.flush();
        Ok(order)
    }

    /// Moves an order's status forward. A same-status update is a no-op;
    /// anything outside the pending→paid, pending→cancelled, paid→delivered
    /// relation is rejected without mutating.
    pub fn set_status(&self, order_id: &str, status: OrderStatus) -> Result<Order, ServiceError> {
        let mut entry = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;
        let current = entry.status;
        if current == status {
            return Ok(entry.clone());
        }
        if !current.can_transition(status) {
            return Err(ServiceError::InvalidTransition {
                from: current,
                to: status,
            });
        }
        entry.status = status;
        let order = entry.clone();
        drop(entry);
        info!(%order_id, from = %current, to = %status, "order status updated");
        self.flush();
        Ok(order)
    }

    /// A user's orders, newest first.
    pub fn list_for_user(&self, user_id: UserId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders
    }

    /// Orders an administrator still has to act on (awaiting payment or
    /// awaiting delivery), newest first.
    pub fn list_open(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| matches!(entry.status, OrderStatus::Pending | OrderStatus::Paid))
            .map(|entry| entry.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders
    }

    fn flush(&self) {
        let snapshot: HashMap<String, Order> = self
            .orders
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        if let Err(e) = self.snapshots.save_orders(&snapshot) {
            warn!(error = %e, "order flush failed, keeping in-memory state");
        }
    }
}

fn new_order_id() -> String {
    let mut buffer = Uuid::encode_buffer();
    let simple = Uuid::new_v4().as_simple().encode_lower(&mut buffer);
    simple[..8].to_string()
}
