use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::warn;

use crate::models::{CartLineItem, UserId};
use crate::persistence::Snapshots;

/// Per-user cart lines. Items are already priced when they arrive here; the
/// cart only appends, lists, clears and totals them. Every mutation rewrites
/// the cart snapshot so a crash never loses a cart.
pub struct CartStore {
    carts: DashMap<UserId, Vec<CartLineItem>>,
    snapshots: Arc<Snapshots>,
}

impl CartStore {
    pub fn load(snapshots: Arc<Snapshots>) -> Self {
        let carts = DashMap::new();
        for (user_id, items) in snapshots.load_carts() {
            carts.insert(user_id, items);
        }
        Self { carts, snapshots }
    }

    pub fn add_item(&self, user_id: UserId, item: CartLineItem) {
        self.carts.entry(user_id).or_default().push(item);
        self.flush();
    }

    /// The user's cart in insertion order; empty if they have none.
    pub fn get_cart(&self, user_id: UserId) -> Vec<CartLineItem> {
        self.carts
            .get(&user_id)
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self, user_id: UserId) {
        self.carts.insert(user_id, Vec::new());
        self.flush();
    }

    pub fn total(&self, user_id: UserId) -> Decimal {
        self.carts
            .get(&user_id)
            .map(|items| items.iter().map(|item| item.price).sum())
            .unwrap_or(Decimal::ZERO)
    }

    fn flush(&self) {
        let snapshot: HashMap<UserId, Vec<CartLineItem>> = self
            .carts
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        if let Err(e) = self.snapshots.save_carts(&snapshot) {
            warn!(error = %e, "cart flush failed, keeping in-memory state");
        }
    }
}
