use std::sync::Arc;

use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Order, OrderStatus, UserId};
use crate::notifications::{notify_or_log, Notifier, OutboundMessage};
use crate::stores::OrderLedger;

/// Order history for buyers and fulfillment actions for the administrator.
pub struct OrderService {
    orders: Arc<OrderLedger>,
    events: EventSender,
    notifier: Arc<dyn Notifier>,
}

impl OrderService {
    pub fn new(orders: Arc<OrderLedger>, events: EventSender, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            orders,
            events,
            notifier,
        }
    }

    /// A buyer's orders, newest first.
    pub fn list_for_user(&self, user_id: UserId) -> Vec<Order> {
        self.orders.list_for_user(user_id)
    }

    /// One order, visible only to its owner.
    pub fn order_details(&self, user_id: UserId, order_id: &str) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;
        if order.user_id != user_id {
            return Err(ServiceError::NotOwner);
        }
        Ok(order)
    }

    /// Orders the administrator still has to act on, newest first.
    pub fn list_open(&self) -> Vec<Order> {
        self.orders.list_open()
    }

    /// Marks a paid order as delivered and tells the buyer. Fails with
    /// `InvalidTransition` for anything not paid.
    #[instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: &str) -> Result<Order, ServiceError> {
        let order = self.orders.set_status(order_id, OrderStatus::Delivered)?;
        self.events
            .send_or_log(Event::OrderDelivered(order_id.to_string()))
            .await;
        notify_or_log(
            self.notifier.as_ref(),
            OutboundMessage::order_delivered(&order),
        )
        .await;
        info!(%order_id, "order marked as delivered");
        Ok(order)
    }

    /// Cancels a pending order and tells the buyer. Paid orders cannot be
    /// cancelled; they move to delivered or stay paid.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<Order, ServiceError> {
        let order = self.orders.set_status(order_id, OrderStatus::Cancelled)?;
        self.events
            .send_or_log(Event::OrderCancelled(order_id.to_string()))
            .await;
        notify_or_log(
            self.notifier.as_ref(),
            OutboundMessage::order_cancelled(&order),
        )
        .await;
        info!(%order_id, "order cancelled by admin");
        Ok(order)
    }
}
