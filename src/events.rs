use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::UserId;

/// Events emitted by stores and services as side effects complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // User events
    UserRegistered(UserId),

    // Cart events
    CartItemAdded { user_id: UserId, item_name: String },
    CartCleared(UserId),

    // Order events
    OrderCreated { order_id: String, user_id: UserId },
    PaymentIntentCreated { order_id: String, payment_id: String },
    OrderPaid(String),
    OrderDelivered(String),
    OrderCancelled(String),

    // Catalog events
    CategoryAdded(String),
    CategoryDeleted(String),
    ProductAdded { category: String, name: String },
    ProductUpdated { category: String, name: String },
    ProductDeleted { category: String, name: String },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing if the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("dropping event: {}", e);
        }
    }
}

/// Consumes events from the channel and logs them. The loop ends when every
/// sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPaid(order_id) => {
                info!(%order_id, "order confirmed as paid");
            }
            Event::PaymentIntentCreated { order_id, payment_id } => {
                info!(%order_id, %payment_id, "payment intent attached to order");
            }
            Event::OrderCancelled(order_id) => {
                info!(%order_id, "order cancelled");
            }
            other => {
                info!("event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::OrderPaid("a1b2c3d4".to_string()))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            Event::OrderPaid(id) => assert_eq!(id, "a1b2c3d4"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or return an error to the caller.
        sender.send_or_log(Event::CartCleared(1)).await;
    }
}
