//! Outbound push messages to the administrator and to buyers.
//!
//! Notifications are fire-and-forget: a failed delivery is logged and never
//! fails or rolls back the operation that triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::format::format_order_details;
use crate::models::{Order, User, UserId};

/// Where a push message goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Admin,
    User(UserId),
}

/// A message for the delivery layer to push outside the current conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: Recipient,
    pub text: String,
}

impl OutboundMessage {
    /// Admin heads-up that a checkout produced a payment intent.
    pub fn sale_awaiting_payment(order: &Order, user: &User) -> Self {
        Self {
            recipient: Recipient::Admin,
            text: format!(
                "🕐 *VENDA AGUARDANDO PAGAMENTO*\n\n👤 *Cliente:* {}\n📱 *Telefone:* {}\n\n{}",
                user.name,
                user.phone,
                format_order_details(order, true),
            ),
        }
    }

    /// Admin notification that a payment was confirmed. Fired exactly once
    /// per order, on the pending→paid transition.
    pub fn new_paid_order(order: &Order, user: &User) -> Self {
        Self {
            recipient: Recipient::Admin,
            text: format!(
                "🔔 *NOVA VENDA CONFIRMADA!* 🔔\n\n👤 *Cliente:* {}\n📱 *Telefone:* {}\n\n{}\n\n✅ Pagamento confirmado e processado",
                user.name,
                user.phone,
                format_order_details(order, true),
            ),
        }
    }

    pub fn order_delivered(order: &Order) -> Self {
        Self {
            recipient: Recipient::User(order.user_id),
            text: format!(
                "🎉 *Seu pedido foi entregue!* 🎉\n\nSeu pedido #{} foi marcado como entregue.\nObrigado por comprar conosco!",
                order.id
            ),
        }
    }

    pub fn order_cancelled(order: &Order) -> Self {
        Self {
            recipient: Recipient::User(order.user_id),
            text: format!(
                "❌ *Seu pedido foi cancelado* ❌\n\nSeu pedido #{} foi cancelado.\nEntre em contato com o suporte para mais informações.",
                order.id
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    ChannelClosed,
}

/// Push seam toward the delivery layer.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: OutboundMessage) -> Result<(), NotifyError>;
}

/// Forwards messages to an in-process channel the delivery adapter drains.
pub struct ChannelNotifier {
    sender: mpsc::Sender<OutboundMessage>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::Sender<OutboundMessage>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, message: OutboundMessage) -> Result<(), NotifyError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| NotifyError::ChannelClosed)
    }
}

/// Swallows every message. Used when no admin chat is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _message: OutboundMessage) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Sends a notification, logging instead of propagating failure.
pub async fn notify_or_log(notifier: &dyn Notifier, message: OutboundMessage) {
    let recipient = message.recipient.clone();
    if let Err(e) = notifier.notify(message).await {
        warn!(?recipient, error = %e, "dropping outbound notification");
    }
}
