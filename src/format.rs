//! Reply-text formatting for carts and orders.
//!
//! The bot speaks Portuguese to its users; everything user-visible is built
//! here so services and notification builders share one voice.

use crate::models::{CartLineItem, Order, OrderStatus};

pub fn status_marker(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "⏳",
        OrderStatus::Paid => "💰",
        OrderStatus::Delivered => "✅",
        OrderStatus::Cancelled => "❌",
    }
}

/// Human status label, uppercase like the original bot displayed it.
pub fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "PENDENTE",
        OrderStatus::Paid => "PAGO",
        OrderStatus::Delivered => "ENTREGUE",
        OrderStatus::Cancelled => "CANCELADO",
    }
}

pub fn format_cart_message(items: &[CartLineItem]) -> String {
    if items.is_empty() {
        return "Seu carrinho está vazio.".to_string();
    }

    let mut message = String::from("🛒 *Seu Carrinho:*\n\n");
    for (i, item) in items.iter().enumerate() {
        message.push_str(&format!("{}. {} - R${:.2}", i + 1, item.name, item.price));
        for (key, value) in &item.details {
            message.push_str(&format!("\n  • {key}: {value}"));
        }
        message.push_str("\n\n");
    }

    let total: rust_decimal::Decimal = items.iter().map(|item| item.price).sum();
    message.push_str(&format!("\n💰 *Total:* R${total:.2}"));
    message
}

pub fn format_order_details(order: &Order, include_items: bool) -> String {
    let mut message = format!(
        "🧾 *Pedido #{}*\n📊 *Status:* {} {}\n",
        order.id,
        status_marker(order.status),
        status_label(order.status),
    );

    if let Some(reference) = &order.payment_reference {
        message.push_str(&format!("💳 *Pagamento ID:* {reference}\n"));
    }

    if include_items && !order.items.is_empty() {
        message.push_str("\n📦 *Itens:*\n");
        for (i, item) in order.items.iter().enumerate() {
            message.push_str(&format!("{}. {} - R${:.2}", i + 1, item.name, item.price));
            for (key, value) in &item.details {
                message.push_str(&format!("\n  • {key}: {value}"));
            }
            message.push('\n');
        }
        message.push_str(&format!("\n💰 *Total:* R${:.2}", order.total()));
    }

    message
}
