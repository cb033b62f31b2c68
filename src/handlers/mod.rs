//! Delivery-layer contract.
//!
//! The chat framework is an external collaborator: it hands the core an
//! [`Intent`] and renders the [`Reply`] it gets back. Everything
//! conversation-shaped (registration steps, the admin catalog flow) lives
//! behind this boundary in the [`Dispatcher`].

mod dispatch;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::UserId;
use crate::services::AdminInput;

pub use dispatch::Dispatcher;

/// An inbound user action, already parsed by the delivery layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// `/start`: greet, or begin registration.
    Start { user_id: UserId },
    /// Free text; feeds whatever conversation step is active.
    Text { user_id: UserId, text: String },
    ListCategories {
        user_id: UserId,
    },
    ListProducts {
        user_id: UserId,
        category: String,
    },
    AddToCart {
        user_id: UserId,
        category: String,
        product_index: usize,
        /// Credit quantity; present only for quantity purchases.
        #[serde(default)]
        quantity: Option<u32>,
        /// Collected required-field values, keyed by field name.
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    ViewCart {
        user_id: UserId,
    },
    ClearCart {
        user_id: UserId,
    },
    Checkout {
        user_id: UserId,
    },
    CheckPayment {
        user_id: UserId,
        order_id: String,
    },
    ListOrders {
        user_id: UserId,
    },
    OrderDetails {
        user_id: UserId,
        order_id: String,
    },
    // Admin surface
    AdminOrders {
        user_id: UserId,
    },
    MarkDelivered {
        user_id: UserId,
        order_id: String,
    },
    CancelOrder {
        user_id: UserId,
        order_id: String,
    },
    /// Opens the catalog-management conversation.
    AdminCatalog {
        user_id: UserId,
    },
    /// A structured step inside the catalog-management conversation.
    Admin {
        user_id: UserId,
        #[serde(flatten)]
        input: AdminInput,
    },
}

impl Intent {
    pub fn user_id(&self) -> UserId {
        match self {
            Intent::Start { user_id }
            | Intent::Text { user_id, .. }
            | Intent::ListCategories { user_id }
            | Intent::ListProducts { user_id, .. }
            | Intent::AddToCart { user_id, .. }
            | Intent::ViewCart { user_id }
            | Intent::ClearCart { user_id }
            | Intent::Checkout { user_id }
            | Intent::CheckPayment { user_id, .. }
            | Intent::ListOrders { user_id }
            | Intent::OrderDetails { user_id, .. }
            | Intent::AdminOrders { user_id }
            | Intent::MarkDelivered { user_id, .. }
            | Intent::CancelOrder { user_id, .. }
            | Intent::AdminCatalog { user_id }
            | Intent::Admin { user_id, .. } => *user_id,
        }
    }
}

/// What the delivery layer should render back to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    /// Button labels, in display order; empty means plain text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(text: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            text: text.into(),
            choices,
        }
    }
}
