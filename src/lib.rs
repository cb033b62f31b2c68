//! DigiCompras API Library
//!
//! Conversational storefront backend: catalog and cart stores, PIX checkout
//! orchestration and order-state reconciliation, with JSON snapshot
//! persistence.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod errors;
pub mod events;
pub mod format;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod notifications;
pub mod persistence;
pub mod services;
pub mod stores;

use std::sync::Arc;

use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::handlers::Dispatcher;
use crate::notifications::Notifier;
use crate::persistence::Snapshots;
use crate::services::{CheckoutService, OrderService, PricingPolicy};
use crate::stores::{CartStore, CatalogStore, OrderLedger, UserRegistry};

// App state definition
pub struct AppState {
    pub config: config::AppConfig,
    pub catalog: Arc<CatalogStore>,
    pub carts: Arc<CartStore>,
    pub users: Arc<UserRegistry>,
    pub orders: Arc<OrderLedger>,
    pub event_sender: EventSender,
    pub checkout: Arc<CheckoutService>,
    pub order_service: Arc<OrderService>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Restores every store from the configured data directory and wires the
    /// services around the given gateway and notifier.
    pub fn initialize(
        config: config::AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        event_sender: EventSender,
    ) -> Result<Self, ServiceError> {
        let snapshots = Arc::new(Snapshots::new(config.data_dir.clone())?);
        let catalog = Arc::new(CatalogStore::load_or_seed(snapshots.clone()));
        let carts = Arc::new(CartStore::load(snapshots.clone()));
        let users = Arc::new(UserRegistry::load(snapshots.clone()));
        let orders = Arc::new(OrderLedger::load(snapshots));

        let checkout = Arc::new(CheckoutService::new(
            catalog.clone(),
            carts.clone(),
            users.clone(),
            orders.clone(),
            gateway,
            event_sender.clone(),
            notifier.clone(),
            config.gateway.payer_email_domain.clone(),
        ));
        let order_service = Arc::new(OrderService::new(
            orders.clone(),
            event_sender.clone(),
            notifier,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            catalog.clone(),
            carts.clone(),
            users.clone(),
            checkout.clone(),
            order_service.clone(),
            PricingPolicy::from_config(&config),
            event_sender.clone(),
            config.admin_chat_id,
        ));

        Ok(Self {
            config,
            catalog,
            carts,
            users,
            orders,
            event_sender,
            checkout,
            order_service,
            dispatcher,
        })
    }
}
