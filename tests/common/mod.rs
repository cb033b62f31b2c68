#![allow(dead_code)] // not every test binary uses every helper

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use digicompras_api::config::AppConfig;
use digicompras_api::events::EventSender;
use digicompras_api::gateway::InMemoryGateway;
use digicompras_api::handlers::Intent;
use digicompras_api::models::{CartLineItem, UserId};
use digicompras_api::notifications::{ChannelNotifier, OutboundMessage};
use digicompras_api::AppState;

/// Helper harness wiring a full application state over a temporary data
/// directory and the in-memory gateway.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<InMemoryGateway>,
    pub outbound: mpsc::Receiver<OutboundMessage>,
    _dir: tempfile::TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh store state.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut cfg = AppConfig::new(dir.path().to_string_lossy().to_string());
        cfg.admin_chat_id = 999;

        let (event_tx, mut event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
        let (outbound_tx, outbound) = mpsc::channel(256);

        let gateway = Arc::new(InMemoryGateway::new());
        let state = AppState::initialize(
            cfg,
            gateway.clone(),
            Arc::new(ChannelNotifier::new(outbound_tx)),
            EventSender::new(event_tx),
        )
        .expect("app state");

        Self {
            state,
            gateway,
            outbound,
            _dir: dir,
            _event_task: event_task,
        }
    }

    pub fn data_dir(&self) -> &std::path::Path {
        self._dir.path()
    }

    pub fn register(&self, user_id: UserId, name: &str, phone: &str) {
        self.state.users.register(user_id, name, phone);
    }

    /// Puts one complete, field-collected app product in the user's cart.
    pub fn fill_cart(&self, user_id: UserId) {
        let mut details = BTreeMap::new();
        details.insert("MAC".to_string(), "AA:BB:CC:DD:EE:FF".to_string());
        self.state.carts.add_item(
            user_id,
            CartLineItem::new("⚡ QUICK PLAYER R$65", dec!(65.00)).with_details(details),
        );
    }

    pub async fn handle(&self, intent: Intent) -> digicompras_api::handlers::Reply {
        self.state.dispatcher.handle(intent).await
    }
}
