//! Integration tests for the checkout → payment → reconciliation flow.
//!
//! Covers the invariants the orchestrator guarantees:
//! - completeness gate names the exact offending items and creates no order
//! - a gateway failure never costs the user their cart
//! - the cart is cleared only after a payment reference exists
//! - payment confirmation is idempotent, with exactly one admin notification
//! - ownership is enforced before anything mutates

mod common;

use common::TestApp;

use digicompras_api::gateway::memory::FailureMode;
use digicompras_api::models::{CartLineItem, OrderStatus};
use digicompras_api::notifications::Recipient;
use digicompras_api::services::{ReconcileOutcome, SessionProfile};
use rust_decimal_macros::dec;

#[tokio::test]
async fn full_checkout_and_confirmation_flow() {
    let mut app = TestApp::new();
    app.register(1, "Maria Silva", "11999999999");
    app.fill_cart(1);

    // Checkout: order created, intent attached, cart cleared.
    let receipt = app
        .state
        .checkout
        .submit_payment(1, &SessionProfile::default())
        .await
        .expect("checkout should succeed");
    assert_eq!(receipt.order.status, OrderStatus::Pending);
    assert_eq!(receipt.total, dec!(65.00));
    assert!(app.state.carts.get_cart(1).is_empty());

    let awaiting = app.outbound.recv().await.expect("awaiting-payment note");
    assert_eq!(awaiting.recipient, Recipient::Admin);

    // Buyer pays; first reconcile transitions, second is a no-op.
    app.gateway.set_status(&receipt.payment_id, "approved");
    let first = app
        .state
        .checkout
        .reconcile_payment(1, &receipt.order.id)
        .await
        .unwrap();
    assert_eq!(first, ReconcileOutcome::Approved { newly_paid: true });

    let second = app
        .state
        .checkout
        .reconcile_payment(1, &receipt.order.id)
        .await
        .unwrap();
    assert_eq!(second, ReconcileOutcome::Approved { newly_paid: false });

    let paid_note = app.outbound.recv().await.expect("paid-order note");
    assert!(paid_note.text.contains("NOVA VENDA CONFIRMADA"));
    assert!(
        app.outbound.try_recv().is_err(),
        "no duplicate admin notification"
    );

    // Admin fulfills; the buyer is told.
    let delivered = app
        .state
        .order_service
        .mark_delivered(&receipt.order.id)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    let note = app.outbound.recv().await.unwrap();
    assert_eq!(note.recipient, Recipient::User(1));
}

#[tokio::test]
async fn completeness_gate_blocks_and_creates_nothing() {
    let app = TestApp::new();
    app.register(2, "José Souza", "11888887777");
    // One complete item, one missing both of its fields.
    app.fill_cart(2);
    app.state
        .carts
        .add_item(2, CartLineItem::new("📱 NINJA PLAYER R$65", dec!(65.00)));

    let err = app
        .state
        .checkout
        .begin_checkout(2, &SessionProfile::default())
        .await
        .unwrap_err();
    match err {
        digicompras_api::errors::ServiceError::IncompleteItems(names) => {
            assert_eq!(names, vec!["📱 NINJA PLAYER R$65".to_string()]);
        }
        other => panic!("expected IncompleteItems, got {other:?}"),
    }
    assert!(app.state.orders.list_for_user(2).is_empty());
    assert_eq!(app.state.carts.get_cart(2).len(), 2);
}

#[tokio::test]
async fn gateway_outage_preserves_cart_and_leaves_evidence() {
    let app = TestApp::new();
    app.register(3, "Ana Costa", "11777776666");
    app.fill_cart(3);
    app.gateway.fail_next_create(FailureMode::Unavailable);

    let err = app
        .state
        .checkout
        .submit_payment(3, &SessionProfile::default())
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    // Cart intact, stuck order diagnosable.
    assert_eq!(app.state.carts.get_cart(3).len(), 1);
    let orders = app.state.orders.list_for_user(3);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert!(orders[0].payment_reference.is_none());

    // Retry succeeds and clears the cart.
    let receipt = app
        .state
        .checkout
        .submit_payment(3, &SessionProfile::default())
        .await
        .unwrap();
    assert!(app.state.carts.get_cart(3).is_empty());
    assert!(receipt.order.payment_reference.is_some());
}

#[tokio::test]
async fn rejected_payment_cancels_the_order() {
    let app = TestApp::new();
    app.register(4, "Rui Lima", "11666665555");
    app.fill_cart(4);

    let receipt = app
        .state
        .checkout
        .submit_payment(4, &SessionProfile::default())
        .await
        .unwrap();
    app.gateway.set_status(&receipt.payment_id, "cancelled");

    let outcome = app
        .state
        .checkout
        .reconcile_payment(4, &receipt.order.id)
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Rejected);
    assert_eq!(
        app.state.orders.get(&receipt.order.id).unwrap().status,
        OrderStatus::Cancelled
    );

    // Terminal: a later approved report cannot resurrect it.
    app.gateway.set_status(&receipt.payment_id, "approved");
    let outcome = app
        .state
        .checkout
        .reconcile_payment(4, &receipt.order.id)
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Approved { newly_paid: false });
    assert_eq!(
        app.state.orders.get(&receipt.order.id).unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn ownership_violation_mutates_nothing() {
    let app = TestApp::new();
    app.register(5, "Dona A", "11555554444");
    app.register(6, "Dono B", "11444443333");
    app.fill_cart(6);

    let receipt = app
        .state
        .checkout
        .submit_payment(6, &SessionProfile::default())
        .await
        .unwrap();
    app.gateway.set_status(&receipt.payment_id, "approved");

    let err = app
        .state
        .checkout
        .reconcile_payment(5, &receipt.order.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        digicompras_api::errors::ServiceError::NotOwner
    ));
    assert_eq!(
        app.state.orders.get(&receipt.order.id).unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn session_profile_recovers_interrupted_registration() {
    let app = TestApp::new();
    app.fill_cart(7);

    let session = SessionProfile {
        name: Some("Carla Dias".to_string()),
        phone: Some("11333332222".to_string()),
    };
    let receipt = app
        .state
        .checkout
        .submit_payment(7, &session)
        .await
        .expect("session fallback should register and proceed");

    assert_eq!(app.state.users.get(7).unwrap().name, "Carla Dias");
    assert_eq!(receipt.order.user_id, 7);
}
