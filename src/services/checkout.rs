use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{
    CreateIntentRequest, PayerInfo, PaymentGateway, PaymentIntent, PaymentStatusClass,
};
use crate::models::{CartLineItem, Order, OrderStatus, User, UserId};
use crate::notifications::{notify_or_log, Notifier, OutboundMessage};
use crate::stores::{CartStore, CatalogStore, OrderLedger, UserRegistry};

/// Registration data the conversation collected but may not have committed.
/// Checkout falls back to it so an interrupted registration does not cost a
/// sale.
#[derive(Debug, Clone, Default)]
pub struct SessionProfile {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// A cart that passed every checkout precondition.
#[derive(Debug, Clone)]
pub struct CheckoutReady {
    pub user: User,
    pub items: Vec<CartLineItem>,
    pub total: Decimal,
}

/// A successfully submitted checkout: the order exists, the gateway holds an
/// intent for it, and the cart has been cleared.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub payment_id: String,
    pub qr_code: Option<String>,
    pub total: Decimal,
}

/// Result of reconciling an order against the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Gateway reports the payment approved. `newly_paid` is true only on the
    /// call that performed the pending→paid transition.
    Approved { newly_paid: bool },
    /// Payment still processing; the caller should offer a retry.
    Pending,
    /// No payment found yet under the order's external reference.
    NotIdentified,
    /// Payment rejected or cancelled on the gateway side.
    Rejected,
    /// Gateway reported a status outside the known set; treated as transient.
    Unrecognized(String),
}

/// Coordinates cart, registry, ledger and gateway through checkout and
/// payment reconciliation.
pub struct CheckoutService {
    catalog: Arc<CatalogStore>,
    carts: Arc<CartStore>,
    users: Arc<UserRegistry>,
    orders: Arc<OrderLedger>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
    notifier: Arc<dyn Notifier>,
    payer_email_domain: String,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<CatalogStore>,
        carts: Arc<CartStore>,
        users: Arc<UserRegistry>,
        orders: Arc<OrderLedger>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        notifier: Arc<dyn Notifier>,
        payer_email_domain: String,
    ) -> Self {
        Self {
            catalog,
            carts,
            users,
            orders,
            gateway,
            events,
            notifier,
            payer_email_domain,
        }
    }

    /// Validates the checkout preconditions, strictly in order: user resolved
    /// (with session fallback registration), cart non-empty, every item
    /// complete. Creates nothing.
    #[instrument(skip(self, session))]
    pub async fn begin_checkout(
        &self,
        user_id: UserId,
        session: &SessionProfile,
    ) -> Result<CheckoutReady, ServiceError> {
        let user = self.resolve_user(user_id, session).await?;

        let items = self.carts.get_cart(user_id);
        if items.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let incomplete = self.incomplete_items(&items);
        if !incomplete.is_empty() {
            return Err(ServiceError::IncompleteItems(incomplete));
        }

        let total = items.iter().map(|item| item.price).sum();
        Ok(CheckoutReady { user, items, total })
    }

    /// Runs the full checkout: preconditions, order snapshot, payment intent,
    /// reference persistence, cart clear. The cart is cleared only after the
    /// intent exists; a gateway failure leaves the pending order in the
    /// ledger as evidence and the cart untouched.
    #[instrument(skip(self, session))]
    pub async fn submit_payment(
        &self,
        user_id: UserId,
        session: &SessionProfile,
    ) -> Result<CheckoutReceipt, ServiceError> {
        let ready = self.begin_checkout(user_id, session).await?;

        let order = self.orders.create(user_id, ready.items.clone());
        self.events
            .send_or_log(Event::OrderCreated {
                order_id: order.id.clone(),
                user_id,
            })
            .await;

        let description = match ready.items.as_slice() {
            [single] => format!("{} - {}", order.id, single.name),
            _ => format!("{} - multiple items", order.id),
        };
        let request = CreateIntentRequest {
            amount: ready.total,
            description,
            payer: PayerInfo {
                email: format!("cliente_{}@{}", user_id, self.payer_email_domain),
                first_name: ready.user.name.clone(),
            },
            external_reference: order.id.clone(),
        };

        let intent = match self.gateway.create_intent(request).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "payment intent creation failed, order left pending");
                return Err(e);
            }
        };

        let order = self.orders.set_payment_reference(&order.id, &intent.id)?;
        self.carts.clear(user_id);
        self.events
            .send_or_log(Event::PaymentIntentCreated {
                order_id: order.id.clone(),
                payment_id: intent.id.clone(),
            })
            .await;
        self.events.send_or_log(Event::CartCleared(user_id)).await;

        notify_or_log(
            self.notifier.as_ref(),
            OutboundMessage::sale_awaiting_payment(&order, &ready.user),
        )
        .await;

        info!(order_id = %order.id, payment_id = %intent.id, "checkout submitted");
        Ok(CheckoutReceipt {
            total: order.total(),
            order,
            payment_id: intent.id,
            qr_code: intent.qr_code,
        })
    }

    /// Re-checks an order's payment against the gateway and moves local state
    /// forward. Idempotent: confirming an already-paid order reports success
    /// without a second transition or a second admin notification.
    #[instrument(skip(self))]
    pub async fn reconcile_payment(
        &self,
        user_id: UserId,
        order_id: &str,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;
        if order.user_id != user_id {
            return Err(ServiceError::NotOwner);
        }

        // Gateway calls happen with no store state held.
        let intent = match &order.payment_reference {
            Some(reference) => self.gateway.get_by_id(reference).await?,
            None => match self.gateway.find_by_external_reference(order_id).await? {
                Some(intent) => {
                    self.orders.set_payment_reference(order_id, &intent.id)?;
                    intent
                }
                None => return Ok(ReconcileOutcome::NotIdentified),
            },
        };

        match intent.status_class() {
            PaymentStatusClass::Approved => self.confirm_paid(&order, &intent).await,
            PaymentStatusClass::Pending => Ok(ReconcileOutcome::Pending),
            PaymentStatusClass::Rejected => {
                if order.status == OrderStatus::Pending {
                    self.orders.set_status(order_id, OrderStatus::Cancelled)?;
                    self.events
                        .send_or_log(Event::OrderCancelled(order_id.to_string()))
                        .await;
                }
                Ok(ReconcileOutcome::Rejected)
            }
            PaymentStatusClass::Other(status) => {
                info!(%order_id, %status, "unrecognized gateway status, treating as transient");
                Ok(ReconcileOutcome::Unrecognized(status))
            }
        }
    }

    async fn confirm_paid(
        &self,
        order: &Order,
        intent: &PaymentIntent,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if order.status != OrderStatus::Pending {
            if order.status == OrderStatus::Cancelled {
                warn!(order_id = %order.id, intent_id = %intent.id, "gateway approved a cancelled order");
            }
            return Ok(ReconcileOutcome::Approved { newly_paid: false });
        }

        let paid = self.orders.set_status(&order.id, OrderStatus::Paid)?;
        self.events
            .send_or_log(Event::OrderPaid(order.id.clone()))
            .await;

        match self.users.get(order.user_id) {
            Some(user) => {
                notify_or_log(
                    self.notifier.as_ref(),
                    OutboundMessage::new_paid_order(&paid, &user),
                )
                .await;
            }
            None => {
                warn!(order_id = %order.id, user_id = order.user_id, "paid order has no registered user, skipping admin notification");
            }
        }

        Ok(ReconcileOutcome::Approved { newly_paid: true })
    }

    async fn resolve_user(
        &self,
        user_id: UserId,
        session: &SessionProfile,
    ) -> Result<User, ServiceError> {
        if let Some(user) = self.users.get(user_id) {
            return Ok(user);
        }
        // Recover an interrupted registration from session data rather than
        // losing the sale.
        if let (Some(name), Some(phone)) = (&session.name, &session.phone) {
            info!(%user_id, "registering user from session data at checkout");
            let user = self.users.register(user_id, name, phone);
            self.events.send_or_log(Event::UserRegistered(user_id)).await;
            return Ok(user);
        }
        Err(ServiceError::NotRegistered)
    }

    /// Names of cart items whose originating product declares required fields
    /// the item's details do not cover, in cart order.
    fn incomplete_items(&self, items: &[CartLineItem]) -> Vec<String> {
        items
            .iter()
            .filter(|item| {
                let Some(product) = self.catalog.find_product_by_name(&item.name) else {
                    // The product drifted out of the catalog; the snapshot in
                    // the cart is all we have, so let it through.
                    return false;
                };
                match &product.required_fields {
                    Some(fields) => fields.iter().any(|field| {
                        item.details
                            .get(field)
                            .map(|value| value.trim().is_empty())
                            .unwrap_or(true)
                    }),
                    None => false,
                }
            })
            .map(|item| item.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::{FailureMode, InMemoryGateway};
    use crate::notifications::Recipient;
    use crate::persistence::Snapshots;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    struct Harness {
        _dir: tempfile::TempDir,
        catalog: Arc<CatalogStore>,
        carts: Arc<CartStore>,
        users: Arc<UserRegistry>,
        orders: Arc<OrderLedger>,
        gateway: Arc<InMemoryGateway>,
        service: CheckoutService,
        outbound: mpsc::Receiver<OutboundMessage>,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = Arc::new(Snapshots::new(dir.path()).unwrap());
        let catalog = Arc::new(CatalogStore::load_or_seed(snapshots.clone()));
        let carts = Arc::new(CartStore::load(snapshots.clone()));
        let users = Arc::new(UserRegistry::load(snapshots.clone()));
        let orders = Arc::new(OrderLedger::load(snapshots));
        let gateway = Arc::new(InMemoryGateway::new());
        let (event_tx, mut event_rx) = mpsc::channel(64);
        tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
        let (outbound_tx, outbound) = mpsc::channel(64);
        let notifier = Arc::new(crate::notifications::ChannelNotifier::new(outbound_tx));

        let service = CheckoutService::new(
            catalog.clone(),
            carts.clone(),
            users.clone(),
            orders.clone(),
            gateway.clone(),
            EventSender::new(event_tx),
            notifier,
            "exemplo.com".to_string(),
        );

        Harness {
            _dir: dir,
            catalog,
            carts,
            users,
            orders,
            gateway,
            service,
            outbound,
        }
    }

    fn complete_app_item() -> CartLineItem {
        let mut details = BTreeMap::new();
        details.insert("MAC".to_string(), "AA:BB:CC:DD".to_string());
        CartLineItem::new("⚡ QUICK PLAYER R$65", dec!(65.00)).with_details(details)
    }

    #[tokio::test]
    async fn unregistered_user_without_session_data_fails() {
        let h = harness();
        h.carts.add_item(1, complete_app_item());

        let err = h
            .service
            .begin_checkout(1, &SessionProfile::default())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotRegistered);
    }

    #[tokio::test]
    async fn session_fallback_registers_and_proceeds() {
        let h = harness();
        h.carts.add_item(1, complete_app_item());

        let session = SessionProfile {
            name: Some("Maria Silva".to_string()),
            phone: Some("11999999999".to_string()),
        };
        let ready = h.service.begin_checkout(1, &session).await.unwrap();
        assert_eq!(ready.user.name, "Maria Silva");
        assert_eq!(h.users.get(1).unwrap().phone, "11999999999");
    }

    #[tokio::test]
    async fn empty_cart_fails_after_user_resolution() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");

        assert_matches!(
            h.service
                .begin_checkout(1, &SessionProfile::default())
                .await
                .unwrap_err(),
            ServiceError::EmptyCart
        );
    }

    #[tokio::test]
    async fn completeness_gate_names_exact_offenders() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.carts.add_item(1, complete_app_item());
        // Missing its MAC and OTP fields.
        h.carts
            .add_item(1, CartLineItem::new("📱 NINJA PLAYER R$65", dec!(65.00)));

        let err = h
            .service
            .begin_checkout(1, &SessionProfile::default())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::IncompleteItems(names) => {
            assert_eq!(names, vec!["📱 NINJA PLAYER R$65".to_string()]);
        });
        // No order was created.
        assert!(h.orders.list_for_user(1).is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_keeps_cart_and_pending_order() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.carts.add_item(1, complete_app_item());
        h.gateway.fail_next_create(FailureMode::Unavailable);

        let err = h
            .service
            .submit_payment(1, &SessionProfile::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        assert_eq!(h.carts.get_cart(1).len(), 1);
        let orders = h.orders.list_for_user(1);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Pending);
        assert!(orders[0].payment_reference.is_none());
    }

    #[tokio::test]
    async fn successful_submit_clears_cart_after_reference_set() {
        let mut h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.carts.add_item(1, complete_app_item());

        let receipt = h
            .service
            .submit_payment(1, &SessionProfile::default())
            .await
            .unwrap();

        assert!(h.carts.get_cart(1).is_empty());
        assert_eq!(
            receipt.order.payment_reference.as_deref(),
            Some(receipt.payment_id.as_str())
        );
        assert_eq!(receipt.order.status, OrderStatus::Pending);
        assert!(receipt.qr_code.is_some());

        let note = h.outbound.recv().await.unwrap();
        assert_eq!(note.recipient, Recipient::Admin);
        assert!(note.text.contains("AGUARDANDO PAGAMENTO"));
    }

    #[tokio::test]
    async fn single_item_description_names_the_item() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.carts.add_item(1, complete_app_item());

        let receipt = h
            .service
            .submit_payment(1, &SessionProfile::default())
            .await
            .unwrap();
        // The in-memory gateway encodes the external reference into the code.
        assert!(receipt
            .qr_code
            .unwrap()
            .contains(&receipt.order.id));
    }

    #[tokio::test]
    async fn reconcile_approved_is_idempotent_with_single_notification() {
        let mut h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.carts.add_item(1, complete_app_item());
        let receipt = h
            .service
            .submit_payment(1, &SessionProfile::default())
            .await
            .unwrap();
        let _awaiting = h.outbound.recv().await.unwrap();
        h.gateway.set_status(&receipt.payment_id, "approved");

        let first = h
            .service
            .reconcile_payment(1, &receipt.order.id)
            .await
            .unwrap();
        assert_eq!(first, ReconcileOutcome::Approved { newly_paid: true });

        let second = h
            .service
            .reconcile_payment(1, &receipt.order.id)
            .await
            .unwrap();
        assert_eq!(second, ReconcileOutcome::Approved { newly_paid: false });

        assert_eq!(
            h.orders.get(&receipt.order.id).unwrap().status,
            OrderStatus::Paid
        );

        // Exactly one paid-order notification.
        let paid_note = h.outbound.recv().await.unwrap();
        assert!(paid_note.text.contains("NOVA VENDA CONFIRMADA"));
        assert!(h.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn reconcile_rejected_cancels_pending_order() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.carts.add_item(1, complete_app_item());
        let receipt = h
            .service
            .submit_payment(1, &SessionProfile::default())
            .await
            .unwrap();
        h.gateway.set_status(&receipt.payment_id, "rejected");

        let outcome = h
            .service
            .reconcile_payment(1, &receipt.order.id)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Rejected);
        assert_eq!(
            h.orders.get(&receipt.order.id).unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn reconcile_pending_mutates_nothing() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.carts.add_item(1, complete_app_item());
        let receipt = h
            .service
            .submit_payment(1, &SessionProfile::default())
            .await
            .unwrap();

        let outcome = h
            .service
            .reconcile_payment(1, &receipt.order.id)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Pending);
        assert_eq!(
            h.orders.get(&receipt.order.id).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn reconcile_unknown_status_is_transient() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.carts.add_item(1, complete_app_item());
        let receipt = h
            .service
            .submit_payment(1, &SessionProfile::default())
            .await
            .unwrap();
        h.gateway.set_status(&receipt.payment_id, "charged_back");

        let outcome = h
            .service
            .reconcile_payment(1, &receipt.order.id)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Unrecognized("charged_back".to_string())
        );
        assert_eq!(
            h.orders.get(&receipt.order.id).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn reconcile_without_reference_searches_by_order_id() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        let order = h.orders.create(1, vec![complete_app_item()]);

        // Nothing on the gateway side yet.
        let outcome = h.service.reconcile_payment(1, &order.id).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NotIdentified);
        assert!(h.orders.get(&order.id).unwrap().payment_reference.is_none());

        // The buyer paid; the gateway knows the intent under our order id.
        h.gateway.seed_intent(
            &order.id,
            PaymentIntent {
                id: "mp-seeded".to_string(),
                status: "approved".to_string(),
                qr_code: None,
            },
        );
        let outcome = h.service.reconcile_payment(1, &order.id).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Approved { newly_paid: true });
        assert_eq!(
            h.orders.get(&order.id).unwrap().payment_reference.as_deref(),
            Some("mp-seeded")
        );
    }

    #[tokio::test]
    async fn reconcile_enforces_ownership() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        h.users.register(2, "José", "11888888888");
        let order = h.orders.create(2, vec![complete_app_item()]);

        let err = h.service.reconcile_payment(1, &order.id).await.unwrap_err();
        assert_matches!(err, ServiceError::NotOwner);
        assert_eq!(h.orders.get(&order.id).unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn reconcile_unknown_order_fails() {
        let h = harness();
        assert_matches!(
            h.service.reconcile_payment(1, "missing1").await.unwrap_err(),
            ServiceError::OrderNotFound(_)
        );
    }

    #[tokio::test]
    async fn drifted_catalog_product_does_not_block_checkout() {
        let h = harness();
        h.users.register(1, "Maria", "11999999999");
        // The item never collected its MAC, but the product is edited out of
        // the catalog before checkout; the cart snapshot is all that remains.
        h.carts
            .add_item(1, CartLineItem::new("⚡ QUICK PLAYER R$65", dec!(65.00)));
        h.catalog.delete_product("ATIVAR APP", 0).unwrap();

        assert!(h
            .service
            .begin_checkout(1, &SessionProfile::default())
            .await
            .is_ok());
    }
}
