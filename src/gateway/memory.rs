use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::errors::ServiceError;

use super::{CreateIntentRequest, PaymentGateway, PaymentIntent};

/// How the next `create_intent` call should fail, if at all.
#[derive(Debug, Clone, Copy)]
pub enum FailureMode {
    Unavailable,
    Rejected,
}

#[derive(Default)]
struct Inner {
    intents: HashMap<String, PaymentIntent>,
    by_reference: HashMap<String, String>,
    fail_next_create: Option<FailureMode>,
}

/// In-process gateway used by tests and token-less development runs. Intents
/// start `pending`; tests drive their status with [`set_status`].
///
/// [`set_status`]: InMemoryGateway::set_status
#[derive(Default)]
pub struct InMemoryGateway {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `create_intent` call fail with the given mode.
    pub fn fail_next_create(&self, mode: FailureMode) {
        self.lock().fail_next_create = Some(mode);
    }

    /// Overrides the reported status of an existing intent.
    pub fn set_status(&self, intent_id: &str, status: &str) {
        if let Some(intent) = self.lock().intents.get_mut(intent_id) {
            intent.status = status.to_string();
        }
    }

    /// Registers an intent that exists on the gateway side only, as when a
    /// buyer paid before the bot learned the intent id.
    pub fn seed_intent(&self, external_reference: &str, intent: PaymentIntent) {
        let mut inner = self.lock();
        inner
            .by_reference
            .insert(external_reference.to_string(), intent.id.clone());
        inner.intents.insert(intent.id.clone(), intent);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        let mut inner = self.lock();
        if let Some(mode) = inner.fail_next_create.take() {
            return Err(match mode {
                FailureMode::Unavailable => {
                    ServiceError::GatewayUnavailable("simulated outage".to_string())
                }
                FailureMode::Rejected => {
                    ServiceError::GatewayRejected("simulated rejection".to_string())
                }
            });
        }

        let id = format!("mp-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let intent = PaymentIntent {
            id: id.clone(),
            status: "pending".to_string(),
            qr_code: Some(format!("00020126pix-{}-{}", request.external_reference, id)),
        };
        inner
            .by_reference
            .insert(request.external_reference.clone(), id.clone());
        inner.intents.insert(id.clone(), intent.clone());
        info!(intent_id = %id, amount = %request.amount, "in-memory payment intent created");
        Ok(intent)
    }

    async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<PaymentIntent>, ServiceError> {
        let inner = self.lock();
        Ok(inner
            .by_reference
            .get(external_reference)
            .and_then(|id| inner.intents.get(id))
            .cloned())
    }

    async fn get_by_id(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError> {
        self.lock()
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| ServiceError::GatewayRejected(format!("unknown intent {intent_id}")))
    }
}
