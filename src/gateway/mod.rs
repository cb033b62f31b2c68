//! Payment gateway seam.
//!
//! The orchestrator only sees the [`PaymentGateway`] trait and the classified
//! error taxonomy; raw transport failures never cross this boundary. The PIX
//! HTTP client lives in [`pix`], and [`memory`] provides the in-process
//! implementation used by tests and token-less development runs.

pub mod memory;
pub mod pix;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

pub use memory::InMemoryGateway;
pub use pix::PixGateway;

/// Who is paying, as the gateway wants to see it.
#[derive(Debug, Clone, Serialize)]
pub struct PayerInfo {
    pub email: String,
    pub first_name: String,
}

/// Request to open a payment intent for an order.
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    pub amount: Decimal,
    pub description: String,
    pub payer: PayerInfo,
    /// The order id; lets the intent be found again before its own id is known.
    pub external_reference: String,
}

/// A payment intent as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    /// PIX copy-and-paste code, present on freshly created intents.
    pub qr_code: Option<String>,
}

impl PaymentIntent {
    pub fn status_class(&self) -> PaymentStatusClass {
        classify_status(&self.status)
    }
}

/// Gateway-reported statuses collapsed into what the reconciliation policy
/// cares about. Anything unrecognized is transient, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatusClass {
    Approved,
    Pending,
    Rejected,
    Other(String),
}

pub fn classify_status(raw: &str) -> PaymentStatusClass {
    match raw {
        "approved" => PaymentStatusClass::Approved,
        "pending" | "in_process" => PaymentStatusClass::Pending,
        "rejected" | "cancelled" => PaymentStatusClass::Rejected,
        other => PaymentStatusClass::Other(other.to_string()),
    }
}

/// The external payment processor, treated as an unreliable remote
/// dependency: every call can fail and failures arrive pre-classified as
/// `GatewayUnavailable` (retry) or `GatewayRejected` (this attempt is dead).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError>;

    /// Looks an intent up by the order id it was created with.
    async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<PaymentIntent>, ServiceError>;

    async fn get_by_id(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError>;
}
