//! Business services coordinating the stores, the payment gateway and the
//! notification seam.

pub mod admin_flow;
pub mod checkout;
pub mod orders;
pub mod pricing;

pub use admin_flow::{AdminFlow, AdminInput, EditField, FlowStep};
pub use checkout::{CheckoutService, ReconcileOutcome, SessionProfile};
pub use orders::OrderService;
pub use pricing::PricingPolicy;
