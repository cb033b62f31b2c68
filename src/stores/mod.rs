//! In-memory stores with whole-file JSON durability.
//!
//! Every store is constructed once at startup from its snapshot file and
//! passed by `Arc` into the services; there is no global mutable state. Each
//! mutation rewrites that store's snapshot in full — flush failures are
//! logged and the in-memory change is kept.

pub mod carts;
pub mod catalog;
pub mod orders;
pub mod users;

pub use carts::CartStore;
pub use catalog::{CatalogStore, ProductField};
pub use orders::OrderLedger;
pub use users::UserRegistry;
