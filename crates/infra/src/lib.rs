//! Infrastructure layer: stores, schema, and the purchasing application
//! services that run on top of them.

pub mod orders;
pub mod receiving;
pub mod store;

pub use orders::{CreatePurchaseOrder, PurchaseOrderDetails, PurchaseOrderService, UpdatePurchaseOrder};
pub use receiving::{ReceiptOutcome, ReceiveItem, ReceivingService, RetryPolicy};

#[cfg(test)]
mod integration_tests;
