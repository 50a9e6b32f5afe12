//! Purchasing domain module (purchase orders and their line items).
//!
//! This crate contains business rules for purchase orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Line items refer to
//! their order by id only; aggregate-wide computations (totals, status
//! re-derivation) take the line items as an explicit slice.

pub mod error;
pub mod line_item;
pub mod order;
pub mod status;

pub use error::{ErrorKind, PurchasingError, PurchasingResult};
pub use line_item::{
    LineItemState, LineSums, NewLineItem, PurchaseOrderLineItem, RentalInfoUpdate,
    SellingInfoUpdate,
};
pub use order::{
    NewPurchaseOrder, OrderTotals, PurchaseOrder, PurchaseOrderState, ReceiptStatus,
    MAX_ORDER_NUMBER_LEN,
};
pub use status::PurchaseOrderStatus;
