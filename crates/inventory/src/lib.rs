//! Stock domain module: physical stock lines and the append-only stock ledger.
//!
//! This crate contains business rules only, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod ledger;
pub mod pricing;
pub mod stock_line;
pub mod warranty;

pub use ledger::{MovementDirection, MovementType, NewLedgerEntry, StockLedgerEntry};
pub use pricing::{StockPricing, TaxRate};
pub use stock_line::{StockLine, StockLineKey, StockLineState, StockMovement};
pub use warranty::{WarrantyPeriod, WarrantyPeriodType};
