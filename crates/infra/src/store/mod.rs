//! Transactional persistence for purchase orders, line items, stock lines and
//! the stock ledger.
//!
//! Services only see the traits in [`r#trait`]; the in-memory backend serves
//! tests and dev, the Postgres backend serves deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryDirectory, InMemoryPurchasingStore, InMemoryTx};
pub use postgres::{PgDirectory, PgPurchasingStore, PgTx};
pub use r#trait::{
    format_order_number, CatalogLookup, LedgerAppender, LineItemStore, OrderStore,
    PurchasingStore, PurchasingTx, StockLineStore, StoreError, VendorLookup,
};
