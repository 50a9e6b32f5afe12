use async_trait::async_trait;
use thiserror::Error;

use procura_core::{InventoryItemId, LineItemId, PurchaseOrderId, VendorId};
use procura_inventory::{StockLedgerEntry, StockLine, StockLineKey};
use procura_purchasing::{PurchaseOrder, PurchaseOrderLineItem, PurchasingError};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, invariants).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A version check, row lock, or uniqueness constraint detected a
    /// competing write. The whole unit of work may be retried.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// The backend failed (connection, IO, unexpected database error).
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// A persisted record could not be rebuilt into a valid domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for PurchasingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => PurchasingError::ConcurrencyConflict(msg),
            other => PurchasingError::Store(other.to_string()),
        }
    }
}

/// Purchase order persistence within one transaction.
///
/// `update_order` checks that the stored version still equals
/// `order.version()` and bumps it on success.
#[async_trait]
pub trait OrderStore: Send {
    async fn find_order(&mut self, id: PurchaseOrderId)
    -> Result<Option<PurchaseOrder>, StoreError>;

    async fn save_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError>;

    async fn update_order(&mut self, order: &mut PurchaseOrder) -> Result<(), StoreError>;

    /// Monotonically unique human-readable order number.
    async fn next_order_number(&mut self) -> Result<String, StoreError>;
}

/// Line item persistence within one transaction.
///
/// Reads lock the returned rows for the remainder of the transaction where
/// the backend supports it.
#[async_trait]
pub trait LineItemStore: Send {
    async fn find_line_item(
        &mut self,
        id: LineItemId,
    ) -> Result<Option<PurchaseOrderLineItem>, StoreError>;

    /// Every line item of the order, in creation order.
    async fn find_line_items_by_order(
        &mut self,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<PurchaseOrderLineItem>, StoreError>;

    async fn save_line_item(&mut self, item: &PurchaseOrderLineItem) -> Result<(), StoreError>;

    async fn update_line_item(&mut self, item: &mut PurchaseOrderLineItem)
    -> Result<(), StoreError>;
}

/// Physical stock line persistence within one transaction.
#[async_trait]
pub trait StockLineStore: Send {
    async fn find_stock_line(&mut self, key: &StockLineKey)
    -> Result<Option<StockLine>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if a line for the same key exists.
    async fn create_stock_line(&mut self, line: &StockLine) -> Result<(), StoreError>;

    async fn update_stock_line(&mut self, line: &mut StockLine) -> Result<(), StoreError>;
}

/// Append-only stock ledger. Entries are never updated or deleted.
#[async_trait]
pub trait LedgerAppender: Send {
    async fn append_ledger_entry(&mut self, entry: &StockLedgerEntry) -> Result<(), StoreError>;
}

/// One unit of work over all purchasing stores.
///
/// Nothing is visible to other transactions until [`PurchasingTx::commit`]
/// succeeds; dropping an uncommitted transaction rolls it back.
#[async_trait]
pub trait PurchasingTx: OrderStore + LineItemStore + StockLineStore + LedgerAppender + Send {
    async fn commit(self) -> Result<(), StoreError>;
}

/// Factory for purchasing transactions.
#[async_trait]
pub trait PurchasingStore: Send + Sync {
    type Tx: PurchasingTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// Vendor master-data existence check.
#[async_trait]
pub trait VendorLookup: Send + Sync {
    async fn vendor_exists(&self, id: VendorId) -> Result<bool, StoreError>;
}

/// Inventory catalog existence check.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn catalog_item_exists(&self, id: InventoryItemId) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> PurchasingStore for std::sync::Arc<S>
where
    S: PurchasingStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}

#[async_trait]
impl<L> VendorLookup for std::sync::Arc<L>
where
    L: VendorLookup + ?Sized,
{
    async fn vendor_exists(&self, id: VendorId) -> Result<bool, StoreError> {
        (**self).vendor_exists(id).await
    }
}

#[async_trait]
impl<L> CatalogLookup for std::sync::Arc<L>
where
    L: CatalogLookup + ?Sized,
{
    async fn catalog_item_exists(&self, id: InventoryItemId) -> Result<bool, StoreError> {
        (**self).catalog_item_exists(id).await
    }
}

/// Order numbers look like `PUR-000042`.
pub fn format_order_number(sequence: u64) -> String {
    format!("PUR-{sequence:06}")
}
