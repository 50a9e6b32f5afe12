//! Receiving goods against a purchase order.
//!
//! [`ReceivingService::receive_items`] applies a batch of `(line item,
//! quantity)` receipts as one unit of work:
//!
//! ```text
//! validate request (non-empty, quantities > 0)
//!   ↓
//! begin transaction
//!   ↓
//! load order, require ORDERED / PARTIAL_RECEIVED
//!   ↓
//! per item: line item += qty → stock line += qty → ledger entry (PURCHASE)
//!   ↓
//! reload all line items → re-derive order status → update order
//!   ↓
//! commit (or drop = rollback)
//! ```
//!
//! Any failure aborts the whole batch. A [`PurchasingError::ConcurrencyConflict`]
//! re-runs the batch from a fresh transaction, bounded by [`RetryPolicy`].
//!
//! The order row is updated on every batch, even when its status does not
//! change. Its version bump makes two batches on the same order conflict, so
//! the loser re-derives the status from the winner's committed lines.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use procura_core::{LineItemId, PurchaseOrderId, Quantity};
use procura_inventory::{NewLedgerEntry, StockLedgerEntry, StockLine};
use procura_purchasing::{
    ErrorKind, PurchaseOrder, PurchasingError, PurchasingResult, ReceiptStatus,
};

use crate::store::{
    LedgerAppender, LineItemStore, OrderStore, PurchasingStore, PurchasingTx, StockLineStore,
};

/// One requested receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveItem {
    pub line_item_id: LineItemId,
    pub quantity: i64,
}

impl ReceiveItem {
    pub fn new(line_item_id: LineItemId, quantity: i64) -> Self {
        Self {
            line_item_id,
            quantity,
        }
    }
}

/// Result of a committed receiving batch.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptOutcome {
    pub order: PurchaseOrder,
    pub ledger_entries: Vec<StockLedgerEntry>,
}

/// Bounded whole-batch retry on concurrency conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Orchestrates stock receipts over a [`PurchasingStore`].
#[derive(Debug, Clone)]
pub struct ReceivingService<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S> ReceivingService<S>
where
    S: PurchasingStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receive a batch of items against `order_id`.
    ///
    /// Either every item is received (line items, stock lines, ledger and
    /// order status all committed together) or nothing is.
    #[instrument(skip(self, items), fields(order_id = %order_id, item_count = items.len()), err)]
    pub async fn receive_items(
        &self,
        order_id: PurchaseOrderId,
        items: &[ReceiveItem],
    ) -> PurchasingResult<ReceiptOutcome> {
        validate_request(items)?;

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.receive_once(order_id, items).await {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %err, "receiving batch conflicted, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    if err.kind() == ErrorKind::Store {
                        error!(error = %err, "store failure while receiving, batch rolled back");
                    }
                    return Err(err);
                }
                Ok(outcome) => return Ok(outcome),
            }
        }
    }

    async fn receive_once(
        &self,
        order_id: PurchaseOrderId,
        items: &[ReceiveItem],
    ) -> PurchasingResult<ReceiptOutcome> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .find_order(order_id)
            .await?
            .ok_or(PurchasingError::OrderNotFound(order_id))?;
        if !order.is_receivable() {
            return Err(PurchasingError::NotReceivable {
                order_id,
                status: order.status(),
            });
        }
        info!(
            order_number = order.order_number(),
            item_count = items.len(),
            "receiving purchase order items"
        );

        let mut ledger_entries = Vec::with_capacity(items.len());
        for request in items {
            let mut line = tx
                .find_line_item(request.line_item_id)
                .await?
                .ok_or(PurchasingError::LineItemNotFound(request.line_item_id))?;
            if line.purchase_order_id() != order_id {
                return Err(PurchasingError::LineItemMismatch {
                    line_item_id: request.line_item_id,
                    expected_order_id: order_id,
                    actual_order_id: line.purchase_order_id(),
                });
            }

            line.receive_items(request.quantity, now)?;
            tx.update_line_item(&mut line).await?;

            // Pricing and warranty are copied only when the stock line is opened.
            let key = line.stock_key();
            let mut stock_line = match tx.find_stock_line(&key).await? {
                Some(existing) => existing,
                None => {
                    let opened = StockLine::open(key, line.pricing().clone(), line.warranty(), now);
                    tx.create_stock_line(&opened).await?;
                    opened
                }
            };

            let movement = stock_line.receive(Quantity::positive(request.quantity)?, now)?;
            tx.update_stock_line(&mut stock_line).await?;

            let entry = StockLedgerEntry::record(NewLedgerEntry::purchase_receipt(
                stock_line.id_typed(),
                order.order_number(),
                movement,
                line.warehouse_id(),
                now,
            ))?;
            tx.append_ledger_entry(&entry).await?;
            debug!(
                line_item_id = %line.id_typed(),
                stock_line_id = %stock_line.id_typed(),
                before = %movement.before,
                after = %movement.after,
                "line item received"
            );
            ledger_entries.push(entry);
        }

        let lines = tx.find_line_items_by_order(order_id).await?;
        order.apply_receipt_status(ReceiptStatus::of(&lines), now)?;
        tx.update_order(&mut order).await?;
        tx.commit().await?;

        info!(
            order_number = order.order_number(),
            status = %order.status(),
            ledger_entries = ledger_entries.len(),
            "receiving batch committed"
        );
        Ok(ReceiptOutcome {
            order,
            ledger_entries,
        })
    }
}

/// Reject empty batches and non-positive quantities before touching the store.
pub fn validate_request(items: &[ReceiveItem]) -> PurchasingResult<()> {
    if items.is_empty() {
        return Err(PurchasingError::validation("at least one item is required"));
    }
    if let Some(bad) = items.iter().find(|i| i.quantity <= 0) {
        return Err(PurchasingError::InvalidQuantity {
            line_item_id: Some(bad.line_item_id),
            quantity: bad.quantity,
        });
    }
    Ok(())
}
