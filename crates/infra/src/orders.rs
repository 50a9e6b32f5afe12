//! Purchase order lifecycle outside of receiving: creation, header edits,
//! placing and cancelling orders, and read-side details.
//!
//! Each operation runs in its own store transaction. Master-data checks
//! (vendor / catalog item existence) happen before the transaction begins.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use procura_core::{PurchaseOrderId, VendorId};
use procura_purchasing::{
    LineSums, NewLineItem, NewPurchaseOrder, PurchaseOrder, PurchaseOrderLineItem,
    PurchasingError, PurchasingResult,
};

use crate::store::{
    CatalogLookup, LineItemStore, OrderStore, PurchasingStore, PurchasingTx, VendorLookup,
};

/// Request to create a purchase order with its line items.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePurchaseOrder {
    pub vendor_id: VendorId,
    pub order_date: NaiveDate,
    #[serde(default)]
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// Partial header edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePurchaseOrder {
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl UpdatePurchaseOrder {
    fn is_empty(&self) -> bool {
        self.vendor_id.is_none()
            && self.order_date.is_none()
            && self.expected_delivery_date.is_none()
            && self.reference_number.is_none()
            && self.invoice_number.is_none()
            && self.notes.is_none()
    }
}

/// An order together with all of its line items and receipt counts.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetails {
    pub order: PurchaseOrder,
    pub line_items: Vec<PurchaseOrderLineItem>,
    pub total_items: usize,
    pub items_received: usize,
    pub items_pending: usize,
}

impl PurchaseOrderDetails {
    pub fn new(order: PurchaseOrder, line_items: Vec<PurchaseOrderLineItem>) -> Self {
        let items_received = line_items.iter().filter(|l| l.is_fully_received()).count();
        Self {
            total_items: line_items.len(),
            items_pending: line_items.len() - items_received,
            items_received,
            order,
            line_items,
        }
    }
}

fn check_delivery_date(
    order_date: NaiveDate,
    expected_delivery_date: Option<NaiveDate>,
) -> PurchasingResult<()> {
    match expected_delivery_date {
        Some(expected) if expected < order_date => Err(PurchasingError::validation(format!(
            "expected delivery date {expected} is before order date {order_date}"
        ))),
        _ => Ok(()),
    }
}

/// Purchase order lifecycle service.
#[derive(Debug, Clone)]
pub struct PurchaseOrderService<S, D> {
    store: S,
    directory: D,
}

impl<S, D> PurchaseOrderService<S, D>
where
    S: PurchasingStore,
    D: VendorLookup + CatalogLookup,
{
    pub fn new(store: S, directory: D) -> Self {
        Self { store, directory }
    }

    /// Create a DRAFT order and its line items, with totals rolled up from
    /// the lines.
    #[instrument(skip(self, request), fields(vendor_id = %request.vendor_id, item_count = request.items.len()), err)]
    pub async fn create(&self, request: CreatePurchaseOrder) -> PurchasingResult<PurchaseOrderDetails> {
        if request.items.is_empty() {
            return Err(PurchasingError::validation("at least one line item is required"));
        }
        check_delivery_date(request.order_date, request.expected_delivery_date)?;

        if !self.directory.vendor_exists(request.vendor_id).await? {
            return Err(PurchasingError::VendorNotFound(request.vendor_id));
        }
        for item in &request.items {
            if !self.directory.catalog_item_exists(item.inventory_item_id).await? {
                return Err(PurchasingError::CatalogItemNotFound(item.inventory_item_id));
            }
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let order_number = tx.next_order_number().await?;

        let mut order = PurchaseOrder::new(
            NewPurchaseOrder {
                order_number,
                vendor_id: request.vendor_id,
                order_date: request.order_date,
                expected_delivery_date: request.expected_delivery_date,
                reference_number: request.reference_number,
                invoice_number: request.invoice_number,
                notes: request.notes,
                created_by: request.created_by,
            },
            now,
        )?;

        let line_items = request
            .items
            .into_iter()
            .map(|item| PurchaseOrderLineItem::new(order.id_typed(), item, now))
            .collect::<PurchasingResult<Vec<_>>>()?;

        let sums = LineSums::of(&line_items)?;
        order.update_totals(sums.amount, sums.tax, sums.discount, now)?;

        tx.save_order(&order).await?;
        for line in &line_items {
            tx.save_line_item(line).await?;
        }
        tx.commit().await?;

        info!(
            order_id = %order.id_typed(),
            order_number = order.order_number(),
            grand_total = %order.totals().grand_total,
            "purchase order created"
        );
        Ok(PurchaseOrderDetails::new(order, line_items))
    }

    /// Edit header fields of a DRAFT or ORDERED order.
    #[instrument(skip(self, update), fields(order_id = %order_id), err)]
    pub async fn update_header(
        &self,
        order_id: PurchaseOrderId,
        update: UpdatePurchaseOrder,
    ) -> PurchasingResult<PurchaseOrder> {
        if update.is_empty() {
            return Err(PurchasingError::validation("no fields to update"));
        }
        if let Some(vendor_id) = update.vendor_id {
            if !self.directory.vendor_exists(vendor_id).await? {
                return Err(PurchasingError::VendorNotFound(vendor_id));
            }
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut order = load_order(&mut tx, order_id).await?;
        if !order.is_editable() {
            return Err(PurchasingError::NotEditable {
                order_id,
                status: order.status(),
            });
        }

        let order_date = update.order_date.unwrap_or(order.order_date());
        let expected = update
            .expected_delivery_date
            .or(order.expected_delivery_date());
        check_delivery_date(order_date, expected)?;

        if let Some(vendor_id) = update.vendor_id {
            order.change_vendor(vendor_id, now);
        }
        if update.order_date.is_some() || update.expected_delivery_date.is_some() {
            order.update_dates(update.order_date, update.expected_delivery_date, now);
        }
        if update.reference_number.is_some() || update.invoice_number.is_some() {
            order.update_references(update.reference_number, update.invoice_number, now);
        }
        if update.notes.is_some() {
            order.update_notes(update.notes, now);
        }

        tx.update_order(&mut order).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// DRAFT → ORDERED.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn mark_ordered(&self, order_id: PurchaseOrderId) -> PurchasingResult<PurchaseOrder> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut order = load_order(&mut tx, order_id).await?;
        order.mark_as_ordered(now)?;
        tx.update_order(&mut order).await?;
        tx.commit().await?;

        info!(order_number = order.order_number(), "purchase order placed");
        Ok(order)
    }

    /// Cancel the order and deactivate every line item with it.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn cancel(&self, order_id: PurchaseOrderId) -> PurchasingResult<PurchaseOrderDetails> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut order = load_order(&mut tx, order_id).await?;
        order.cancel(now)?;

        let mut line_items = tx.find_line_items_by_order(order_id).await?;
        for line in &mut line_items {
            line.deactivate(now);
            tx.update_line_item(line).await?;
        }
        tx.update_order(&mut order).await?;
        tx.commit().await?;

        info!(
            order_number = order.order_number(),
            line_items = line_items.len(),
            "purchase order cancelled"
        );
        Ok(PurchaseOrderDetails::new(order, line_items))
    }

    /// The order with all of its line items.
    pub async fn details(&self, order_id: PurchaseOrderId) -> PurchasingResult<PurchaseOrderDetails> {
        let mut tx = self.store.begin().await?;
        let order = load_order(&mut tx, order_id).await?;
        let line_items = tx.find_line_items_by_order(order_id).await?;
        Ok(PurchaseOrderDetails::new(order, line_items))
    }
}

async fn load_order<T: PurchasingTx>(
    tx: &mut T,
    order_id: PurchaseOrderId,
) -> PurchasingResult<PurchaseOrder> {
    tx.find_order(order_id)
        .await?
        .ok_or(PurchasingError::OrderNotFound(order_id))
}
