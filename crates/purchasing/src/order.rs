use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use procura_core::{AggregateRoot, Amount, PurchaseOrderId, VendorId};

use crate::error::{PurchasingError, PurchasingResult};
use crate::line_item::PurchaseOrderLineItem;
use crate::status::PurchaseOrderStatus;

pub const MAX_ORDER_NUMBER_LEN: usize = 50;

/// Rolled-up monetary totals of an order.
///
/// `grand_total == total_amount + total_tax_amount - total_discount` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total_amount: Amount,
    pub total_tax_amount: Amount,
    pub total_discount: Amount,
    pub grand_total: Amount,
}

impl OrderTotals {
    pub fn compute(amount: Decimal, tax: Decimal, discount: Decimal) -> PurchasingResult<Self> {
        let total_amount = non_negative("total_amount", amount)?;
        let total_tax_amount = non_negative("total_tax_amount", tax)?;
        let total_discount = non_negative("total_discount", discount)?;

        let gross = total_amount
            .checked_add(total_tax_amount)
            .ok_or_else(|| PurchasingError::validation("order total overflow"))?;
        let grand_total = gross
            .checked_sub(total_discount)
            .ok_or(PurchasingError::NegativeAmount {
                field: "grand_total",
                value: gross.value() - total_discount.value(),
            })?;

        Ok(Self {
            total_amount,
            total_tax_amount,
            total_discount,
            grand_total,
        })
    }

    fn is_consistent(&self) -> bool {
        self.total_amount
            .checked_add(self.total_tax_amount)
            .and_then(|gross| gross.checked_sub(self.total_discount))
            == Some(self.grand_total)
    }
}

/// Input for a new order. The order number comes from the store's sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseOrder {
    pub order_number: String,
    pub vendor_id: VendorId,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub reference_number: Option<String>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// Persisted form of an order, used by stores to rebuild the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderState {
    pub id: PurchaseOrderId,
    pub order_number: String,
    pub vendor_id: VendorId,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub status: PurchaseOrderStatus,
    pub totals: OrderTotals,
    pub reference_number: Option<String>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub is_active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Receipt state of all line items of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Nothing,
    Partial,
    Complete,
}

impl ReceiptStatus {
    /// Derive from *every* line item of the order, not just those just touched.
    pub fn of(lines: &[PurchaseOrderLineItem]) -> Self {
        let all_fully_received = lines.iter().all(PurchaseOrderLineItem::is_fully_received);
        let any_received = lines.iter().any(|l| !l.received_quantity().is_zero());
        if !lines.is_empty() && all_fully_received {
            ReceiptStatus::Complete
        } else if any_received {
            ReceiptStatus::Partial
        } else {
            ReceiptStatus::Nothing
        }
    }
}

/// Aggregate root: PurchaseOrder.
///
/// Holds no line items; see [`ReceiptStatus::of`] and
/// [`crate::LineSums::of`] for the aggregate-wide computations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    order_number: String,
    vendor_id: VendorId,
    order_date: NaiveDate,
    expected_delivery_date: Option<NaiveDate>,
    status: PurchaseOrderStatus,
    #[serde(flatten)]
    totals: OrderTotals,
    reference_number: Option<String>,
    invoice_number: Option<String>,
    notes: Option<String>,
    created_by: Option<String>,
    is_active: bool,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Create a new order in `DRAFT` with zero totals.
    pub fn new(input: NewPurchaseOrder, now: DateTime<Utc>) -> PurchasingResult<Self> {
        Ok(Self {
            id: PurchaseOrderId::new(),
            order_number: validate_order_number(&input.order_number)?,
            vendor_id: input.vendor_id,
            order_date: input.order_date,
            expected_delivery_date: input.expected_delivery_date,
            status: PurchaseOrderStatus::Draft,
            totals: OrderTotals::default(),
            reference_number: input.reference_number,
            invoice_number: input.invoice_number,
            notes: input.notes,
            created_by: input.created_by,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild from persisted state, re-checking the order number and totals.
    pub fn restore(state: PurchaseOrderState) -> PurchasingResult<Self> {
        let order_number = validate_order_number(&state.order_number)?;
        if !state.totals.is_consistent() {
            return Err(PurchasingError::validation(format!(
                "order {} grand total {} does not match its components",
                state.id, state.totals.grand_total
            )));
        }
        Ok(Self {
            id: state.id,
            order_number,
            vendor_id: state.vendor_id,
            order_date: state.order_date,
            expected_delivery_date: state.expected_delivery_date,
            status: state.status,
            totals: state.totals,
            reference_number: state.reference_number,
            invoice_number: state.invoice_number,
            notes: state.notes,
            created_by: state.created_by,
            is_active: state.is_active,
            version: state.version,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }

    /// The single status-changing primitive; every named transition goes through here.
    pub fn transition(
        &mut self,
        to: PurchaseOrderStatus,
        now: DateTime<Utc>,
    ) -> PurchasingResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(PurchasingError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_as_ordered(&mut self, now: DateTime<Utc>) -> PurchasingResult<()> {
        self.transition(PurchaseOrderStatus::Ordered, now)
    }

    pub fn mark_as_partially_received(&mut self, now: DateTime<Utc>) -> PurchasingResult<()> {
        self.transition(PurchaseOrderStatus::PartialReceived, now)
    }

    pub fn mark_as_received(&mut self, now: DateTime<Utc>) -> PurchasingResult<()> {
        self.transition(PurchaseOrderStatus::Received, now)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> PurchasingResult<()> {
        if matches!(
            self.status,
            PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled
        ) {
            return Err(PurchasingError::NotCancellable {
                order_id: self.id,
                status: self.status,
            });
        }
        self.transition(PurchaseOrderStatus::Cancelled, now)
    }

    /// Move the status to match the receipt state of the order's lines.
    ///
    /// Returns whether the status changed. An order already in the target
    /// status is left alone.
    pub fn apply_receipt_status(
        &mut self,
        receipt: ReceiptStatus,
        now: DateTime<Utc>,
    ) -> PurchasingResult<bool> {
        let target = match receipt {
            ReceiptStatus::Complete => PurchaseOrderStatus::Received,
            ReceiptStatus::Partial => PurchaseOrderStatus::PartialReceived,
            ReceiptStatus::Nothing => return Ok(false),
        };
        if self.status == target {
            return Ok(false);
        }
        match target {
            PurchaseOrderStatus::Received => self.mark_as_received(now)?,
            _ => self.mark_as_partially_received(now)?,
        }
        Ok(true)
    }

    /// Recompute the rolled-up totals. Fails without changing anything if any
    /// input (or the resulting grand total) is negative.
    pub fn update_totals(
        &mut self,
        amount: Decimal,
        tax: Decimal,
        discount: Decimal,
        now: DateTime<Utc>,
    ) -> PurchasingResult<()> {
        self.totals = OrderTotals::compute(amount, tax, discount)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn update_dates(
        &mut self,
        order_date: Option<NaiveDate>,
        expected_delivery_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) {
        if let Some(d) = order_date {
            self.order_date = d;
        }
        if let Some(d) = expected_delivery_date {
            self.expected_delivery_date = Some(d);
        }
        self.updated_at = now;
    }

    pub fn update_references(
        &mut self,
        reference_number: Option<String>,
        invoice_number: Option<String>,
        now: DateTime<Utc>,
    ) {
        if reference_number.is_some() {
            self.reference_number = reference_number;
        }
        if invoice_number.is_some() {
            self.invoice_number = invoice_number;
        }
        self.updated_at = now;
    }

    pub fn update_notes(&mut self, notes: Option<String>, now: DateTime<Utc>) {
        self.notes = notes;
        self.updated_at = now;
    }

    pub fn change_vendor(&mut self, vendor_id: VendorId, now: DateTime<Utc>) {
        self.vendor_id = vendor_id;
        self.updated_at = now;
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    /// Called by stores once an update has been durably applied.
    pub fn advance_version(&mut self) {
        self.version += 1;
    }

    pub fn is_editable(&self) -> bool {
        self.status.is_editable()
    }

    pub fn is_receivable(&self) -> bool {
        self.status.is_receivable()
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_date
    }

    pub fn expected_delivery_date(&self) -> Option<NaiveDate> {
        self.expected_delivery_date
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    pub fn reference_number(&self) -> Option<&str> {
        self.reference_number.as_deref()
    }

    pub fn invoice_number(&self) -> Option<&str> {
        self.invoice_number.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn validate_order_number(raw: &str) -> PurchasingResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PurchasingError::validation("order number cannot be empty"));
    }
    if trimmed.chars().count() > MAX_ORDER_NUMBER_LEN {
        return Err(PurchasingError::validation(format!(
            "order number cannot exceed {MAX_ORDER_NUMBER_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn non_negative(field: &'static str, value: Decimal) -> PurchasingResult<Amount> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(PurchasingError::NegativeAmount { field, value });
    }
    Amount::new(value).map_err(|_| {
        PurchasingError::validation(format!(
            "{field} cannot have more than {} decimal places (got {value})",
            Amount::SCALE
        ))
    })
}
