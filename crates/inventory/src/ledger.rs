//! Append-only stock ledger.
//!
//! A [`StockLedgerEntry`] is the audit record of exactly one quantity change to
//! one stock line. Entries are validated once, at construction, and expose no
//! mutators: there is no way to edit or delete an entry through this type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, LedgerEntryId, StockLineId, WarehouseId};

use crate::stock_line::StockMovement;

/// Closed set of reasons a stock line quantity can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Purchase,
    PurchaseReturn,
    Sell,
    SellReturn,
    Rent,
    RentReturn,
    Reconciliation,
    InterWarehouseTransfer,
}

/// Sign a movement's quantity must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementDirection {
    /// Stock increases (`quantity > 0`).
    Inbound,
    /// Stock decreases (`quantity < 0`).
    Outbound,
    /// Either sign is acceptable.
    Either,
}

impl MovementType {
    pub fn direction(&self) -> MovementDirection {
        match self {
            MovementType::Purchase | MovementType::SellReturn | MovementType::RentReturn => {
                MovementDirection::Inbound
            }
            MovementType::Sell | MovementType::PurchaseReturn | MovementType::Rent => {
                MovementDirection::Outbound
            }
            MovementType::Reconciliation | MovementType::InterWarehouseTransfer => {
                MovementDirection::Either
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "PURCHASE",
            MovementType::PurchaseReturn => "PURCHASE_RETURN",
            MovementType::Sell => "SELL",
            MovementType::SellReturn => "SELL_RETURN",
            MovementType::Rent => "RENT",
            MovementType::RentReturn => "RENT_RETURN",
            MovementType::Reconciliation => "RECONCILIATION",
            MovementType::InterWarehouseTransfer => "INTER_WAREHOUSE_TRANSFER",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        Ok(match s {
            "PURCHASE" => MovementType::Purchase,
            "PURCHASE_RETURN" => MovementType::PurchaseReturn,
            "SELL" => MovementType::Sell,
            "SELL_RETURN" => MovementType::SellReturn,
            "RENT" => MovementType::Rent,
            "RENT_RETURN" => MovementType::RentReturn,
            "RECONCILIATION" => MovementType::Reconciliation,
            "INTER_WAREHOUSE_TRANSFER" => MovementType::InterWarehouseTransfer,
            other => {
                return Err(DomainError::validation(format!(
                    "invalid movement type: {other}"
                )));
            }
        })
    }
}

/// Input for recording a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub stock_line_id: StockLineId,
    pub movement_type: MovementType,
    pub linked_transaction_id: String,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub warehouse_from: Option<WarehouseId>,
    pub warehouse_to: Option<WarehouseId>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    /// Inbound entry for goods received against a purchase order.
    pub fn purchase_receipt(
        stock_line_id: StockLineId,
        order_number: &str,
        movement: StockMovement,
        warehouse_to: WarehouseId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stock_line_id,
            movement_type: MovementType::Purchase,
            linked_transaction_id: order_number.to_string(),
            quantity: movement.delta(),
            quantity_before: i64::from(movement.before),
            quantity_after: i64::from(movement.after),
            warehouse_from: None,
            warehouse_to: Some(warehouse_to),
            notes: Some(format!("Purchase order receipt: {order_number}")),
            recorded_at,
        }
    }
}

/// Immutable audit record of one quantity change to one stock line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLedgerEntry {
    id: LedgerEntryId,
    stock_line_id: StockLineId,
    movement_type: MovementType,
    linked_transaction_id: String,
    quantity: i64,
    quantity_before: i64,
    quantity_after: i64,
    warehouse_from: Option<WarehouseId>,
    warehouse_to: Option<WarehouseId>,
    notes: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl StockLedgerEntry {
    /// Validate and record a new entry.
    pub fn record(entry: NewLedgerEntry) -> DomainResult<Self> {
        Self::restore(LedgerEntryId::new(), entry)
    }

    /// Rebuild a persisted entry (re-validated).
    pub fn restore(id: LedgerEntryId, entry: NewLedgerEntry) -> DomainResult<Self> {
        validate(&entry)?;
        Ok(Self {
            id,
            stock_line_id: entry.stock_line_id,
            movement_type: entry.movement_type,
            linked_transaction_id: entry.linked_transaction_id.trim().to_string(),
            quantity: entry.quantity,
            quantity_before: entry.quantity_before,
            quantity_after: entry.quantity_after,
            warehouse_from: entry.warehouse_from,
            warehouse_to: entry.warehouse_to,
            notes: entry.notes,
            recorded_at: entry.recorded_at,
        })
    }

    pub fn id(&self) -> LedgerEntryId {
        self.id
    }

    pub fn stock_line_id(&self) -> StockLineId {
        self.stock_line_id
    }

    pub fn movement_type(&self) -> MovementType {
        self.movement_type
    }

    pub fn linked_transaction_id(&self) -> &str {
        &self.linked_transaction_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn quantity_before(&self) -> i64 {
        self.quantity_before
    }

    pub fn quantity_after(&self) -> i64 {
        self.quantity_after
    }

    pub fn warehouse_from(&self) -> Option<WarehouseId> {
        self.warehouse_from
    }

    pub fn warehouse_to(&self) -> Option<WarehouseId> {
        self.warehouse_to
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn is_inbound(&self) -> bool {
        self.movement_type.direction() == MovementDirection::Inbound
    }

    pub fn is_outbound(&self) -> bool {
        self.movement_type.direction() == MovementDirection::Outbound
    }

    pub fn is_transfer(&self) -> bool {
        self.movement_type == MovementType::InterWarehouseTransfer
    }

    pub fn is_reconciliation(&self) -> bool {
        self.movement_type == MovementType::Reconciliation
    }

    pub fn absolute_quantity(&self) -> u64 {
        self.quantity.unsigned_abs()
    }
}

fn validate(entry: &NewLedgerEntry) -> DomainResult<()> {
    if entry.linked_transaction_id.trim().is_empty() {
        return Err(DomainError::validation("transaction id is required"));
    }

    if entry.quantity_before < 0 || entry.quantity_after < 0 {
        return Err(DomainError::invariant(format!(
            "on-hand quantities cannot be negative (before={}, after={})",
            entry.quantity_before, entry.quantity_after
        )));
    }

    let change = entry.quantity_after.checked_sub(entry.quantity_before);
    if change != Some(entry.quantity) {
        return Err(DomainError::invariant(format!(
            "quantity change does not match before/after quantities (quantity={}, before={}, after={})",
            entry.quantity, entry.quantity_before, entry.quantity_after
        )));
    }

    let kind = entry.movement_type;
    if entry.quantity == 0 && kind != MovementType::Reconciliation {
        return Err(DomainError::validation(format!(
            "quantity cannot be zero for {}",
            kind.as_str()
        )));
    }

    match kind.direction() {
        MovementDirection::Inbound if entry.quantity < 0 => {
            return Err(DomainError::invariant(format!(
                "quantity must be positive for {}",
                kind.as_str()
            )));
        }
        MovementDirection::Outbound if entry.quantity > 0 => {
            return Err(DomainError::invariant(format!(
                "quantity must be negative for {}",
                kind.as_str()
            )));
        }
        _ => {}
    }

    if kind == MovementType::InterWarehouseTransfer {
        match (entry.warehouse_from, entry.warehouse_to) {
            (Some(from), Some(to)) if from == to => {
                return Err(DomainError::validation(
                    "source and destination warehouses must be different",
                ));
            }
            (Some(_), Some(_)) => {}
            _ => {
                return Err(DomainError::validation(
                    "both source and destination warehouses are required for transfers",
                ));
            }
        }
    }

    Ok(())
}
