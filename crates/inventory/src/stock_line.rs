use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{
    AggregateRoot, DomainError, DomainResult, InventoryItemId, Quantity, StockLineId,
    WarehouseId,
};

use crate::pricing::StockPricing;
use crate::warranty::WarrantyPeriod;

/// Identity of a physical stock line: one item in one warehouse, either a
/// single serialized unit or the bulk (unserialized) pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockLineKey {
    pub inventory_item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub serial_number: Option<String>,
}

impl StockLineKey {
    pub fn new(
        inventory_item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        serial_number: Option<String>,
    ) -> Self {
        Self {
            inventory_item_id,
            warehouse_id,
            serial_number,
        }
    }

    pub fn is_serialized(&self) -> bool {
        self.serial_number.is_some()
    }
}

/// On-hand quantity change produced by a single stock line mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub before: Quantity,
    pub after: Quantity,
}

impl StockMovement {
    /// Signed delta (`after - before`).
    pub fn delta(&self) -> i64 {
        i64::from(self.after) - i64::from(self.before)
    }
}

/// Persisted form of a stock line, used by stores to rebuild the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLineState {
    pub id: StockLineId,
    pub key: StockLineKey,
    pub quantity: Quantity,
    pub pricing: StockPricing,
    pub warranty: Option<WarrantyPeriod>,
    pub version: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Physical on-hand stock record for one (item, warehouse, serial) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLine {
    id: StockLineId,
    key: StockLineKey,
    quantity: Quantity,
    pricing: StockPricing,
    warranty: Option<WarrantyPeriod>,
    version: u64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StockLine {
    /// Open a new, empty stock line (first receipt for this key).
    pub fn open(
        key: StockLineKey,
        pricing: StockPricing,
        warranty: Option<WarrantyPeriod>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StockLineId::new(),
            key,
            quantity: Quantity::ZERO,
            pricing,
            warranty,
            version: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild from persisted state.
    pub fn restore(state: StockLineState) -> DomainResult<Self> {
        if state.key.serial_number.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(DomainError::invariant(
                "serial number must be absent or non-empty",
            ));
        }
        Ok(Self {
            id: state.id,
            key: state.key,
            quantity: state.quantity,
            pricing: state.pricing,
            warranty: state.warranty,
            version: state.version,
            is_active: state.is_active,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }

    pub fn id_typed(&self) -> StockLineId {
        self.id
    }

    pub fn key(&self) -> &StockLineKey {
        &self.key
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn pricing(&self) -> &StockPricing {
        &self.pricing
    }

    pub fn warranty(&self) -> Option<WarrantyPeriod> {
        self.warranty
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Add received units to the on-hand quantity.
    pub fn receive(&mut self, quantity: Quantity, now: DateTime<Utc>) -> DomainResult<StockMovement> {
        if quantity.is_zero() {
            return Err(DomainError::validation("received quantity cannot be zero"));
        }
        let before = self.quantity;
        let after = before.checked_add(quantity).ok_or_else(|| {
            DomainError::invariant(format!(
                "stock line {} quantity overflow ({before} + {quantity})",
                self.id
            ))
        })?;

        self.quantity = after;
        self.updated_at = now;
        Ok(StockMovement { before, after })
    }

    /// Called by stores once an update has been durably applied.
    pub fn advance_version(&mut self) {
        self.version += 1;
    }
}

impl AggregateRoot for StockLine {
    type Id = StockLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
