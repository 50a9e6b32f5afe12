use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use procura_core::{
    AggregateRoot, Amount, InventoryItemId, LineItemId, PurchaseOrderId, Quantity,
    WarehouseId,
};
use procura_inventory::{StockLineKey, StockPricing, TaxRate, WarrantyPeriod, WarrantyPeriodType};

use crate::error::{PurchasingError, PurchasingResult};

/// Input for a new line item, as supplied at order creation.
///
/// Money fields are raw decimals so a negative value is reported as
/// [`PurchasingError::NegativeAmount`] naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub inventory_item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub unit_price: Decimal,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub warranty_period_type: Option<WarrantyPeriodType>,
    #[serde(default)]
    pub warranty_period: Option<u32>,
    #[serde(default)]
    pub rental_rate: Decimal,
    #[serde(default)]
    pub replacement_cost: Decimal,
    #[serde(default)]
    pub late_fee_rate: Decimal,
    #[serde(default)]
    pub rent_tax_rate: i64,
    #[serde(default = "default_true")]
    pub rentable: bool,
    #[serde(default)]
    pub selling_price: Decimal,
    #[serde(default)]
    pub sell_tax_rate: i64,
    #[serde(default)]
    pub sellable: bool,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_true() -> bool {
    true
}

impl NewLineItem {
    pub fn new(
        inventory_item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        quantity: i64,
        unit_price: Decimal,
    ) -> Self {
        Self {
            inventory_item_id,
            warehouse_id,
            quantity,
            unit_price,
            serial_number: None,
            discount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            warranty_period_type: None,
            warranty_period: None,
            rental_rate: Decimal::ZERO,
            replacement_cost: Decimal::ZERO,
            late_fee_rate: Decimal::ZERO,
            rent_tax_rate: 0,
            rentable: true,
            selling_price: Decimal::ZERO,
            sell_tax_rate: 0,
            sellable: false,
            reference_number: None,
            created_by: None,
        }
    }
}

/// Partial update of the rental attributes. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RentalInfoUpdate {
    pub rental_rate: Option<Decimal>,
    pub replacement_cost: Option<Decimal>,
    pub late_fee_rate: Option<Decimal>,
    pub rent_tax_rate: Option<i64>,
    pub rentable: Option<bool>,
}

/// Partial update of the sale attributes. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SellingInfoUpdate {
    pub selling_price: Option<Decimal>,
    pub sell_tax_rate: Option<i64>,
    pub sellable: Option<bool>,
}

/// Persisted form of a line item, used by stores to rebuild the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemState {
    pub id: LineItemId,
    pub purchase_order_id: PurchaseOrderId,
    pub inventory_item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub serial_number: Option<String>,
    pub quantity: Quantity,
    pub received_quantity: Quantity,
    pub unit_price: Amount,
    pub discount: Amount,
    pub tax_amount: Amount,
    pub warranty: Option<WarrantyPeriod>,
    pub pricing: StockPricing,
    pub reference_number: Option<String>,
    pub created_by: Option<String>,
    pub is_active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One ordered (item, warehouse[, serial]) entry of a purchase order.
///
/// Holds a weak back-reference to its order (`purchase_order_id`); the order
/// never owns its lines in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOrderLineItem {
    id: LineItemId,
    purchase_order_id: PurchaseOrderId,
    inventory_item_id: InventoryItemId,
    warehouse_id: WarehouseId,
    serial_number: Option<String>,
    quantity: Quantity,
    received_quantity: Quantity,
    unit_price: Amount,
    discount: Amount,
    tax_amount: Amount,
    amount: Amount,
    total_price: Amount,
    warranty: Option<WarrantyPeriod>,
    pricing: StockPricing,
    reference_number: Option<String>,
    created_by: Option<String>,
    is_active: bool,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PurchaseOrderLineItem {
    pub fn new(
        purchase_order_id: PurchaseOrderId,
        input: NewLineItem,
        now: DateTime<Utc>,
    ) -> PurchasingResult<Self> {
        let quantity = Quantity::positive(input.quantity).map_err(|_| {
            PurchasingError::InvalidQuantity {
                line_item_id: None,
                quantity: input.quantity,
            }
        })?;
        let unit_price = non_negative("unit_price", input.unit_price)?;
        let discount = non_negative("discount", input.discount)?;
        let tax_amount = non_negative("tax_amount", input.tax_amount)?;
        let (amount, total_price) = line_totals(unit_price, quantity, discount, tax_amount)?;

        let warranty =
            WarrantyPeriod::from_parts(input.warranty_period_type, input.warranty_period)?;
        let pricing = StockPricing {
            rental_rate: non_negative("rental_rate", input.rental_rate)?,
            replacement_cost: non_negative("replacement_cost", input.replacement_cost)?,
            late_fee_rate: non_negative("late_fee_rate", input.late_fee_rate)?,
            rent_tax_rate: TaxRate::new(input.rent_tax_rate)?,
            rentable: input.rentable,
            selling_price: non_negative("selling_price", input.selling_price)?,
            sell_tax_rate: TaxRate::new(input.sell_tax_rate)?,
            sellable: input.sellable,
        };

        Ok(Self {
            id: LineItemId::new(),
            purchase_order_id,
            inventory_item_id: input.inventory_item_id,
            warehouse_id: input.warehouse_id,
            serial_number: normalize_serial(input.serial_number),
            quantity,
            received_quantity: Quantity::ZERO,
            unit_price,
            discount,
            tax_amount,
            amount,
            total_price,
            warranty,
            pricing,
            reference_number: input.reference_number,
            created_by: input.created_by,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild from persisted state, re-checking every invariant.
    pub fn restore(state: LineItemState) -> PurchasingResult<Self> {
        if state.quantity.is_zero() {
            return Err(PurchasingError::InvalidQuantity {
                line_item_id: Some(state.id),
                quantity: 0,
            });
        }
        if state.received_quantity > state.quantity {
            return Err(PurchasingError::validation(format!(
                "line item {} received quantity {} exceeds ordered quantity {}",
                state.id, state.received_quantity, state.quantity
            )));
        }
        let (amount, total_price) = line_totals(
            state.unit_price,
            state.quantity,
            state.discount,
            state.tax_amount,
        )?;

        Ok(Self {
            id: state.id,
            purchase_order_id: state.purchase_order_id,
            inventory_item_id: state.inventory_item_id,
            warehouse_id: state.warehouse_id,
            serial_number: normalize_serial(state.serial_number),
            quantity: state.quantity,
            received_quantity: state.received_quantity,
            unit_price: state.unit_price,
            discount: state.discount,
            tax_amount: state.tax_amount,
            amount,
            total_price,
            warranty: state.warranty,
            pricing: state.pricing,
            reference_number: state.reference_number,
            created_by: state.created_by,
            is_active: state.is_active,
            version: state.version,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }

    /// Record `quantity` more units as received.
    ///
    /// Leaves the line untouched on failure.
    pub fn receive_items(&mut self, quantity: i64, now: DateTime<Utc>) -> PurchasingResult<()> {
        if quantity <= 0 {
            return Err(PurchasingError::InvalidQuantity {
                line_item_id: Some(self.id),
                quantity,
            });
        }

        let over_receipt = || PurchasingError::OverReceipt {
            line_item_id: self.id,
            ordered: self.quantity.get(),
            already_received: self.received_quantity.get(),
            requested: quantity,
        };
        // Anything past the quantity range is more than any line can order.
        let requested = Quantity::new(quantity).map_err(|_| over_receipt())?;
        let received = self
            .received_quantity
            .checked_add(requested)
            .ok_or_else(over_receipt)?;
        if received > self.quantity {
            return Err(over_receipt());
        }

        self.received_quantity = received;
        self.updated_at = now;
        Ok(())
    }

    /// Correct unit price, discount, or tax. `None` leaves a field unchanged.
    pub fn update_pricing(
        &mut self,
        unit_price: Option<Decimal>,
        discount: Option<Decimal>,
        tax_amount: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> PurchasingResult<()> {
        let unit_price = match unit_price {
            Some(v) => non_negative("unit_price", v)?,
            None => self.unit_price,
        };
        let discount = match discount {
            Some(v) => non_negative("discount", v)?,
            None => self.discount,
        };
        let tax_amount = match tax_amount {
            Some(v) => non_negative("tax_amount", v)?,
            None => self.tax_amount,
        };
        let (amount, total_price) = line_totals(unit_price, self.quantity, discount, tax_amount)?;

        self.unit_price = unit_price;
        self.discount = discount;
        self.tax_amount = tax_amount;
        self.amount = amount;
        self.total_price = total_price;
        self.updated_at = now;
        Ok(())
    }

    /// Merge the given halves into the current warranty; the result must be
    /// both-or-neither.
    pub fn update_warranty(
        &mut self,
        period_type: Option<WarrantyPeriodType>,
        period: Option<u32>,
        now: DateTime<Utc>,
    ) -> PurchasingResult<()> {
        let current_type = self.warranty.map(|w| w.period_type());
        let current_period = self.warranty.map(|w| w.period());
        let warranty = WarrantyPeriod::from_parts(
            period_type.or(current_type),
            period.or(current_period),
        )?;
        self.warranty = warranty;
        self.updated_at = now;
        Ok(())
    }

    pub fn update_rental_info(
        &mut self,
        update: RentalInfoUpdate,
        now: DateTime<Utc>,
    ) -> PurchasingResult<()> {
        let mut pricing = self.pricing.clone();
        if let Some(v) = update.rental_rate {
            pricing.rental_rate = non_negative("rental_rate", v)?;
        }
        if let Some(v) = update.replacement_cost {
            pricing.replacement_cost = non_negative("replacement_cost", v)?;
        }
        if let Some(v) = update.late_fee_rate {
            pricing.late_fee_rate = non_negative("late_fee_rate", v)?;
        }
        if let Some(v) = update.rent_tax_rate {
            pricing.rent_tax_rate = TaxRate::new(v)?;
        }
        if let Some(v) = update.rentable {
            pricing.rentable = v;
        }
        self.pricing = pricing;
        self.updated_at = now;
        Ok(())
    }

    pub fn update_selling_info(
        &mut self,
        update: SellingInfoUpdate,
        now: DateTime<Utc>,
    ) -> PurchasingResult<()> {
        let mut pricing = self.pricing.clone();
        if let Some(v) = update.selling_price {
            pricing.selling_price = non_negative("selling_price", v)?;
        }
        if let Some(v) = update.sell_tax_rate {
            pricing.sell_tax_rate = TaxRate::new(v)?;
        }
        if let Some(v) = update.sellable {
            pricing.sellable = v;
        }
        self.pricing = pricing;
        self.updated_at = now;
        Ok(())
    }

    /// Soft delete (order cancellation cascades this).
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    /// Called by stores once an update has been durably applied.
    pub fn advance_version(&mut self) {
        self.version += 1;
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_quantity >= self.quantity
    }

    pub fn is_partially_received(&self) -> bool {
        !self.received_quantity.is_zero() && self.received_quantity < self.quantity
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity.saturating_sub(self.received_quantity)
    }

    /// `unit_price * quantity - discount`.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// `amount + tax_amount`.
    pub fn total_price(&self) -> Amount {
        self.total_price
    }

    /// Key of the physical stock line this item replenishes.
    pub fn stock_key(&self) -> StockLineKey {
        StockLineKey::new(
            self.inventory_item_id,
            self.warehouse_id,
            self.serial_number.clone(),
        )
    }

    pub fn id_typed(&self) -> LineItemId {
        self.id
    }

    pub fn purchase_order_id(&self) -> PurchaseOrderId {
        self.purchase_order_id
    }

    pub fn inventory_item_id(&self) -> InventoryItemId {
        self.inventory_item_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn received_quantity(&self) -> Quantity {
        self.received_quantity
    }

    pub fn unit_price(&self) -> Amount {
        self.unit_price
    }

    pub fn discount(&self) -> Amount {
        self.discount
    }

    pub fn tax_amount(&self) -> Amount {
        self.tax_amount
    }

    pub fn warranty(&self) -> Option<WarrantyPeriod> {
        self.warranty
    }

    pub fn pricing(&self) -> &StockPricing {
        &self.pricing
    }

    pub fn reference_number(&self) -> Option<&str> {
        self.reference_number.as_deref()
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

impl AggregateRoot for PurchaseOrderLineItem {
    type Id = LineItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Column sums over an order's line items, fed to `PurchaseOrder::update_totals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSums {
    pub amount: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
}

impl LineSums {
    pub fn of(lines: &[PurchaseOrderLineItem]) -> PurchasingResult<Self> {
        lines.iter().try_fold(LineSums::default(), |acc, line| {
            let overflow = || PurchasingError::validation("order totals overflow");
            Ok(LineSums {
                amount: acc
                    .amount
                    .checked_add(line.amount.value())
                    .ok_or_else(overflow)?,
                tax: acc
                    .tax
                    .checked_add(line.tax_amount.value())
                    .ok_or_else(overflow)?,
                discount: acc
                    .discount
                    .checked_add(line.discount.value())
                    .ok_or_else(overflow)?,
            })
        })
    }
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

fn line_totals(
    unit_price: Amount,
    quantity: Quantity,
    discount: Amount,
    tax_amount: Amount,
) -> PurchasingResult<(Amount, Amount)> {
    let gross = unit_price
        .mul_quantity(quantity)
        .ok_or_else(|| PurchasingError::validation("line amount overflow"))?;
    let amount = gross
        .checked_sub(discount)
        .ok_or(PurchasingError::NegativeAmount {
            field: "amount",
            value: gross.value() - discount.value(),
        })?;
    let total_price = amount
        .checked_add(tax_amount)
        .ok_or_else(|| PurchasingError::validation("line total overflow"))?;
    Ok((amount, total_price))
}

fn normalize_serial(serial: Option<String>) -> Option<String> {
    serial
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
