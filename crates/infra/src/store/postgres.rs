//! Postgres-backed purchasing store.
//!
//! Every unit of work runs in one database transaction. Isolation between
//! concurrent receipts comes from two mechanisms:
//!
//! - line items and stock lines are read `FOR UPDATE`, so a second batch on
//!   the same row waits for the first to finish;
//! - every update is guarded by `WHERE version = $n`, so a writer that read a
//!   stale row affects zero rows and gets [`StoreError::Conflict`].
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Racing stock line creation for the same key |
//! | Database (serialization failure) | `40001` | `Conflict` | Serializable isolation abort |
//! | Database (deadlock detected) | `40P01` | `Conflict` | Two batches locking rows in opposite order |
//! | Database (other) | Any other | `Backend` | Check constraint, connection loss, etc. |
//! | PoolClosed / Io / Other | N/A | `Backend` | |

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use async_trait::async_trait;

use procura_core::{
    Amount, InventoryItemId, LedgerEntryId, LineItemId, PurchaseOrderId, Quantity, StockLineId,
    VendorId, WarehouseId,
};
use procura_inventory::{
    MovementType, NewLedgerEntry, StockLedgerEntry, StockLine, StockLineKey, StockLineState,
    StockPricing, TaxRate, WarrantyPeriod, WarrantyPeriodType,
};
use procura_purchasing::{
    LineItemState, OrderTotals, PurchaseOrder, PurchaseOrderLineItem, PurchaseOrderState,
    PurchaseOrderStatus,
};

use super::r#trait::{
    format_order_number, CatalogLookup, LedgerAppender, LineItemStore, OrderStore,
    PurchasingStore, PurchasingTx, StockLineStore, StoreError, VendorLookup,
};

const SCHEMA: &str = include_str!("../../migrations/0001_purchasing.sql");

/// Postgres-backed purchasing store.
#[derive(Debug, Clone)]
pub struct PgPurchasingStore {
    pool: PgPool,
}

impl PgPurchasingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema if it does not exist yet. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    /// Ledger entries of one stock line, in append order.
    #[instrument(
        skip(self),
        fields(stock_line_id = %stock_line_id, entry_count = tracing::field::Empty),
        err
    )]
    pub async fn ledger_for_stock_line(
        &self,
        stock_line_id: StockLineId,
    ) -> Result<Vec<StockLedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, stock_line_id, movement_type, linked_transaction_id, quantity,
                   quantity_before, quantity_after, warehouse_from, warehouse_to,
                   notes, recorded_at
            FROM stock_ledger_entries
            WHERE stock_line_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(stock_line_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_for_stock_line", e))?;

        let entries = rows
            .iter()
            .map(|row| {
                LedgerEntryRow::from_row(row)
                    .map_err(|e| corrupt("ledger entry row", e))
                    .and_then(StockLedgerEntry::try_from)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Span::current().record("entry_count", entries.len());
        Ok(entries)
    }
}

#[async_trait]
impl PurchasingStore for PgPurchasingStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PgTx { tx })
    }
}

/// Transaction over [`PgPurchasingStore`]. Rolled back on drop unless committed.
#[derive(Debug)]
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

const ORDER_COLUMNS: &str = "id, order_number, vendor_id, order_date, expected_delivery_date, \
    status, total_amount, total_tax_amount, total_discount, grand_total, reference_number, \
    invoice_number, notes, created_by, is_active, version, created_at, updated_at";

const LINE_ITEM_COLUMNS: &str = "id, purchase_order_id, inventory_item_id, warehouse_id, \
    serial_number, quantity, received_quantity, unit_price, discount, tax_amount, \
    warranty_period_type, warranty_period, rental_rate, replacement_cost, late_fee_rate, \
    rent_tax_rate, rentable, selling_price, sell_tax_rate, sellable, reference_number, \
    created_by, is_active, version, created_at, updated_at";

const STOCK_LINE_COLUMNS: &str = "id, inventory_item_id, warehouse_id, serial_number, quantity, \
    rental_rate, replacement_cost, late_fee_rate, rent_tax_rate, rentable, selling_price, \
    sell_tax_rate, sellable, warranty_period_type, warranty_period, is_active, version, \
    created_at, updated_at";

#[async_trait]
impl OrderStore for PgTx {
    #[instrument(level = "debug", skip(self), fields(order_id = %id), err)]
    async fn find_order(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_order", e))?;

        row.map(|row| {
            PurchaseOrderRow::from_row(&row)
                .map_err(|e| corrupt("purchase order row", e))
                .and_then(PurchaseOrder::try_from)
        })
        .transpose()
    }

    #[instrument(level = "debug", skip(self, order), fields(order_id = %order.id_typed()), err)]
    async fn save_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
        let totals = order.totals();
        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, order_number, vendor_id, order_date, expected_delivery_date, status,
                total_amount, total_tax_amount, total_discount, grand_total,
                reference_number, invoice_number, notes, created_by, is_active, version,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(order.id_typed().as_uuid())
        .bind(order.order_number())
        .bind(order.vendor_id().as_uuid())
        .bind(order.order_date())
        .bind(order.expected_delivery_date())
        .bind(order.status().as_str())
        .bind(totals.total_amount.value())
        .bind(totals.total_tax_amount.value())
        .bind(totals.total_discount.value())
        .bind(totals.grand_total.value())
        .bind(order.reference_number())
        .bind(order.invoice_number())
        .bind(order.notes())
        .bind(order.created_by())
        .bind(order.is_active())
        .bind(to_i64(order.version())?)
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_order", e))?;
        Ok(())
    }

    #[instrument(
        level = "debug",
        skip(self, order),
        fields(order_id = %order.id_typed(), version = order.version()),
        err
    )]
    async fn update_order(&mut self, order: &mut PurchaseOrder) -> Result<(), StoreError> {
        let totals = *order.totals();
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders SET
                vendor_id = $3, order_date = $4, expected_delivery_date = $5, status = $6,
                total_amount = $7, total_tax_amount = $8, total_discount = $9, grand_total = $10,
                reference_number = $11, invoice_number = $12, notes = $13, is_active = $14,
                updated_at = $15, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id_typed().as_uuid())
        .bind(to_i64(order.version())?)
        .bind(order.vendor_id().as_uuid())
        .bind(order.order_date())
        .bind(order.expected_delivery_date())
        .bind(order.status().as_str())
        .bind(totals.total_amount.value())
        .bind(totals.total_tax_amount.value())
        .bind(totals.total_discount.value())
        .bind(totals.grand_total.value())
        .bind(order.reference_number())
        .bind(order.invoice_number())
        .bind(order.notes())
        .bind(order.is_active())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        ensure_one_row(result.rows_affected(), "purchase order", order.id_typed())?;
        order.advance_version();
        Ok(())
    }

    async fn next_order_number(&mut self) -> Result<String, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT nextval('purchase_order_number_seq')")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("next_order_number", e))?;
        let n = u64::try_from(n).map_err(|_| {
            StoreError::Corrupt(format!("order number sequence returned {n}"))
        })?;
        Ok(format_order_number(n))
    }
}

#[async_trait]
impl LineItemStore for PgTx {
    #[instrument(level = "debug", skip(self), fields(line_item_id = %id), err)]
    async fn find_line_item(
        &mut self,
        id: LineItemId,
    ) -> Result<Option<PurchaseOrderLineItem>, StoreError> {
        let sql = format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM purchase_order_line_items WHERE id = $1 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_line_item", e))?;

        row.map(|row| {
            LineItemRow::from_row(&row)
                .map_err(|e| corrupt("line item row", e))
                .and_then(PurchaseOrderLineItem::try_from)
        })
        .transpose()
    }

    #[instrument(level = "debug", skip(self), fields(order_id = %order_id), err)]
    async fn find_line_items_by_order(
        &mut self,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<PurchaseOrderLineItem>, StoreError> {
        let sql = format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM purchase_order_line_items \
             WHERE purchase_order_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_line_items_by_order", e))?;

        rows.iter()
            .map(|row| {
                LineItemRow::from_row(row)
                    .map_err(|e| corrupt("line item row", e))
                    .and_then(PurchaseOrderLineItem::try_from)
            })
            .collect()
    }

    #[instrument(level = "debug", skip(self, item), fields(line_item_id = %item.id_typed()), err)]
    async fn save_line_item(&mut self, item: &PurchaseOrderLineItem) -> Result<(), StoreError> {
        let pricing = item.pricing();
        let (warranty_type, warranty_period) = warranty_columns(item.warranty())?;
        sqlx::query(
            r#"
            INSERT INTO purchase_order_line_items (
                id, purchase_order_id, inventory_item_id, warehouse_id, serial_number,
                quantity, received_quantity, unit_price, discount, tax_amount,
                warranty_period_type, warranty_period, rental_rate, replacement_cost,
                late_fee_rate, rent_tax_rate, rentable, selling_price, sell_tax_rate, sellable,
                reference_number, created_by, is_active, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            "#,
        )
        .bind(item.id_typed().as_uuid())
        .bind(item.purchase_order_id().as_uuid())
        .bind(item.inventory_item_id().as_uuid())
        .bind(item.warehouse_id().as_uuid())
        .bind(item.serial_number())
        .bind(i64::from(item.quantity()))
        .bind(i64::from(item.received_quantity()))
        .bind(item.unit_price().value())
        .bind(item.discount().value())
        .bind(item.tax_amount().value())
        .bind(warranty_type)
        .bind(warranty_period)
        .bind(pricing.rental_rate.value())
        .bind(pricing.replacement_cost.value())
        .bind(pricing.late_fee_rate.value())
        .bind(i16::from(pricing.rent_tax_rate.percent()))
        .bind(pricing.rentable)
        .bind(pricing.selling_price.value())
        .bind(i16::from(pricing.sell_tax_rate.percent()))
        .bind(pricing.sellable)
        .bind(item.reference_number())
        .bind(item.created_by())
        .bind(item.is_active())
        .bind(to_i64(item.version())?)
        .bind(item.created_at())
        .bind(item.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_line_item", e))?;
        Ok(())
    }

    #[instrument(
        level = "debug",
        skip(self, item),
        fields(line_item_id = %item.id_typed(), version = item.version()),
        err
    )]
    async fn update_line_item(
        &mut self,
        item: &mut PurchaseOrderLineItem,
    ) -> Result<(), StoreError> {
        let pricing = item.pricing().clone();
        let (warranty_type, warranty_period) = warranty_columns(item.warranty())?;
        let result = sqlx::query(
            r#"
            UPDATE purchase_order_line_items SET
                received_quantity = $3, unit_price = $4, discount = $5, tax_amount = $6,
                warranty_period_type = $7, warranty_period = $8, rental_rate = $9,
                replacement_cost = $10, late_fee_rate = $11, rent_tax_rate = $12,
                rentable = $13, selling_price = $14, sell_tax_rate = $15, sellable = $16,
                is_active = $17, updated_at = $18, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(item.id_typed().as_uuid())
        .bind(to_i64(item.version())?)
        .bind(i64::from(item.received_quantity()))
        .bind(item.unit_price().value())
        .bind(item.discount().value())
        .bind(item.tax_amount().value())
        .bind(warranty_type)
        .bind(warranty_period)
        .bind(pricing.rental_rate.value())
        .bind(pricing.replacement_cost.value())
        .bind(pricing.late_fee_rate.value())
        .bind(i16::from(pricing.rent_tax_rate.percent()))
        .bind(pricing.rentable)
        .bind(pricing.selling_price.value())
        .bind(i16::from(pricing.sell_tax_rate.percent()))
        .bind(pricing.sellable)
        .bind(item.is_active())
        .bind(item.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_line_item", e))?;

        ensure_one_row(result.rows_affected(), "line item", item.id_typed())?;
        item.advance_version();
        Ok(())
    }
}

#[async_trait]
impl StockLineStore for PgTx {
    #[instrument(
        level = "debug",
        skip(self, key),
        fields(item_id = %key.inventory_item_id, warehouse_id = %key.warehouse_id),
        err
    )]
    async fn find_stock_line(
        &mut self,
        key: &StockLineKey,
    ) -> Result<Option<StockLine>, StoreError> {
        let sql = format!(
            "SELECT {STOCK_LINE_COLUMNS} FROM stock_lines \
             WHERE inventory_item_id = $1 AND warehouse_id = $2 \
               AND serial_number IS NOT DISTINCT FROM $3 \
             FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(key.inventory_item_id.as_uuid())
            .bind(key.warehouse_id.as_uuid())
            .bind(key.serial_number.as_deref())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_stock_line", e))?;

        row.map(|row| {
            StockLineRow::from_row(&row)
                .map_err(|e| corrupt("stock line row", e))
                .and_then(StockLine::try_from)
        })
        .transpose()
    }

    #[instrument(level = "debug", skip(self, line), fields(stock_line_id = %line.id_typed()), err)]
    async fn create_stock_line(&mut self, line: &StockLine) -> Result<(), StoreError> {
        let key = line.key();
        let pricing = line.pricing();
        let (warranty_type, warranty_period) = warranty_columns(line.warranty())?;
        sqlx::query(
            r#"
            INSERT INTO stock_lines (
                id, inventory_item_id, warehouse_id, serial_number, quantity,
                rental_rate, replacement_cost, late_fee_rate, rent_tax_rate, rentable,
                selling_price, sell_tax_rate, sellable, warranty_period_type, warranty_period,
                is_active, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19)
            "#,
        )
        .bind(line.id_typed().as_uuid())
        .bind(key.inventory_item_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .bind(key.serial_number.as_deref())
        .bind(i64::from(line.quantity()))
        .bind(pricing.rental_rate.value())
        .bind(pricing.replacement_cost.value())
        .bind(pricing.late_fee_rate.value())
        .bind(i16::from(pricing.rent_tax_rate.percent()))
        .bind(pricing.rentable)
        .bind(pricing.selling_price.value())
        .bind(i16::from(pricing.sell_tax_rate.percent()))
        .bind(pricing.sellable)
        .bind(warranty_type)
        .bind(warranty_period)
        .bind(line.is_active())
        .bind(to_i64(line.version())?)
        .bind(line.created_at())
        .bind(line.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_stock_line", e))?;
        Ok(())
    }

    #[instrument(
        level = "debug",
        skip(self, line),
        fields(stock_line_id = %line.id_typed(), version = line.version()),
        err
    )]
    async fn update_stock_line(&mut self, line: &mut StockLine) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE stock_lines SET
                quantity = $3, is_active = $4, updated_at = $5, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(line.id_typed().as_uuid())
        .bind(to_i64(line.version())?)
        .bind(i64::from(line.quantity()))
        .bind(line.is_active())
        .bind(line.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_stock_line", e))?;

        ensure_one_row(result.rows_affected(), "stock line", line.id_typed())?;
        line.advance_version();
        Ok(())
    }
}

#[async_trait]
impl LedgerAppender for PgTx {
    #[instrument(level = "debug", skip(self, entry), fields(entry_id = %entry.id()), err)]
    async fn append_ledger_entry(&mut self, entry: &StockLedgerEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_ledger_entries (
                id, stock_line_id, movement_type, linked_transaction_id, quantity,
                quantity_before, quantity_after, warehouse_from, warehouse_to, notes, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id().as_uuid())
        .bind(entry.stock_line_id().as_uuid())
        .bind(entry.movement_type().as_str())
        .bind(entry.linked_transaction_id())
        .bind(entry.quantity())
        .bind(entry.quantity_before())
        .bind(entry.quantity_after())
        .bind(entry.warehouse_from().map(|w| *w.as_uuid()))
        .bind(entry.warehouse_to().map(|w| *w.as_uuid()))
        .bind(entry.notes())
        .bind(entry.recorded_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_ledger_entry", e))?;
        Ok(())
    }
}

#[async_trait]
impl PurchasingTx for PgTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Vendor / catalog existence checks against the master-data tables.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VendorLookup for PgDirectory {
    async fn vendor_exists(&self, id: VendorId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM vendors WHERE id = $1 AND is_active)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("vendor_exists", e))
    }
}

#[async_trait]
impl CatalogLookup for PgDirectory {
    async fn catalog_item_exists(&self, id: InventoryItemId) -> Result<bool, StoreError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM inventory_item_masters WHERE id = $1 AND is_active)",
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("catalog_item_exists", e))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation, serialization failure, deadlock.
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("{operation} failed: {other}")),
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("failed to decode {what}: {err}"))
}

fn ensure_one_row(
    rows_affected: u64,
    what: &str,
    id: impl std::fmt::Display,
) -> Result<(), StoreError> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "{what} {id} was modified concurrently or no longer exists"
        )))
    }
}

fn to_i64(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Corrupt(format!("version {version} overflows")))
}

fn warranty_columns(
    warranty: Option<WarrantyPeriod>,
) -> Result<(Option<&'static str>, Option<i32>), StoreError> {
    match warranty {
        None => Ok((None, None)),
        Some(w) => {
            let period = i32::try_from(w.period())
                .map_err(|_| StoreError::Corrupt(format!("warranty period {} overflows", w.period())))?;
            Ok((Some(w.period_type().as_str()), Some(period)))
        }
    }
}

fn warranty_from_columns(
    period_type: Option<String>,
    period: Option<i32>,
) -> Result<Option<WarrantyPeriod>, StoreError> {
    let period_type = period_type
        .as_deref()
        .map(WarrantyPeriodType::parse)
        .transpose()
        .map_err(|e| corrupt("warranty type", e))?;
    let period = period
        .map(u32::try_from)
        .transpose()
        .map_err(|e| corrupt("warranty period", e))?;
    WarrantyPeriod::from_parts(period_type, period).map_err(|e| corrupt("warranty", e))
}

fn quantity(value: i64) -> Result<Quantity, StoreError> {
    Quantity::new(value).map_err(|e| corrupt("quantity", e))
}

fn amount(value: Decimal) -> Result<Amount, StoreError> {
    Amount::new(value).map_err(|e| corrupt("amount", e))
}

fn tax_rate(value: i16) -> Result<TaxRate, StoreError> {
    TaxRate::new(i64::from(value)).map_err(|e| corrupt("tax rate", e))
}

fn version(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|e| corrupt("version", e))
}

// SQLx row types

#[derive(Debug)]
struct PurchaseOrderRow {
    id: Uuid,
    order_number: String,
    vendor_id: Uuid,
    order_date: NaiveDate,
    expected_delivery_date: Option<NaiveDate>,
    status: String,
    total_amount: Decimal,
    total_tax_amount: Decimal,
    total_discount: Decimal,
    grand_total: Decimal,
    reference_number: Option<String>,
    invoice_number: Option<String>,
    notes: Option<String>,
    created_by: Option<String>,
    is_active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PurchaseOrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PurchaseOrderRow {
            id: row.try_get("id")?,
            order_number: row.try_get("order_number")?,
            vendor_id: row.try_get("vendor_id")?,
            order_date: row.try_get("order_date")?,
            expected_delivery_date: row.try_get("expected_delivery_date")?,
            status: row.try_get("status")?,
            total_amount: row.try_get("total_amount")?,
            total_tax_amount: row.try_get("total_tax_amount")?,
            total_discount: row.try_get("total_discount")?,
            grand_total: row.try_get("grand_total")?,
            reference_number: row.try_get("reference_number")?,
            invoice_number: row.try_get("invoice_number")?,
            notes: row.try_get("notes")?,
            created_by: row.try_get("created_by")?,
            is_active: row.try_get("is_active")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<PurchaseOrderRow> for PurchaseOrder {
    type Error = StoreError;

    fn try_from(row: PurchaseOrderRow) -> Result<Self, Self::Error> {
        let state = PurchaseOrderState {
            id: PurchaseOrderId::from_uuid(row.id),
            order_number: row.order_number,
            vendor_id: VendorId::from_uuid(row.vendor_id),
            order_date: row.order_date,
            expected_delivery_date: row.expected_delivery_date,
            status: PurchaseOrderStatus::parse(&row.status).map_err(|e| corrupt("status", e))?,
            totals: OrderTotals {
                total_amount: amount(row.total_amount)?,
                total_tax_amount: amount(row.total_tax_amount)?,
                total_discount: amount(row.total_discount)?,
                grand_total: amount(row.grand_total)?,
            },
            reference_number: row.reference_number,
            invoice_number: row.invoice_number,
            notes: row.notes,
            created_by: row.created_by,
            is_active: row.is_active,
            version: version(row.version)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        PurchaseOrder::restore(state).map_err(|e| corrupt("purchase order", e))
    }
}

#[derive(Debug)]
struct LineItemRow {
    id: Uuid,
    purchase_order_id: Uuid,
    inventory_item_id: Uuid,
    warehouse_id: Uuid,
    serial_number: Option<String>,
    quantity: i64,
    received_quantity: i64,
    unit_price: Decimal,
    discount: Decimal,
    tax_amount: Decimal,
    warranty_period_type: Option<String>,
    warranty_period: Option<i32>,
    pricing: PricingColumns,
    reference_number: Option<String>,
    created_by: Option<String>,
    is_active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Rental / sale columns shared by line items and stock lines.
#[derive(Debug)]
struct PricingColumns {
    rental_rate: Decimal,
    replacement_cost: Decimal,
    late_fee_rate: Decimal,
    rent_tax_rate: i16,
    rentable: bool,
    selling_price: Decimal,
    sell_tax_rate: i16,
    sellable: bool,
}

impl PricingColumns {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(PricingColumns {
            rental_rate: row.try_get("rental_rate")?,
            replacement_cost: row.try_get("replacement_cost")?,
            late_fee_rate: row.try_get("late_fee_rate")?,
            rent_tax_rate: row.try_get("rent_tax_rate")?,
            rentable: row.try_get("rentable")?,
            selling_price: row.try_get("selling_price")?,
            sell_tax_rate: row.try_get("sell_tax_rate")?,
            sellable: row.try_get("sellable")?,
        })
    }

    fn into_pricing(self) -> Result<StockPricing, StoreError> {
        Ok(StockPricing {
            rental_rate: amount(self.rental_rate)?,
            replacement_cost: amount(self.replacement_cost)?,
            late_fee_rate: amount(self.late_fee_rate)?,
            rent_tax_rate: tax_rate(self.rent_tax_rate)?,
            rentable: self.rentable,
            selling_price: amount(self.selling_price)?,
            sell_tax_rate: tax_rate(self.sell_tax_rate)?,
            sellable: self.sellable,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for LineItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LineItemRow {
            id: row.try_get("id")?,
            purchase_order_id: row.try_get("purchase_order_id")?,
            inventory_item_id: row.try_get("inventory_item_id")?,
            warehouse_id: row.try_get("warehouse_id")?,
            serial_number: row.try_get("serial_number")?,
            quantity: row.try_get("quantity")?,
            received_quantity: row.try_get("received_quantity")?,
            unit_price: row.try_get("unit_price")?,
            discount: row.try_get("discount")?,
            tax_amount: row.try_get("tax_amount")?,
            warranty_period_type: row.try_get("warranty_period_type")?,
            warranty_period: row.try_get("warranty_period")?,
            pricing: PricingColumns::from_row(row)?,
            reference_number: row.try_get("reference_number")?,
            created_by: row.try_get("created_by")?,
            is_active: row.try_get("is_active")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<LineItemRow> for PurchaseOrderLineItem {
    type Error = StoreError;

    fn try_from(row: LineItemRow) -> Result<Self, Self::Error> {
        let state = LineItemState {
            id: LineItemId::from_uuid(row.id),
            purchase_order_id: PurchaseOrderId::from_uuid(row.purchase_order_id),
            inventory_item_id: InventoryItemId::from_uuid(row.inventory_item_id),
            warehouse_id: WarehouseId::from_uuid(row.warehouse_id),
            serial_number: row.serial_number,
            quantity: quantity(row.quantity)?,
            received_quantity: quantity(row.received_quantity)?,
            unit_price: amount(row.unit_price)?,
            discount: amount(row.discount)?,
            tax_amount: amount(row.tax_amount)?,
            warranty: warranty_from_columns(row.warranty_period_type, row.warranty_period)?,
            pricing: row.pricing.into_pricing()?,
            reference_number: row.reference_number,
            created_by: row.created_by,
            is_active: row.is_active,
            version: version(row.version)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        PurchaseOrderLineItem::restore(state).map_err(|e| corrupt("line item", e))
    }
}

#[derive(Debug)]
struct StockLineRow {
    id: Uuid,
    inventory_item_id: Uuid,
    warehouse_id: Uuid,
    serial_number: Option<String>,
    quantity: i64,
    pricing: PricingColumns,
    warranty_period_type: Option<String>,
    warranty_period: Option<i32>,
    is_active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for StockLineRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockLineRow {
            id: row.try_get("id")?,
            inventory_item_id: row.try_get("inventory_item_id")?,
            warehouse_id: row.try_get("warehouse_id")?,
            serial_number: row.try_get("serial_number")?,
            quantity: row.try_get("quantity")?,
            pricing: PricingColumns::from_row(row)?,
            warranty_period_type: row.try_get("warranty_period_type")?,
            warranty_period: row.try_get("warranty_period")?,
            is_active: row.try_get("is_active")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<StockLineRow> for StockLine {
    type Error = StoreError;

    fn try_from(row: StockLineRow) -> Result<Self, Self::Error> {
        let state = StockLineState {
            id: StockLineId::from_uuid(row.id),
            key: StockLineKey::new(
                InventoryItemId::from_uuid(row.inventory_item_id),
                WarehouseId::from_uuid(row.warehouse_id),
                row.serial_number,
            ),
            quantity: quantity(row.quantity)?,
            pricing: row.pricing.into_pricing()?,
            warranty: warranty_from_columns(row.warranty_period_type, row.warranty_period)?,
            version: version(row.version)?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        StockLine::restore(state).map_err(|e| corrupt("stock line", e))
    }
}

#[derive(Debug)]
struct LedgerEntryRow {
    id: Uuid,
    stock_line_id: Uuid,
    movement_type: String,
    linked_transaction_id: String,
    quantity: i64,
    quantity_before: i64,
    quantity_after: i64,
    warehouse_from: Option<Uuid>,
    warehouse_to: Option<Uuid>,
    notes: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for LedgerEntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LedgerEntryRow {
            id: row.try_get("id")?,
            stock_line_id: row.try_get("stock_line_id")?,
            movement_type: row.try_get("movement_type")?,
            linked_transaction_id: row.try_get("linked_transaction_id")?,
            quantity: row.try_get("quantity")?,
            quantity_before: row.try_get("quantity_before")?,
            quantity_after: row.try_get("quantity_after")?,
            warehouse_from: row.try_get("warehouse_from")?,
            warehouse_to: row.try_get("warehouse_to")?,
            notes: row.try_get("notes")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl TryFrom<LedgerEntryRow> for StockLedgerEntry {
    type Error = StoreError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        let entry = NewLedgerEntry {
            stock_line_id: StockLineId::from_uuid(row.stock_line_id),
            movement_type: MovementType::parse(&row.movement_type)
                .map_err(|e| corrupt("movement type", e))?,
            linked_transaction_id: row.linked_transaction_id,
            quantity: row.quantity,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            warehouse_from: row.warehouse_from.map(WarehouseId::from_uuid),
            warehouse_to: row.warehouse_to.map(WarehouseId::from_uuid),
            notes: row.notes,
            recorded_at: row.recorded_at,
        };
        StockLedgerEntry::restore(LedgerEntryId::from_uuid(row.id), entry)
            .map_err(|e| corrupt("ledger entry", e))
    }
}
