use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use async_trait::async_trait;

use procura_core::{
    AggregateRoot, DomainError, ExpectedVersion, InventoryItemId, LineItemId, PurchaseOrderId,
    StockLineId, VendorId,
};
use procura_inventory::{StockLedgerEntry, StockLine, StockLineKey};
use procura_purchasing::{PurchaseOrder, PurchaseOrderLineItem};

use super::r#trait::{
    format_order_number, CatalogLookup, LedgerAppender, LineItemStore, OrderStore,
    PurchasingStore, PurchasingTx, StockLineStore, StoreError, VendorLookup,
};

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<PurchaseOrderId, PurchaseOrder>,
    line_items: HashMap<LineItemId, PurchaseOrderLineItem>,
    stock_lines: HashMap<StockLineId, StockLine>,
    stock_keys: HashMap<StockLineKey, StockLineId>,
    ledger: Vec<StockLedgerEntry>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory purchasing store with optimistic, all-or-nothing commits.
///
/// Intended for tests/dev. Transactions stage their writes privately; at
/// commit, under the write lock, every updated record must still be at the
/// version the transaction read, and no competing stock line may have been
/// created for the same key. Otherwise the commit fails with
/// [`StoreError::Conflict`] and nothing is applied.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPurchasingStore {
    tables: Arc<RwLock<Tables>>,
    order_sequence: Arc<AtomicU64>,
}

impl InMemoryPurchasingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(poisoned)
    }

    /// Committed state of an order.
    pub fn order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, StoreError> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    /// Committed state of a line item.
    pub fn line_item(&self, id: LineItemId) -> Result<Option<PurchaseOrderLineItem>, StoreError> {
        Ok(self.read()?.line_items.get(&id).cloned())
    }

    /// Committed stock line for a key.
    pub fn stock_line(&self, key: &StockLineKey) -> Result<Option<StockLine>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .stock_keys
            .get(key)
            .and_then(|id| tables.stock_lines.get(id))
            .cloned())
    }

    /// Every committed ledger entry, in append order.
    pub fn ledger_entries(&self) -> Result<Vec<StockLedgerEntry>, StoreError> {
        Ok(self.read()?.ledger.clone())
    }

    pub fn ledger_for_stock_line(
        &self,
        stock_line_id: StockLineId,
    ) -> Result<Vec<StockLedgerEntry>, StoreError> {
        Ok(self
            .read()?
            .ledger
            .iter()
            .filter(|e| e.stock_line_id() == stock_line_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PurchasingStore for InMemoryPurchasingStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, StoreError> {
        Ok(InMemoryTx {
            tables: Arc::clone(&self.tables),
            order_sequence: Arc::clone(&self.order_sequence),
            orders: HashMap::new(),
            line_items: HashMap::new(),
            stock_lines: HashMap::new(),
            ledger: Vec::new(),
        })
    }
}

/// A staged write. `base_version` is the committed version the transaction
/// read, or `None` for a record created by this transaction.
#[derive(Debug)]
struct Staged<T> {
    record: T,
    base_version: Option<u64>,
}

/// A record the store keeps under optimistic versioning. Identity and
/// version come from [`AggregateRoot`]; the store owns the bump.
trait Versioned: AggregateRoot<Id: Copy> + Clone {
    fn advance_version(&mut self);
}

impl Versioned for PurchaseOrder {
    fn advance_version(&mut self) {
        PurchaseOrder::advance_version(self)
    }
}

impl Versioned for PurchaseOrderLineItem {
    fn advance_version(&mut self) {
        PurchaseOrderLineItem::advance_version(self)
    }
}

impl Versioned for StockLine {
    fn advance_version(&mut self) {
        StockLine::advance_version(self)
    }
}

fn version_conflict(what: &str, key: &impl Debug, err: DomainError) -> StoreError {
    StoreError::Conflict(format!("{what} {key:?}: {err}"))
}

fn stage_create<T: Versioned>(
    staged: &mut HashMap<T::Id, Staged<T>>,
    committed: &HashMap<T::Id, T>,
    record: &T,
    what: &str,
) -> Result<(), StoreError> {
    let key = *AggregateRoot::id(record);
    if staged.contains_key(&key) || committed.contains_key(&key) {
        return Err(StoreError::Conflict(format!("{what} {key:?} already exists")));
    }
    staged.insert(
        key,
        Staged {
            record: record.clone(),
            base_version: None,
        },
    );
    Ok(())
}

fn stage_update<T: Versioned>(
    staged: &mut HashMap<T::Id, Staged<T>>,
    committed: &HashMap<T::Id, T>,
    record: &mut T,
    what: &str,
) -> Result<(), StoreError> {
    let key = *AggregateRoot::id(record);
    let (current, base_version) = match (staged.get(&key), committed.get(&key)) {
        (Some(s), _) => (AggregateRoot::version(&s.record), s.base_version),
        (None, Some(c)) => {
            let version = AggregateRoot::version(c);
            (version, Some(version))
        }
        (None, None) => {
            return Err(StoreError::Conflict(format!("{what} {key:?} does not exist")));
        }
    };
    ExpectedVersion::of(&*record)
        .check(current)
        .map_err(|e| version_conflict(what, &key, e))?;
    record.advance_version();
    staged.insert(
        key,
        Staged {
            record: record.clone(),
            base_version,
        },
    );
    Ok(())
}

fn check_staged<T: Versioned>(
    staged: &HashMap<T::Id, Staged<T>>,
    committed: &HashMap<T::Id, T>,
    what: &str,
) -> Result<(), StoreError> {
    for (key, s) in staged {
        match (s.base_version, committed.get(key)) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(StoreError::Conflict(format!(
                    "{what} {key:?} was created concurrently"
                )));
            }
            (Some(base), Some(current)) => {
                ExpectedVersion::Exact(base)
                    .check(AggregateRoot::version(current))
                    .map_err(|e| version_conflict(what, key, e))?;
            }
            (Some(_), None) => {
                return Err(StoreError::Conflict(format!("{what} {key:?} disappeared")));
            }
        }
    }
    Ok(())
}

fn apply_staged<T: Versioned>(
    staged: HashMap<T::Id, Staged<T>>,
    committed: &mut HashMap<T::Id, T>,
) {
    for (key, s) in staged {
        committed.insert(key, s.record);
    }
}

/// Transaction over [`InMemoryPurchasingStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    tables: Arc<RwLock<Tables>>,
    order_sequence: Arc<AtomicU64>,
    orders: HashMap<PurchaseOrderId, Staged<PurchaseOrder>>,
    line_items: HashMap<LineItemId, Staged<PurchaseOrderLineItem>>,
    stock_lines: HashMap<StockLineId, Staged<StockLine>>,
    ledger: Vec<StockLedgerEntry>,
}

impl InMemoryTx {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(poisoned)
    }
}

#[async_trait]
impl OrderStore for InMemoryTx {
    async fn find_order(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        if let Some(s) = self.orders.get(&id) {
            return Ok(Some(s.record.clone()));
        }
        Ok(self.read()?.orders.get(&id).cloned())
    }

    async fn save_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        stage_create(&mut self.orders, &tables.orders, order, "purchase order")
    }

    async fn update_order(&mut self, order: &mut PurchaseOrder) -> Result<(), StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        stage_update(&mut self.orders, &tables.orders, order, "purchase order")
    }

    async fn next_order_number(&mut self) -> Result<String, StoreError> {
        let n = self.order_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format_order_number(n))
    }
}

#[async_trait]
impl LineItemStore for InMemoryTx {
    async fn find_line_item(
        &mut self,
        id: LineItemId,
    ) -> Result<Option<PurchaseOrderLineItem>, StoreError> {
        if let Some(s) = self.line_items.get(&id) {
            return Ok(Some(s.record.clone()));
        }
        Ok(self.read()?.line_items.get(&id).cloned())
    }

    async fn find_line_items_by_order(
        &mut self,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<PurchaseOrderLineItem>, StoreError> {
        let tables = self.read()?;
        let mut merged: HashMap<LineItemId, PurchaseOrderLineItem> = tables
            .line_items
            .values()
            .filter(|l| l.purchase_order_id() == order_id)
            .map(|l| (l.id_typed(), l.clone()))
            .collect();
        for (id, s) in &self.line_items {
            if s.record.purchase_order_id() == order_id {
                merged.insert(*id, s.record.clone());
            }
        }

        let mut lines: Vec<_> = merged.into_values().collect();
        lines.sort_by_key(|l| (l.created_at(), *l.id_typed().as_uuid()));
        Ok(lines)
    }

    async fn save_line_item(&mut self, item: &PurchaseOrderLineItem) -> Result<(), StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        stage_create(&mut self.line_items, &tables.line_items, item, "line item")
    }

    async fn update_line_item(
        &mut self,
        item: &mut PurchaseOrderLineItem,
    ) -> Result<(), StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        stage_update(&mut self.line_items, &tables.line_items, item, "line item")
    }
}

#[async_trait]
impl StockLineStore for InMemoryTx {
    async fn find_stock_line(
        &mut self,
        key: &StockLineKey,
    ) -> Result<Option<StockLine>, StoreError> {
        if let Some(s) = self.stock_lines.values().find(|s| s.record.key() == key) {
            return Ok(Some(s.record.clone()));
        }
        let tables = self.read()?;
        Ok(tables
            .stock_keys
            .get(key)
            .and_then(|id| tables.stock_lines.get(id))
            .cloned())
    }

    async fn create_stock_line(&mut self, line: &StockLine) -> Result<(), StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let key = line.key();
        let staged_dup = self.stock_lines.values().any(|s| s.record.key() == key);
        if staged_dup || tables.stock_keys.contains_key(key) {
            return Err(StoreError::Conflict(format!(
                "stock line for item {} in warehouse {} already exists",
                key.inventory_item_id, key.warehouse_id
            )));
        }
        stage_create(&mut self.stock_lines, &tables.stock_lines, line, "stock line")
    }

    async fn update_stock_line(&mut self, line: &mut StockLine) -> Result<(), StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        stage_update(&mut self.stock_lines, &tables.stock_lines, line, "stock line")
    }
}

#[async_trait]
impl LedgerAppender for InMemoryTx {
    async fn append_ledger_entry(&mut self, entry: &StockLedgerEntry) -> Result<(), StoreError> {
        self.ledger.push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl PurchasingTx for InMemoryTx {
    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTx {
            tables,
            orders,
            line_items,
            stock_lines,
            ledger,
            ..
        } = self;

        let mut tables = tables.write().map_err(poisoned)?;

        check_staged(&orders, &tables.orders, "purchase order")?;
        check_staged(&line_items, &tables.line_items, "line item")?;
        check_staged(&stock_lines, &tables.stock_lines, "stock line")?;
        for s in stock_lines.values().filter(|s| s.base_version.is_none()) {
            if tables.stock_keys.contains_key(s.record.key()) {
                return Err(StoreError::Conflict(format!(
                    "stock line for item {} in warehouse {} was created concurrently",
                    s.record.key().inventory_item_id,
                    s.record.key().warehouse_id
                )));
            }
        }

        for s in stock_lines.values() {
            tables
                .stock_keys
                .insert(s.record.key().clone(), s.record.id_typed());
        }
        apply_staged(orders, &mut tables.orders);
        apply_staged(line_items, &mut tables.line_items);
        apply_staged(stock_lines, &mut tables.stock_lines);
        tables.ledger.extend(ledger);
        Ok(())
    }
}

/// In-memory vendor / catalog directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    vendors: Arc<RwLock<HashSet<VendorId>>>,
    catalog_items: Arc<RwLock<HashSet<InventoryItemId>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(
        vendors: impl IntoIterator<Item = VendorId>,
        catalog_items: impl IntoIterator<Item = InventoryItemId>,
    ) -> Self {
        Self {
            vendors: Arc::new(RwLock::new(vendors.into_iter().collect())),
            catalog_items: Arc::new(RwLock::new(catalog_items.into_iter().collect())),
        }
    }

    pub fn add_vendor(&self, id: VendorId) -> Result<(), StoreError> {
        self.vendors.write().map_err(poisoned)?.insert(id);
        Ok(())
    }

    pub fn add_catalog_item(&self, id: InventoryItemId) -> Result<(), StoreError> {
        self.catalog_items.write().map_err(poisoned)?.insert(id);
        Ok(())
    }
}

#[async_trait]
impl VendorLookup for InMemoryDirectory {
    async fn vendor_exists(&self, id: VendorId) -> Result<bool, StoreError> {
        Ok(self.vendors.read().map_err(poisoned)?.contains(&id))
    }
}

#[async_trait]
impl CatalogLookup for InMemoryDirectory {
    async fn catalog_item_exists(&self, id: InventoryItemId) -> Result<bool, StoreError> {
        Ok(self.catalog_items.read().map_err(poisoned)?.contains(&id))
    }
}
