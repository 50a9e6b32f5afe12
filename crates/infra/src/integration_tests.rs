//! Integration tests for the purchasing pipeline on the in-memory store.
//!
//! Tests: PurchaseOrderService → ReceivingService → store (orders, line
//! items, stock lines, ledger)
//!
//! Verifies:
//! - Receipts move line items, stock lines and the ledger together
//! - Failed batches leave no trace
//! - Concurrent receipts never over-receive a line item

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use procura_core::{
        InventoryItemId, LineItemId, PurchaseOrderId, VendorId, WarehouseId,
    };
    use procura_inventory::{MovementType, StockLedgerEntry, StockLine, StockLineKey};
    use procura_purchasing::{
        NewLineItem, PurchaseOrder, PurchaseOrderLineItem, PurchaseOrderStatus, PurchasingError,
    };

    use crate::orders::{
        CreatePurchaseOrder, PurchaseOrderDetails, PurchaseOrderService, UpdatePurchaseOrder,
    };
    use crate::receiving::{ReceiveItem, ReceivingService, RetryPolicy};
    use crate::store::{
        InMemoryDirectory, InMemoryPurchasingStore, InMemoryTx, LedgerAppender, LineItemStore,
        OrderStore, PurchasingStore, PurchasingTx, StockLineStore, StoreError,
    };

    struct Fixture {
        store: InMemoryPurchasingStore,
        directory: InMemoryDirectory,
        orders: PurchaseOrderService<InMemoryPurchasingStore, InMemoryDirectory>,
        receiving: ReceivingService<InMemoryPurchasingStore>,
        vendor: VendorId,
        warehouse: WarehouseId,
    }

    fn fixture() -> Fixture {
        let store = InMemoryPurchasingStore::new();
        let vendor = VendorId::new();
        let directory = InMemoryDirectory::with_entries([vendor], Vec::<InventoryItemId>::new());
        Fixture {
            orders: PurchaseOrderService::new(store.clone(), directory.clone()),
            receiving: ReceivingService::new(store.clone()),
            store,
            directory,
            vendor,
            warehouse: WarehouseId::new(),
        }
    }

    fn create_request(f: &Fixture, items: Vec<NewLineItem>) -> CreatePurchaseOrder {
        CreatePurchaseOrder {
            vendor_id: f.vendor,
            order_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            expected_delivery_date: None,
            reference_number: None,
            invoice_number: None,
            notes: None,
            created_by: Some("buyer@example.com".to_string()),
            items,
        }
    }

    /// A placed (ORDERED) order with one line per quantity, each for its own
    /// catalog item.
    async fn ordered_with(f: &Fixture, quantities: &[i64]) -> PurchaseOrderDetails {
        let items = quantities
            .iter()
            .map(|&qty| {
                let item = InventoryItemId::new();
                f.directory.add_catalog_item(item).unwrap();
                NewLineItem::new(item, f.warehouse, qty, dec!(10.00))
            })
            .collect();
        let created = f.orders.create(create_request(f, items)).await.unwrap();
        f.orders.mark_ordered(created.order.id_typed()).await.unwrap();
        f.orders.details(created.order.id_typed()).await.unwrap()
    }

    fn line(f: &Fixture, id: LineItemId) -> PurchaseOrderLineItem {
        f.store.line_item(id).unwrap().unwrap()
    }

    fn order(f: &Fixture, id: PurchaseOrderId) -> PurchaseOrder {
        f.store.order(id).unwrap().unwrap()
    }

    fn stock_line(f: &Fixture, key: &StockLineKey) -> Option<StockLine> {
        f.store.stock_line(key).unwrap()
    }

    fn ledger(f: &Fixture) -> Vec<StockLedgerEntry> {
        f.store.ledger_entries().unwrap()
    }

    #[tokio::test]
    async fn partial_then_full_receipt_then_rejected() {
        let f = fixture();
        let details = ordered_with(&f, &[10]).await;
        let order_id = details.order.id_typed();
        let line_id = details.line_items[0].id_typed();
        let key = details.line_items[0].stock_key();

        let first = f
            .receiving
            .receive_items(order_id, &[ReceiveItem::new(line_id, 4)])
            .await
            .unwrap();
        assert_eq!(first.order.status(), PurchaseOrderStatus::PartialReceived);
        assert_eq!(u32::from(line(&f, line_id).received_quantity()), 4);
        let entry = &first.ledger_entries[0];
        assert_eq!(entry.movement_type(), MovementType::Purchase);
        assert_eq!((entry.quantity(), entry.quantity_before(), entry.quantity_after()), (4, 0, 4));
        assert_eq!(entry.linked_transaction_id(), details.order.order_number());
        assert_eq!(entry.warehouse_to(), Some(f.warehouse));

        let second = f
            .receiving
            .receive_items(order_id, &[ReceiveItem::new(line_id, 6)])
            .await
            .unwrap();
        assert_eq!(second.order.status(), PurchaseOrderStatus::Received);
        let entry = &second.ledger_entries[0];
        assert_eq!((entry.quantity(), entry.quantity_before(), entry.quantity_after()), (6, 4, 10));
        assert_eq!(u32::from(stock_line(&f, &key).unwrap().quantity()), 10);

        let err = f
            .receiving
            .receive_items(order_id, &[ReceiveItem::new(line_id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchasingError::NotReceivable {
                status: PurchaseOrderStatus::Received,
                ..
            }
        ));
        assert_eq!(ledger(&f).len(), 2);
        assert_eq!(u32::from(line(&f, line_id).received_quantity()), 10);
    }

    #[tokio::test]
    async fn mixed_batch_recomputes_status_once() {
        let f = fixture();
        let details = ordered_with(&f, &[5, 3]).await;
        let order_id = details.order.id_typed();
        let a = details.line_items[0].id_typed();
        let b = details.line_items[1].id_typed();

        let outcome = f
            .receiving
            .receive_items(order_id, &[ReceiveItem::new(a, 5), ReceiveItem::new(b, 2)])
            .await
            .unwrap();

        assert_eq!(outcome.order.status(), PurchaseOrderStatus::PartialReceived);
        assert_eq!(outcome.ledger_entries.len(), 2);
        assert_eq!(ledger(&f).len(), 2);
        assert!(line(&f, a).is_fully_received());
        assert!(line(&f, b).is_partially_received());
    }

    #[tokio::test]
    async fn over_receipt_rolls_back_the_whole_batch() {
        let f = fixture();
        let details = ordered_with(&f, &[4, 2]).await;
        let order_id = details.order.id_typed();
        let a = details.line_items[0].id_typed();
        let b = details.line_items[1].id_typed();

        let err = f
            .receiving
            .receive_items(order_id, &[ReceiveItem::new(a, 4), ReceiveItem::new(b, 3)])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PurchasingError::OverReceipt {
                line_item_id: b,
                ordered: 2,
                already_received: 0,
                requested: 3,
            }
        );
        assert!(line(&f, a).received_quantity().is_zero());
        assert!(line(&f, b).received_quantity().is_zero());
        assert!(stock_line(&f, &details.line_items[0].stock_key()).is_none());
        assert!(ledger(&f).is_empty());
        assert_eq!(order(&f, order_id).status(), PurchaseOrderStatus::Ordered);
    }

    #[tokio::test]
    async fn receiving_a_draft_or_unknown_order_fails() {
        let f = fixture();
        let item = InventoryItemId::new();
        f.directory.add_catalog_item(item).unwrap();
        let draft = f
            .orders
            .create(create_request(&f, vec![NewLineItem::new(item, f.warehouse, 2, dec!(1))]))
            .await
            .unwrap();
        let line_id = draft.line_items[0].id_typed();

        let err = f
            .receiving
            .receive_items(draft.order.id_typed(), &[ReceiveItem::new(line_id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, PurchasingError::NotReceivable { .. }));

        let missing = PurchaseOrderId::new();
        let err = f
            .receiving
            .receive_items(missing, &[ReceiveItem::new(line_id, 1)])
            .await
            .unwrap_err();
        assert_eq!(err, PurchasingError::OrderNotFound(missing));
    }

    #[tokio::test]
    async fn line_item_from_another_order_is_rejected() {
        let f = fixture();
        let first = ordered_with(&f, &[3]).await;
        let second = ordered_with(&f, &[3]).await;
        let foreign = second.line_items[0].id_typed();

        let err = f
            .receiving
            .receive_items(first.order.id_typed(), &[ReceiveItem::new(foreign, 1)])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PurchasingError::LineItemMismatch {
                line_item_id: foreign,
                expected_order_id: first.order.id_typed(),
                actual_order_id: second.order.id_typed(),
            }
        );
        assert!(ledger(&f).is_empty());
    }

    #[tokio::test]
    async fn zero_quantity_never_reaches_the_store() {
        let f = fixture();
        let details = ordered_with(&f, &[3]).await;
        let line_id = details.line_items[0].id_typed();

        let err = f
            .receiving
            .receive_items(details.order.id_typed(), &[ReceiveItem::new(line_id, 0)])
            .await
            .unwrap_err();

        assert!(matches!(err, PurchasingError::InvalidQuantity { quantity: 0, .. }));
        assert!(ledger(&f).is_empty());
    }

    #[tokio::test]
    async fn same_line_twice_in_one_batch_accumulates() {
        let f = fixture();
        let details = ordered_with(&f, &[5]).await;
        let line_id = details.line_items[0].id_typed();

        let outcome = f
            .receiving
            .receive_items(
                details.order.id_typed(),
                &[ReceiveItem::new(line_id, 2), ReceiveItem::new(line_id, 3)],
            )
            .await
            .unwrap();

        assert_eq!(outcome.order.status(), PurchaseOrderStatus::Received);
        let pairs: Vec<_> = outcome
            .ledger_entries
            .iter()
            .map(|e| (e.quantity_before(), e.quantity_after()))
            .collect();
        assert_eq!(pairs, vec![(0, 2), (2, 5)]);
    }

    #[tokio::test]
    async fn stock_line_is_shared_across_orders_and_keeps_first_pricing() {
        let f = fixture();
        let item = InventoryItemId::new();
        f.directory.add_catalog_item(item).unwrap();

        let mut cheap = NewLineItem::new(item, f.warehouse, 3, dec!(5));
        cheap.rental_rate = dec!(1.50);
        let mut pricey = NewLineItem::new(item, f.warehouse, 2, dec!(9));
        pricey.rental_rate = dec!(4.00);

        let mut ids = Vec::new();
        for new_line in [cheap, pricey] {
            let created = f.orders.create(create_request(&f, vec![new_line])).await.unwrap();
            f.orders.mark_ordered(created.order.id_typed()).await.unwrap();
            ids.push((created.order.id_typed(), created.line_items[0].id_typed()));
        }

        for (order_id, line_id) in &ids {
            let qty = if *line_id == ids[0].1 { 3 } else { 2 };
            f.receiving
                .receive_items(*order_id, &[ReceiveItem::new(*line_id, qty)])
                .await
                .unwrap();
        }

        let key = StockLineKey::new(item, f.warehouse, None);
        let stock = stock_line(&f, &key).unwrap();
        assert_eq!(u32::from(stock.quantity()), 5);
        assert_eq!(stock.pricing().rental_rate.value(), dec!(1.50));

        let entries = f.store.ledger_for_stock_line(stock.id_typed()).unwrap();
        let pairs: Vec<_> = entries
            .iter()
            .map(|e| (e.quantity_before(), e.quantity_after()))
            .collect();
        assert_eq!(pairs, vec![(0, 3), (3, 5)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_receipts_never_over_receive() {
        for _ in 0..20 {
            let f = fixture();
            let details = ordered_with(&f, &[5]).await;
            let order_id = details.order.id_typed();
            let line_id = details.line_items[0].id_typed();

            let handles: Vec<_> = [3, 4]
                .into_iter()
                .map(|qty| {
                    let receiving = f.receiving.clone();
                    tokio::spawn(async move {
                        receiving
                            .receive_items(order_id, &[ReceiveItem::new(line_id, qty)])
                            .await
                    })
                })
                .collect();

            let mut successes = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => successes += 1,
                    Err(PurchasingError::OverReceipt { .. })
                    | Err(PurchasingError::ConcurrencyConflict(_)) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            assert_eq!(successes, 1);
            let received = u32::from(line(&f, line_id).received_quantity());
            assert!(received == 3 || received == 4);
            let entries = ledger(&f);
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].quantity_after(), i64::from(received));
            assert_eq!(order(&f, order_id).status(), PurchaseOrderStatus::PartialReceived);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_receipts_on_different_lines_both_land() {
        let f = fixture();
        let details = ordered_with(&f, &[2, 2]).await;
        let order_id = details.order.id_typed();

        let handles: Vec<_> = details
            .line_items
            .iter()
            .map(|l| {
                let receiving = f
                    .receiving
                    .clone()
                    .with_retry_policy(RetryPolicy::new(10));
                let line_id = l.id_typed();
                tokio::spawn(async move {
                    receiving
                        .receive_items(order_id, &[ReceiveItem::new(line_id, 2)])
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Whichever batch committed last saw both lines fully received.
        assert_eq!(order(&f, order_id).status(), PurchaseOrderStatus::Received);
        assert_eq!(ledger(&f).len(), 2);
    }

    /// Store that injects failures into the in-memory store: the first
    /// `commit_conflicts` commits report a conflict, and with
    /// `failing_append` set, that ledger append (1-based, per transaction)
    /// fails as a backend error.
    #[derive(Clone)]
    struct FlakyStore {
        inner: InMemoryPurchasingStore,
        commit_conflicts: Arc<AtomicU32>,
        failing_append: Option<u32>,
        begins: Arc<AtomicU32>,
    }

    impl FlakyStore {
        fn conflicting_commits(inner: InMemoryPurchasingStore, count: u32) -> Self {
            Self {
                inner,
                commit_conflicts: Arc::new(AtomicU32::new(count)),
                failing_append: None,
                begins: Arc::new(AtomicU32::new(0)),
            }
        }

        fn backend_failure_on_append(inner: InMemoryPurchasingStore, nth: u32) -> Self {
            Self {
                failing_append: Some(nth),
                ..Self::conflicting_commits(inner, 0)
            }
        }

        fn begins(&self) -> u32 {
            self.begins.load(Ordering::SeqCst)
        }
    }

    struct FlakyTx {
        inner: InMemoryTx,
        commit_conflicts: Arc<AtomicU32>,
        failing_append: Option<u32>,
        appends: u32,
    }

    #[async_trait]
    impl PurchasingStore for FlakyStore {
        type Tx = FlakyTx;

        async fn begin(&self) -> Result<FlakyTx, StoreError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(FlakyTx {
                inner: self.inner.begin().await?,
                commit_conflicts: Arc::clone(&self.commit_conflicts),
                failing_append: self.failing_append,
                appends: 0,
            })
        }
    }

    #[async_trait]
    impl OrderStore for FlakyTx {
        async fn find_order(
            &mut self,
            id: PurchaseOrderId,
        ) -> Result<Option<PurchaseOrder>, StoreError> {
            self.inner.find_order(id).await
        }

        async fn save_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
            self.inner.save_order(order).await
        }

        async fn update_order(&mut self, order: &mut PurchaseOrder) -> Result<(), StoreError> {
            self.inner.update_order(order).await
        }

        async fn next_order_number(&mut self) -> Result<String, StoreError> {
            self.inner.next_order_number().await
        }
    }

    #[async_trait]
    impl LineItemStore for FlakyTx {
        async fn find_line_item(
            &mut self,
            id: LineItemId,
        ) -> Result<Option<PurchaseOrderLineItem>, StoreError> {
            self.inner.find_line_item(id).await
        }

        async fn find_line_items_by_order(
            &mut self,
            order_id: PurchaseOrderId,
        ) -> Result<Vec<PurchaseOrderLineItem>, StoreError> {
            self.inner.find_line_items_by_order(order_id).await
        }

        async fn save_line_item(&mut self, item: &PurchaseOrderLineItem) -> Result<(), StoreError> {
            self.inner.save_line_item(item).await
        }

        async fn update_line_item(
            &mut self,
            item: &mut PurchaseOrderLineItem,
        ) -> Result<(), StoreError> {
            self.inner.update_line_item(item).await
        }
    }

    #[async_trait]
    impl StockLineStore for FlakyTx {
        async fn find_stock_line(
            &mut self,
            key: &StockLineKey,
        ) -> Result<Option<StockLine>, StoreError> {
            self.inner.find_stock_line(key).await
        }

        async fn create_stock_line(&mut self, line: &StockLine) -> Result<(), StoreError> {
            self.inner.create_stock_line(line).await
        }

        async fn update_stock_line(&mut self, line: &mut StockLine) -> Result<(), StoreError> {
            self.inner.update_stock_line(line).await
        }
    }

    #[async_trait]
    impl LedgerAppender for FlakyTx {
        async fn append_ledger_entry(
            &mut self,
            entry: &StockLedgerEntry,
        ) -> Result<(), StoreError> {
            self.appends += 1;
            if self.failing_append == Some(self.appends) {
                return Err(StoreError::Backend("connection reset".to_string()));
            }
            self.inner.append_ledger_entry(entry).await
        }
    }

    #[async_trait]
    impl PurchasingTx for FlakyTx {
        async fn commit(self) -> Result<(), StoreError> {
            let remaining = self.commit_conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.commit_conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict("injected".to_string()));
            }
            self.inner.commit().await
        }
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_the_batch_commits() {
        let f = fixture();
        let details = ordered_with(&f, &[3]).await;
        let flaky = FlakyStore::conflicting_commits(f.store.clone(), 2);
        let receiving =
            ReceivingService::new(flaky.clone()).with_retry_policy(RetryPolicy::new(3));

        let outcome = receiving
            .receive_items(
                details.order.id_typed(),
                &[ReceiveItem::new(details.line_items[0].id_typed(), 3)],
            )
            .await
            .unwrap();

        assert_eq!(outcome.order.status(), PurchaseOrderStatus::Received);
        assert_eq!(ledger(&f).len(), 1);
        assert_eq!(flaky.begins(), 3);
    }

    #[tokio::test]
    async fn conflict_surfaces_once_attempts_are_exhausted() {
        let f = fixture();
        let details = ordered_with(&f, &[3]).await;
        let flaky = FlakyStore::conflicting_commits(f.store.clone(), 5);
        let receiving = ReceivingService::new(flaky).with_retry_policy(RetryPolicy::new(2));
        let line_id = details.line_items[0].id_typed();

        let err = receiving
            .receive_items(details.order.id_typed(), &[ReceiveItem::new(line_id, 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, PurchasingError::ConcurrencyConflict(_)));
        assert!(ledger(&f).is_empty());
        assert!(line(&f, line_id).received_quantity().is_zero());
    }

    #[tokio::test]
    async fn store_failure_mid_batch_is_not_retried_and_rolls_back() {
        let f = fixture();
        let details = ordered_with(&f, &[4, 6]).await;
        let order_id = details.order.id_typed();
        let (first, second) = (&details.line_items[0], &details.line_items[1]);
        let flaky = FlakyStore::backend_failure_on_append(f.store.clone(), 2);
        let receiving =
            ReceivingService::new(flaky.clone()).with_retry_policy(RetryPolicy::new(3));

        let err = receiving
            .receive_items(
                order_id,
                &[
                    ReceiveItem::new(first.id_typed(), 4),
                    ReceiveItem::new(second.id_typed(), 2),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PurchasingError::Store(ref msg) if msg.contains("connection reset")));
        assert_eq!(flaky.begins(), 1);
        assert!(line(&f, first.id_typed()).received_quantity().is_zero());
        assert!(line(&f, second.id_typed()).received_quantity().is_zero());
        assert!(stock_line(&f, &first.stock_key()).is_none());
        assert!(stock_line(&f, &second.stock_key()).is_none());
        assert!(ledger(&f).is_empty());
        let stored = order(&f, order_id);
        assert_eq!(stored.status(), PurchaseOrderStatus::Ordered);
        assert_eq!(stored.version(), details.order.version());
    }

    #[tokio::test]
    async fn receipt_beyond_quantity_range_is_an_over_receipt() {
        let f = fixture();
        let details = ordered_with(&f, &[10]).await;
        let line_id = details.line_items[0].id_typed();

        let err = f
            .receiving
            .receive_items(
                details.order.id_typed(),
                &[ReceiveItem::new(line_id, 5_000_000_000)],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PurchasingError::OverReceipt { requested: 5_000_000_000, ordered: 10, .. }
        ));
        assert!(ledger(&f).is_empty());
    }

    #[tokio::test]
    async fn create_rolls_up_totals_and_numbers_orders() {
        let f = fixture();
        let item = InventoryItemId::new();
        f.directory.add_catalog_item(item).unwrap();

        let mut first = NewLineItem::new(item, f.warehouse, 2, dec!(50.00));
        first.tax_amount = dec!(8.00);
        first.discount = dec!(10.00);
        let second = NewLineItem::new(item, WarehouseId::new(), 1, dec!(20.00));

        let created = f
            .orders
            .create(create_request(&f, vec![first, second]))
            .await
            .unwrap();

        let totals = created.order.totals();
        assert_eq!(totals.total_amount.value(), dec!(110.00));
        assert_eq!(totals.total_tax_amount.value(), dec!(8.00));
        assert_eq!(totals.total_discount.value(), dec!(10.00));
        assert_eq!(totals.grand_total.value(), dec!(108.00));
        assert_eq!(created.order.status(), PurchaseOrderStatus::Draft);
        assert_eq!(created.order.order_number(), "PUR-000001");
        assert_eq!(created.total_items, 2);
        assert_eq!(created.items_pending, 2);

        let again = f
            .orders
            .create(create_request(&f, vec![NewLineItem::new(item, f.warehouse, 1, dec!(1))]))
            .await
            .unwrap();
        assert_eq!(again.order.order_number(), "PUR-000002");
    }

    #[tokio::test]
    async fn create_checks_master_data() {
        let f = fixture();
        let unknown_item = InventoryItemId::new();

        let err = f
            .orders
            .create(create_request(
                &f,
                vec![NewLineItem::new(unknown_item, f.warehouse, 1, dec!(1))],
            ))
            .await
            .unwrap_err();
        assert_eq!(err, PurchasingError::CatalogItemNotFound(unknown_item));

        let mut request = create_request(&f, vec![]);
        let err = f.orders.create(request.clone()).await.unwrap_err();
        assert!(matches!(err, PurchasingError::Validation(_)));

        let stranger = VendorId::new();
        request.vendor_id = stranger;
        request.items = vec![NewLineItem::new(unknown_item, f.warehouse, 1, dec!(1))];
        let err = f.orders.create(request).await.unwrap_err();
        assert_eq!(err, PurchasingError::VendorNotFound(stranger));
    }

    #[tokio::test]
    async fn header_edits_stop_once_goods_arrive() {
        let f = fixture();
        let details = ordered_with(&f, &[4]).await;
        let order_id = details.order.id_typed();

        let edited = f
            .orders
            .update_header(
                order_id,
                UpdatePurchaseOrder {
                    invoice_number: Some("INV-7".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.invoice_number(), Some("INV-7"));

        f.receiving
            .receive_items(order_id, &[ReceiveItem::new(details.line_items[0].id_typed(), 1)])
            .await
            .unwrap();

        let err = f
            .orders
            .update_header(
                order_id,
                UpdatePurchaseOrder {
                    notes: Some("late".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchasingError::NotEditable {
                status: PurchaseOrderStatus::PartialReceived,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancel_deactivates_lines_and_blocks_receiving() {
        let f = fixture();
        let details = ordered_with(&f, &[2, 2]).await;
        let order_id = details.order.id_typed();

        let cancelled = f.orders.cancel(order_id).await.unwrap();
        assert_eq!(cancelled.order.status(), PurchaseOrderStatus::Cancelled);
        assert!(cancelled.line_items.iter().all(|l| !l.is_active()));

        let err = f.orders.cancel(order_id).await.unwrap_err();
        assert!(matches!(err, PurchasingError::NotCancellable { .. }));

        let err = f
            .receiving
            .receive_items(order_id, &[ReceiveItem::new(details.line_items[0].id_typed(), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, PurchasingError::NotReceivable { .. }));
    }

    #[tokio::test]
    async fn received_order_cannot_be_cancelled() {
        let f = fixture();
        let details = ordered_with(&f, &[1]).await;
        let order_id = details.order.id_typed();
        f.receiving
            .receive_items(order_id, &[ReceiveItem::new(details.line_items[0].id_typed(), 1)])
            .await
            .unwrap();

        let err = f.orders.cancel(order_id).await.unwrap_err();
        assert!(matches!(
            err,
            PurchasingError::NotCancellable {
                status: PurchaseOrderStatus::Received,
                ..
            }
        ));

        let details = f.orders.details(order_id).await.unwrap();
        assert_eq!((details.items_received, details.items_pending), (1, 0));
    }
}
