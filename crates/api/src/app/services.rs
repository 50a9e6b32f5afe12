//! Infrastructure wiring: picks the store backend and builds the purchasing
//! services on top of it.

use procura_core::PurchaseOrderId;
use procura_infra::store::{
    InMemoryDirectory, InMemoryPurchasingStore, PgDirectory, PgPurchasingStore, StoreError,
};
use procura_infra::{
    CreatePurchaseOrder, PurchaseOrderDetails, PurchaseOrderService, ReceiptOutcome,
    ReceiveItem, ReceivingService, UpdatePurchaseOrder,
};
use procura_purchasing::{PurchaseOrder, PurchasingResult};

use crate::config::ApiConfig;

type InMemoryOrders = PurchaseOrderService<InMemoryPurchasingStore, InMemoryDirectory>;
type PersistentOrders = PurchaseOrderService<PgPurchasingStore, PgDirectory>;

#[derive(Debug, Clone)]
pub enum AppServices {
    InMemory {
        orders: InMemoryOrders,
        receiving: ReceivingService<InMemoryPurchasingStore>,
    },
    Persistent {
        orders: PersistentOrders,
        receiving: ReceivingService<PgPurchasingStore>,
    },
}

/// Build services for the configured backend: Postgres when `DATABASE_URL`
/// is set (schema applied on startup), in-memory otherwise.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    match config.database_url.as_deref() {
        Some(url) => build_persistent_services(config, url).await,
        None => Ok(build_in_memory_services(config)),
    }
}

pub fn build_in_memory_services(config: &ApiConfig) -> AppServices {
    let store = InMemoryPurchasingStore::new();
    let directory = InMemoryDirectory::with_entries(
        config.vendor_ids.iter().copied(),
        config.catalog_item_ids.iter().copied(),
    );
    tracing::info!(
        vendors = config.vendor_ids.len(),
        catalog_items = config.catalog_item_ids.len(),
        "using in-memory purchasing store"
    );

    AppServices::InMemory {
        orders: PurchaseOrderService::new(store.clone(), directory),
        receiving: ReceivingService::new(store).with_retry_policy(config.retry),
    }
}

async fn build_persistent_services(
    config: &ApiConfig,
    database_url: &str,
) -> Result<AppServices, StoreError> {
    let store = PgPurchasingStore::connect(database_url).await?;
    store.migrate().await?;
    let directory = PgDirectory::new(store.pool().clone());
    tracing::info!("using postgres purchasing store");

    Ok(AppServices::Persistent {
        orders: PurchaseOrderService::new(store.clone(), directory),
        receiving: ReceivingService::new(store).with_retry_policy(config.retry),
    })
}

impl AppServices {
    pub async fn create_order(
        &self,
        request: CreatePurchaseOrder,
    ) -> PurchasingResult<PurchaseOrderDetails> {
        match self {
            AppServices::InMemory { orders, .. } => orders.create(request).await,
            AppServices::Persistent { orders, .. } => orders.create(request).await,
        }
    }

    pub async fn order_details(
        &self,
        order_id: PurchaseOrderId,
    ) -> PurchasingResult<PurchaseOrderDetails> {
        match self {
            AppServices::InMemory { orders, .. } => orders.details(order_id).await,
            AppServices::Persistent { orders, .. } => orders.details(order_id).await,
        }
    }

    pub async fn update_order_header(
        &self,
        order_id: PurchaseOrderId,
        update: UpdatePurchaseOrder,
    ) -> PurchasingResult<PurchaseOrder> {
        match self {
            AppServices::InMemory { orders, .. } => orders.update_header(order_id, update).await,
            AppServices::Persistent { orders, .. } => orders.update_header(order_id, update).await,
        }
    }

    pub async fn mark_ordered(&self, order_id: PurchaseOrderId) -> PurchasingResult<PurchaseOrder> {
        match self {
            AppServices::InMemory { orders, .. } => orders.mark_ordered(order_id).await,
            AppServices::Persistent { orders, .. } => orders.mark_ordered(order_id).await,
        }
    }

    pub async fn cancel_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> PurchasingResult<PurchaseOrderDetails> {
        match self {
            AppServices::InMemory { orders, .. } => orders.cancel(order_id).await,
            AppServices::Persistent { orders, .. } => orders.cancel(order_id).await,
        }
    }

    pub async fn receive_items(
        &self,
        order_id: PurchaseOrderId,
        items: &[ReceiveItem],
    ) -> PurchasingResult<ReceiptOutcome> {
        match self {
            AppServices::InMemory { receiving, .. } => {
                receiving.receive_items(order_id, items).await
            }
            AppServices::Persistent { receiving, .. } => {
                receiving.receive_items(order_id, items).await
            }
        }
    }
}
