use serde::Deserialize;

use procura_infra::ReceiveItem;

// -------------------------
// Request DTOs
// -------------------------

pub use procura_infra::{
    CreatePurchaseOrder as CreatePurchaseOrderRequest,
    UpdatePurchaseOrder as UpdatePurchaseOrderRequest,
};

/// Body of `POST /purchases/orders/:id/receive`.
#[derive(Debug, Deserialize)]
pub struct ReceiveItemsRequest {
    pub items: Vec<ReceiveItem>,
}
