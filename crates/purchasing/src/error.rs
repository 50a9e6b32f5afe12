//! Purchasing error taxonomy.
//!
//! Every variant carries the ids and offending values the caller needs to
//! correct its input. [`PurchasingError::kind`] groups variants into the four
//! families transports map onto response codes.

use rust_decimal::Decimal;
use thiserror::Error;

use procura_core::{DomainError, InventoryItemId, LineItemId, PurchaseOrderId, VendorId};

use crate::status::PurchaseOrderStatus;

pub type PurchasingResult<T> = Result<T, PurchasingError>;

/// Coarse classification of a [`PurchasingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Store,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PurchasingError {
    #[error("purchase order {0} not found")]
    OrderNotFound(PurchaseOrderId),

    #[error("line item {0} not found")]
    LineItemNotFound(LineItemId),

    #[error("quantity must be positive (got {quantity}){}", line_suffix(.line_item_id))]
    InvalidQuantity {
        line_item_id: Option<LineItemId>,
        quantity: i64,
    },

    #[error(
        "cannot receive {requested} of line item {line_item_id}: ordered {ordered}, already received {already_received}"
    )]
    OverReceipt {
        line_item_id: LineItemId,
        ordered: u32,
        already_received: u32,
        requested: i64,
    },

    #[error("{field} cannot be negative (got {value})")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
    },

    #[error("purchase order {order_id} cannot receive items in status {status}")]
    NotReceivable {
        order_id: PurchaseOrderId,
        status: PurchaseOrderStatus,
    },

    #[error("purchase order {order_id} cannot be cancelled in status {status}")]
    NotCancellable {
        order_id: PurchaseOrderId,
        status: PurchaseOrderStatus,
    },

    #[error("line item {line_item_id} belongs to order {actual_order_id}, not {expected_order_id}")]
    LineItemMismatch {
        line_item_id: LineItemId,
        expected_order_id: PurchaseOrderId,
        actual_order_id: PurchaseOrderId,
    },

    #[error("vendor {0} not found")]
    VendorNotFound(VendorId),

    #[error("inventory item {0} not found")]
    CatalogItemNotFound(InventoryItemId),

    #[error("purchase order {order_id} cannot be edited in status {status}")]
    NotEditable {
        order_id: PurchaseOrderId,
        status: PurchaseOrderStatus,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("store failure: {0}")]
    Store(String),
}

fn line_suffix(line_item_id: &Option<LineItemId>) -> String {
    match line_item_id {
        Some(id) => format!(" for line item {id}"),
        None => String::new(),
    }
}

impl PurchasingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PurchasingError::OrderNotFound(_)
            | PurchasingError::LineItemNotFound(_)
            | PurchasingError::VendorNotFound(_)
            | PurchasingError::CatalogItemNotFound(_) => ErrorKind::NotFound,
            PurchasingError::InvalidQuantity { .. }
            | PurchasingError::OverReceipt { .. }
            | PurchasingError::NegativeAmount { .. }
            | PurchasingError::InvalidStatusTransition { .. }
            | PurchasingError::NotReceivable { .. }
            | PurchasingError::NotCancellable { .. }
            | PurchasingError::LineItemMismatch { .. }
            | PurchasingError::NotEditable { .. }
            | PurchasingError::Validation(_) => ErrorKind::Validation,
            PurchasingError::ConcurrencyConflict(_) => ErrorKind::Conflict,
            PurchasingError::Store(_) => ErrorKind::Store,
        }
    }

    /// Only concurrency conflicts are worth re-running a batch for.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Stable machine-readable code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            PurchasingError::OrderNotFound(_) => "order_not_found",
            PurchasingError::LineItemNotFound(_) => "line_item_not_found",
            PurchasingError::InvalidQuantity { .. } => "invalid_quantity",
            PurchasingError::OverReceipt { .. } => "over_receipt",
            PurchasingError::NegativeAmount { .. } => "negative_amount",
            PurchasingError::InvalidStatusTransition { .. } => "invalid_status_transition",
            PurchasingError::NotReceivable { .. } => "not_receivable",
            PurchasingError::NotCancellable { .. } => "not_cancellable",
            PurchasingError::LineItemMismatch { .. } => "line_item_mismatch",
            PurchasingError::VendorNotFound(_) => "vendor_not_found",
            PurchasingError::CatalogItemNotFound(_) => "catalog_item_not_found",
            PurchasingError::NotEditable { .. } => "not_editable",
            PurchasingError::Validation(_) => "validation_error",
            PurchasingError::ConcurrencyConflict(_) => "concurrency_conflict",
            PurchasingError::Store(_) => "store_failure",
        }
    }
}

impl From<DomainError> for PurchasingError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Conflict(msg) => PurchasingError::ConcurrencyConflict(msg),
            other => PurchasingError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_the_four_families() {
        let order_id = PurchaseOrderId::new();
        assert_eq!(
            PurchasingError::OrderNotFound(order_id).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            PurchasingError::NotReceivable {
                order_id,
                status: PurchaseOrderStatus::Received
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            PurchasingError::ConcurrencyConflict("stale".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(PurchasingError::Store("down".into()).kind(), ErrorKind::Store);
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(PurchasingError::ConcurrencyConflict("x".into()).is_retryable());
        assert!(!PurchasingError::Store("x".into()).is_retryable());
        assert!(
            !PurchasingError::InvalidQuantity {
                line_item_id: None,
                quantity: 0
            }
            .is_retryable()
        );
    }

    #[test]
    fn over_receipt_message_names_the_line_and_numbers() {
        let id = LineItemId::new();
        let msg = PurchasingError::OverReceipt {
            line_item_id: id,
            ordered: 10,
            already_received: 8,
            requested: 3,
        }
        .to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("ordered 10"));
        assert!(msg.contains("already received 8"));
    }

    #[test]
    fn domain_conflict_maps_to_concurrency_conflict() {
        let err: PurchasingError = DomainError::conflict("version mismatch").into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err: PurchasingError = DomainError::validation("bad").into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
