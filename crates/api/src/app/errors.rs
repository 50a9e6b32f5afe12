use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use procura_core::PurchaseOrderId;
use procura_purchasing::{ErrorKind, PurchasingError};

pub fn purchasing_error_to_response(err: PurchasingError) -> axum::response::Response {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Store => {
            tracing::error!(error = %err, "purchasing request failed in the store");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_order_id(s: &str) -> Result<PurchaseOrderId, axum::response::Response> {
    s.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid purchase order id"))
}

#[cfg(test)]
mod tests {
    use procura_core::LineItemId;

    use super::*;

    #[test]
    fn error_kinds_map_to_status_codes() {
        let cases = [
            (PurchasingError::OrderNotFound(PurchaseOrderId::new()), StatusCode::NOT_FOUND),
            (
                PurchasingError::OverReceipt {
                    line_item_id: LineItemId::new(),
                    ordered: 2,
                    already_received: 2,
                    requested: 1,
                },
                StatusCode::BAD_REQUEST,
            ),
            (PurchasingError::ConcurrencyConflict("stale".into()), StatusCode::CONFLICT),
            (PurchasingError::Store("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(purchasing_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let res = parse_order_id("nope").unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(parse_order_id(&PurchaseOrderId::new().to_string()).is_ok());
    }
}
