use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().nest("/orders", orders_router())
}

fn orders_router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/:id", get(get_purchase_order).patch(update_purchase_order))
        .route("/:id/order", post(place_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
        .route("/:id/receive", post(receive_purchase_order_items))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> axum::response::Response {
    match services.create_order(body).await {
        Ok(details) => (StatusCode::CREATED, Json(details)).into_response(),
        Err(e) => errors::purchasing_error_to_response(e),
    }
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match errors::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.order_details(order_id).await {
        Ok(details) => Json(details).into_response(),
        Err(e) => errors::purchasing_error_to_response(e),
    }
}

pub async fn update_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePurchaseOrderRequest>,
) -> axum::response::Response {
    let order_id = match errors::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.update_order_header(order_id, body).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::purchasing_error_to_response(e),
    }
}

pub async fn place_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match errors::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.mark_ordered(order_id).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::purchasing_error_to_response(e),
    }
}

pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match errors::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.cancel_order(order_id).await {
        Ok(details) => Json(details).into_response(),
        Err(e) => errors::purchasing_error_to_response(e),
    }
}

pub async fn receive_purchase_order_items(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceiveItemsRequest>,
) -> axum::response::Response {
    let order_id = match errors::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.receive_items(order_id, &body.items).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::purchasing_error_to_response(e),
    }
}
