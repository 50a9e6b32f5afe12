use procura_api::app::{build_app, build_in_memory_services};
use procura_api::config::ApiConfig;
use procura_core::{InventoryItemId, VendorId};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    vendor_id: VendorId,
    catalog_item_ids: Vec<InventoryItemId>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let vendor_id = VendorId::new();
        let catalog_item_ids = vec![InventoryItemId::new(), InventoryItemId::new()];
        let config = ApiConfig {
            vendor_ids: vec![vendor_id],
            catalog_item_ids: catalog_item_ids.clone(),
            ..ApiConfig::default()
        };

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = build_app(build_in_memory_services(&config));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            vendor_id,
            catalog_item_ids,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Create an order with lines of 10 and 3 units and place it.
async fn create_and_place(client: &reqwest::Client, srv: &TestServer) -> serde_json::Value {
    let warehouse_id = procura_core::WarehouseId::new();
    let res = client
        .post(srv.url("/purchases/orders"))
        .json(&json!({
            "vendor_id": srv.vendor_id,
            "order_date": "2026-03-01",
            "expected_delivery_date": "2026-03-15",
            "items": [
                {
                    "inventory_item_id": srv.catalog_item_ids[0],
                    "warehouse_id": warehouse_id,
                    "quantity": 10,
                    "unit_price": "12.50",
                    "tax_amount": "5.00"
                },
                {
                    "inventory_item_id": srv.catalog_item_ids[1],
                    "warehouse_id": warehouse_id,
                    "quantity": 3,
                    "unit_price": "4.00",
                    "serial_number": "SN-1"
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["order"]["status"], "DRAFT");

    let id = created["order"]["id"].as_str().unwrap().to_string();
    let res = client
        .post(srv.url(&format!("/purchases/orders/{id}/order")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let placed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(placed["status"], "ORDERED");

    created
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn purchase_order_lifecycle_create_receive_query() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_and_place(&client, &srv).await;
    let id = created["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["order"]["grand_total"], "142.00");
    let first_line = created["line_items"][0]["id"].as_str().unwrap().to_string();
    let second_line = created["line_items"][1]["id"].as_str().unwrap().to_string();

    // Partial receipt
    let res = client
        .post(srv.url(&format!("/purchases/orders/{id}/receive")))
        .json(&json!({ "items": [{ "line_item_id": first_line, "quantity": 4 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "PARTIAL_RECEIVED");
    let entry = &body["ledger_entries"][0];
    assert_eq!(entry["movement_type"], "PURCHASE");
    assert_eq!(entry["quantity"], 4);
    assert_eq!(entry["quantity_before"], 0);
    assert_eq!(entry["quantity_after"], 4);

    // Over-receipt is rejected with the offending numbers
    let res = client
        .post(srv.url(&format!("/purchases/orders/{id}/receive")))
        .json(&json!({ "items": [{ "line_item_id": first_line, "quantity": 7 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "over_receipt");

    // Receive the rest of both lines
    let res = client
        .post(srv.url(&format!("/purchases/orders/{id}/receive")))
        .json(&json!({ "items": [
            { "line_item_id": first_line, "quantity": 6 },
            { "line_item_id": second_line, "quantity": 3 }
        ] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "RECEIVED");
    assert_eq!(body["ledger_entries"].as_array().unwrap().len(), 2);

    // Query
    let res = client
        .get(srv.url(&format!("/purchases/orders/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let details: serde_json::Value = res.json().await.unwrap();
    assert_eq!(details["total_items"], 2);
    assert_eq!(details["items_received"], 2);
    assert_eq!(details["items_pending"], 0);

    // Terminal: no more receipts, no cancel
    let res = client
        .post(srv.url(&format!("/purchases/orders/{id}/cancel")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_cancellable");
}

#[tokio::test]
async fn request_validation_happens_at_the_boundary() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let created = create_and_place(&client, &srv).await;
    let id = created["order"]["id"].as_str().unwrap().to_string();
    let line = created["line_items"][0]["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url(&format!("/purchases/orders/{id}/receive")))
        .json(&json!({ "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url(&format!("/purchases/orders/{id}/receive")))
        .json(&json!({ "items": [{ "line_item_id": line, "quantity": 0 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_quantity");

    let res = client
        .get(srv.url("/purchases/orders/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let missing = procura_core::PurchaseOrderId::new();
    let res = client
        .get(srv.url(&format!("/purchases/orders/{missing}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "order_not_found");
}

#[tokio::test]
async fn unknown_vendor_and_bad_delivery_date_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let item = srv.catalog_item_ids[0];
    let warehouse = procura_core::WarehouseId::new();

    let res = client
        .post(srv.url("/purchases/orders"))
        .json(&json!({
            "vendor_id": VendorId::new(),
            "order_date": "2026-03-01",
            "items": [{ "inventory_item_id": item, "warehouse_id": warehouse, "quantity": 1, "unit_price": "1" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url("/purchases/orders"))
        .json(&json!({
            "vendor_id": srv.vendor_id,
            "order_date": "2026-03-10",
            "expected_delivery_date": "2026-03-01",
            "items": [{ "inventory_item_id": item, "warehouse_id": warehouse, "quantity": 1, "unit_price": "1" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
