mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn product_listing_returns_seeded_products() {
    let app = TestApp::new().await;
    app.seed_product(dec!(450.00), 10).await;

    let response = app
        .router()
        .oneshot(Request::get("/products").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["name"], "Martillo de prueba");
}

#[tokio::test]
async fn add_to_cart_over_http_reserves_stock() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(450.00), 10).await;

    let payload = json!({ "product_id": product_id, "quantity": 4 });
    let response = app
        .router()
        .oneshot(
            Request::post("/carts/web-session/items")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["item_count"], 4);
    assert_eq!(body["subtotal"], "1800.00");

    let entry = app
        .state
        .services
        .stock
        .get_entry(product_id, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.reserved_quantity, 4);
}

#[tokio::test]
async fn insufficient_stock_maps_to_unprocessable_entity() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(450.00), 2).await;

    let payload = json!({ "product_id": product_id, "quantity": 5 });
    let response = app
        .router()
        .oneshot(
            Request::post("/carts/web-session/items")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("2 units available"));
}

#[tokio::test]
async fn shipping_a_pending_order_conflicts() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(450.00), 10).await;

    // Cart and checkout through the services, dispatch over HTTP.
    app.state
        .services
        .carts
        .add_item(
            "web-session",
            ferreteria_api::services::carts::AddItemInput {
                product_id,
                variant_id: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();
    let order = app
        .state
        .services
        .orders
        .place_order(
            "web-session",
            ferreteria_api::services::orders::CheckoutInput {
                customer_name: "Ana".to_string(),
                customer_email: "ana@example.com".to_string(),
                customer_phone: "809-555-0789".to_string(),
                shipping_address: "Calle Sol 3".to_string(),
                shipping_city: "La Vega".to_string(),
                shipping_state: "La Vega".to_string(),
                shipping_zip_code: "41000".to_string(),
                notes: None,
            },
        )
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(
            Request::post(format!(
                "/warehouse/orders/{}/ship",
                order.order_number
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_product_is_a_404() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::get(format!("/products/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
