mod common;

use assert_matches::assert_matches;
use common::TestApp;
use ferreteria_api::{
    entities::coupon::DiscountType,
    entities::order::OrderStatus,
    errors::ServiceError,
    services::carts::AddItemInput,
    services::orders::CheckoutInput,
};
use rust_decimal_macros::dec;

const SESSION: &str = "session-checkout-tests";

fn checkout_input() -> CheckoutInput {
    CheckoutInput {
        customer_name: "Juan Pérez".to_string(),
        customer_email: "juan@example.com".to_string(),
        customer_phone: "809-555-0123".to_string(),
        shipping_address: "Calle Duarte 12".to_string(),
        shipping_city: "Santo Domingo".to_string(),
        shipping_state: "Distrito Nacional".to_string(),
        shipping_zip_code: "10101".to_string(),
        notes: None,
    }
}

#[tokio::test]
async fn checkout_snapshots_the_cart_and_settles_stock() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(450.00), 10).await;
    let carts = &app.state.services.carts;

    carts
        .add_item(
            SESSION,
            AddItemInput {
                product_id,
                variant_id: None,
                quantity: 4,
            },
        )
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .place_order(SESSION, checkout_input())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.subtotal, dec!(1800.00));
    assert_eq!(order.discount, dec!(0.00));
    assert_eq!(order.total, dec!(1800.00));

    // Consumed and released: 10 - 4 owned, no reservation left.
    let entry = app
        .state
        .services
        .stock
        .get_entry(product_id, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.quantity, 6);
    assert_eq!(entry.reserved_quantity, 0);

    // The cart is empty afterwards.
    let detail = carts.get_cart_detail(SESSION).await.unwrap();
    assert!(detail.lines.is_empty());

    // The order items are snapshots of the lines.
    let order_detail = app
        .state
        .services
        .orders
        .get_order(&order.order_number)
        .await
        .unwrap();
    assert_eq!(order_detail.items.len(), 1);
    assert_eq!(order_detail.items[0].quantity, 4);
    assert_eq!(order_detail.items[0].unit_price, dec!(450.00));
    assert_eq!(order_detail.items[0].total, dec!(1800.00));
}

#[tokio::test]
async fn checkout_with_coupon_redeems_it() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(1500.00), 10).await;
    app.seed_coupon(
        "FERRETERO20",
        DiscountType::Percentage,
        dec!(20.00),
        dec!(1000.00),
        Some(dec!(500.00)),
    )
    .await;
    let carts = &app.state.services.carts;

    carts
        .add_item(
            SESSION,
            AddItemInput {
                product_id,
                variant_id: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();
    carts.apply_coupon(SESSION, "FERRETERO20").await.unwrap();

    let order = app
        .state
        .services
        .orders
        .place_order(SESSION, checkout_input())
        .await
        .unwrap();

    assert_eq!(order.subtotal, dec!(3000.00));
    assert_eq!(order.discount, dec!(500.00));
    assert_eq!(order.total, dec!(2500.00));
    assert!(order.coupon_id.is_some());

    // Confirmed use: the counter moved exactly once.
    let coupon = app
        .state
        .services
        .coupons
        .get_by_code("FERRETERO20")
        .await
        .unwrap();
    assert_eq!(coupon.used_count, 1);

    // The association does not leak into the next cart.
    let detail = carts.get_cart_detail(SESSION).await.unwrap();
    assert!(detail.applied_coupon.is_none());
}

#[tokio::test]
async fn checkout_drops_an_under_minimum_coupon_silently() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(1200.00), 10).await;
    app.seed_coupon(
        "FERRETERO20",
        DiscountType::Percentage,
        dec!(20.00),
        dec!(2000.00),
        None,
    )
    .await;
    let carts = &app.state.services.carts;

    let detail = carts
        .add_item(
            SESSION,
            AddItemInput {
                product_id,
                variant_id: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();
    carts.apply_coupon(SESSION, "FERRETERO20").await.unwrap();

    // Shrink the cart below the coupon minimum before checking out. The
    // checkout re-validates and silently drops the discount to zero instead
    // of failing.
    carts
        .update_item(SESSION, detail.lines[0].id, 1)
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .place_order(SESSION, checkout_input())
        .await
        .unwrap();

    assert_eq!(order.subtotal, dec!(1200.00));
    assert_eq!(order.discount, dec!(0.00));
    assert_eq!(order.total, dec!(1200.00));
    assert!(order.coupon_id.is_none());

    let coupon = app
        .state
        .services
        .coupons
        .get_by_code("FERRETERO20")
        .await
        .unwrap();
    assert_eq!(coupon.used_count, 0);
}

#[tokio::test]
async fn checkout_with_empty_cart_is_refused() {
    let app = TestApp::new().await;

    let denied = app
        .state
        .services
        .orders
        .place_order(SESSION, checkout_input())
        .await;

    assert_matches!(denied, Err(ServiceError::EmptyCart));
}

#[tokio::test]
async fn checkout_validates_the_form() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(450.00), 10).await;

    app.state
        .services
        .carts
        .add_item(
            SESSION,
            AddItemInput {
                product_id,
                variant_id: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let mut input = checkout_input();
    input.customer_email = "not-an-email".to_string();

    let denied = app.state.services.orders.place_order(SESSION, input).await;
    assert_matches!(denied, Err(ServiceError::ValidationError(_)));

    // Validation failure leaves the cart and the reservation untouched.
    let detail = app
        .state
        .services
        .carts
        .get_cart_detail(SESSION)
        .await
        .unwrap();
    assert_eq!(detail.item_count, 1);
    let entry = app
        .state
        .services
        .stock
        .get_entry(product_id, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.reserved_quantity, 1);
}

#[tokio::test]
async fn orders_are_scoped_to_their_session() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(450.00), 10).await;

    app.state
        .services
        .carts
        .add_item(
            SESSION,
            AddItemInput {
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
        .place_order(SESSION, checkout_input())
        .await
        .unwrap();

    let own = app
        .state
        .services
        .orders
        .get_order_for_session(SESSION, &order.order_number)
        .await;
    assert!(own.is_ok());

    let foreign = app
        .state
        .services
        .orders
        .get_order_for_session("someone-else", &order.order_number)
        .await;
    assert_matches!(foreign, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn two_line_checkout_settles_each_entry() {
    let app = TestApp::new().await;
    let hammer = app.seed_product(dec!(450.00), 10).await;
    let drill = app.seed_product(dec!(2500.00), 5).await;
    let carts = &app.state.services.carts;

    carts
        .add_item(
            SESSION,
            AddItemInput {
                product_id: hammer,
                variant_id: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();
    carts
        .add_item(
            SESSION,
            AddItemInput {
                product_id: drill,
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
        .place_order(SESSION, checkout_input())
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec!(3400.00));

    let hammer_entry = app
        .state
        .services
        .stock
        .get_entry(hammer, None)
        .await
        .unwrap()
        .unwrap();
    let drill_entry = app
        .state
        .services
        .stock
        .get_entry(drill, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((hammer_entry.quantity, hammer_entry.reserved_quantity), (8, 0));
    assert_eq!((drill_entry.quantity, drill_entry.reserved_quantity), (4, 0));
}
