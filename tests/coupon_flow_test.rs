mod common;

use assert_matches::assert_matches;
use common::TestApp;
use ferreteria_api::{
    entities::coupon::DiscountType,
    errors::ServiceError,
    services::carts::AddItemInput,
    services::coupons::CreateCouponInput,
};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

const SESSION: &str = "session-coupon-tests";

#[tokio::test]
async fn apply_coupon_discounts_the_cart_total() {
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

    let detail = carts.apply_coupon(SESSION, "ferretero20").await.unwrap();

    // 20% of 3000 is 600, capped at 500.
    assert_eq!(detail.subtotal, dec!(3000.00));
    assert_eq!(detail.discount, dec!(500.00));
    assert_eq!(detail.total, dec!(2500.00));
    assert!(detail.applied_coupon.is_some());
}

#[tokio::test]
async fn apply_coupon_rejects_unknown_codes() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(1500.00), 10).await;
    let carts = &app.state.services.carts;

    carts
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

    let denied = carts.apply_coupon(SESSION, "NOEXISTE").await;
    assert_matches!(denied, Err(ServiceError::CouponNotFound));
}

#[tokio::test]
async fn apply_coupon_enforces_the_minimum_amount() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(900.00), 10).await;
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
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let denied = carts.apply_coupon(SESSION, "FERRETERO20").await;
    assert_matches!(denied, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn expired_coupon_is_rejected_on_apply() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(1500.00), 10).await;
    app.state
        .services
        .coupons
        .create_coupon(CreateCouponInput {
            code: "VENCIDO".to_string(),
            description: None,
            discount_type: DiscountType::Fixed,
            discount_value: dec!(100.00),
            min_amount: None,
            max_discount: None,
            valid_from: Utc::now() - Duration::days(30),
            valid_to: Utc::now() - Duration::days(1),
            usage_limit: None,
        })
        .await
        .unwrap();
    let carts = &app.state.services.carts;

    carts
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

    let denied = carts.apply_coupon(SESSION, "VENCIDO").await;
    assert_matches!(denied, Err(ServiceError::CouponInvalid));
}

#[tokio::test]
async fn removing_the_coupon_restores_the_full_total() {
    let app = TestApp::new().await;
    let product_id = app.seed_product(dec!(1500.00), 10).await;
    app.seed_coupon(
        "FIJO200",
        DiscountType::Fixed,
        dec!(200.00),
        dec!(1000.00),
        None,
    )
    .await;
    let carts = &app.state.services.carts;

    carts
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
    let with_coupon = carts.apply_coupon(SESSION, "FIJO200").await.unwrap();
    assert_eq!(with_coupon.total, dec!(1300.00));

    let without = carts.remove_coupon(SESSION).await.unwrap();
    assert_eq!(without.discount, dec!(0.00));
    assert_eq!(without.total, dec!(1500.00));
    assert!(without.applied_coupon.is_none());
}

#[tokio::test]
async fn redeem_increments_until_the_limit() {
    let app = TestApp::new().await;
    let coupons = &app.state.services.coupons;
    let coupon_id = app
        .state
        .services
        .coupons
        .create_coupon(CreateCouponInput {
            code: "LIMITADO".to_string(),
            description: None,
            discount_type: DiscountType::Fixed,
            discount_value: dec!(50.00),
            min_amount: None,
            max_discount: None,
            valid_from: Utc::now() - Duration::days(1),
            valid_to: Utc::now() + Duration::days(1),
            usage_limit: Some(2),
        })
        .await
        .unwrap()
        .id;
    let db = &*app.state.db;

    assert!(coupons.redeem(db, coupon_id).await.unwrap());
    assert!(coupons.redeem(db, coupon_id).await.unwrap());
    // Limit reached: redemption is a no-op reporting failure.
    assert!(!coupons.redeem(db, coupon_id).await.unwrap());

    let coupon = coupons.get_by_code("LIMITADO").await.unwrap();
    assert_eq!(coupon.used_count, 2);
}

#[tokio::test]
async fn duplicate_coupon_codes_conflict() {
    let app = TestApp::new().await;
    app.seed_coupon(
        "UNICO",
        DiscountType::Fixed,
        dec!(10.00),
        dec!(0.00),
        None,
    )
    .await;

    let duplicate = app
        .state
        .services
        .coupons
        .create_coupon(CreateCouponInput {
            code: "unico".to_string(),
            description: None,
            discount_type: DiscountType::Fixed,
            discount_value: dec!(10.00),
            min_amount: None,
            max_discount: None,
            valid_from: Utc::now() - Duration::days(1),
            valid_to: Utc::now() + Duration::days(1),
            usage_limit: None,
        })
        .await;

    assert_matches!(duplicate, Err(ServiceError::Conflict(_)));
}
