#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::{Duration, Utc};
use ferreteria_api::{
    app_router,
    config::AppConfig,
    db,
    entities::coupon::DiscountType,
    events::{self, EventSender},
    handlers::AppServices,
    services::coupons::CreateCouponInput,
    services::products::{CreateProductInput, CreateVariantInput},
    AppState,
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Test harness: application state over a fresh in-memory SQLite database.
pub struct TestApp {
    pub state: Arc<AppState>,
    router: Router,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        // A single pooled connection keeps the in-memory database alive and
        // shared for the whole test.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            Arc::new(cfg.clone()),
        );

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        });
        let router = app_router(state.clone());

        Self {
            state,
            router,
            _event_task: event_task,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Seed a catalog product with the given price and nominal stock.
    pub async fn seed_product(&self, price: Decimal, stock: i32) -> Uuid {
        let suffix = Uuid::new_v4().simple().to_string();
        self.state
            .services
            .products
            .create_product(CreateProductInput {
                sku: format!("TEST-{}", suffix[..8].to_uppercase()),
                name: "Martillo de prueba".to_string(),
                price,
                original_price: None,
                stock: Some(stock),
                is_featured: None,
            })
            .await
            .expect("failed to seed product")
            .id
    }

    /// Seed a variant for a product with the given price modifier.
    pub async fn seed_variant(&self, product_id: Uuid, price_modifier: Decimal) -> Uuid {
        let suffix = Uuid::new_v4().simple().to_string();
        self.state
            .services
            .products
            .create_variant(
                product_id,
                CreateVariantInput {
                    name: "Tamaño".to_string(),
                    value: "Grande".to_string(),
                    sku: format!("TEST-VAR-{}", suffix[..8].to_uppercase()),
                    price_modifier: Some(price_modifier),
                },
            )
            .await
            .expect("failed to seed variant")
            .id
    }

    /// Seed a currently-valid coupon.
    pub async fn seed_coupon(
        &self,
        code: &str,
        discount_type: DiscountType,
        value: Decimal,
        min_amount: Decimal,
        max_discount: Option<Decimal>,
    ) -> Uuid {
        self.state
            .services
            .coupons
            .create_coupon(CreateCouponInput {
                code: code.to_string(),
                description: None,
                discount_type,
                discount_value: value,
                min_amount: Some(min_amount),
                max_discount,
                valid_from: Utc::now() - Duration::days(1),
                valid_to: Utc::now() + Duration::days(30),
                usage_limit: Some(100),
            })
            .await
            .expect("failed to seed coupon")
            .id
    }
}
