use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        CartService, CouponService, MovementService, OrderService, ProductService,
        ShipmentService, StockService,
    },
};

pub mod carts;
pub mod common;
pub mod orders;
pub mod products;
pub mod warehouse;

/// Service container shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub coupons: Arc<CouponService>,
    pub orders: Arc<OrderService>,
    pub shipments: Arc<ShipmentService>,
    pub movements: Arc<MovementService>,
    pub stock: Arc<StockService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: Arc<AppConfig>) -> Self {
        let stock = Arc::new(StockService::new(db.clone(), config));
        let products = Arc::new(ProductService::new(db.clone()));
        let carts = Arc::new(CartService::new(
            db.clone(),
            event_sender.clone(),
            stock.clone(),
        ));
        let coupons = Arc::new(CouponService::new(db.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            event_sender.clone(),
            stock.clone(),
            coupons.clone(),
        ));
        let movements = Arc::new(MovementService::new(
            db.clone(),
            event_sender.clone(),
            stock.clone(),
        ));
        let shipments = Arc::new(ShipmentService::new(db, event_sender, movements.clone()));

        Self {
            products,
            carts,
            coupons,
            orders,
            shipments,
            movements,
            stock,
        }
    }
}
