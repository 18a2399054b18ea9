pub mod carts;
pub mod coupons;
pub mod movements;
pub mod orders;
pub mod products;
pub mod shipments;
pub mod stock;

pub use carts::CartService;
pub use coupons::CouponService;
pub use movements::MovementService;
pub use orders::OrderService;
pub use products::ProductService;
pub use shipments::ShipmentService;
pub use stock::StockService;
