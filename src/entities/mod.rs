pub mod cart;
pub mod cart_line;
pub mod coupon;
pub mod inventory_movement;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_variant;
pub mod shipment;
pub mod stock_entry;

pub use cart::Entity as Cart;
pub use cart_line::Entity as CartLine;
pub use coupon::Entity as Coupon;
pub use inventory_movement::Entity as InventoryMovement;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;
pub use shipment::Entity as Shipment;
pub use stock_entry::Entity as StockEntry;
