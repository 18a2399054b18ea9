use crate::{
    entities::{
        cart, cart_line, order, order_item, shipment, Cart, CartLine, Coupon, InventoryMovement,
        Order, OrderItem, Shipment,
    },
    entities::order::OrderStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    services::{coupons::CouponService, stock::StockService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Order lifecycle: checkout converts a cart into an immutable order, then
/// the warehouse advances the status through the linear machine
/// `pending → confirmed → ready_to_ship → shipped → delivered`
/// (`cancelled` is terminal and reachable until delivery).
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    stock: Arc<StockService>,
    coupons: Arc<CouponService>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        stock: Arc<StockService>,
        coupons: Arc<CouponService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            stock,
            coupons,
        }
    }

    /// Converts the session's cart into an order, atomically:
    /// snapshot totals and lines, consume the reserved units, release the
    /// reservations, redeem the coupon, clear the cart. Any failure rolls
    /// everything back; no partial order ever becomes visible.
    #[instrument(skip(self, input), fields(session_id = %session_id))]
    pub async fn place_order(
        &self,
        session_id: &str,
        input: CheckoutInput,
    ) -> Result<order::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let cart = Cart::find()
            .filter(cart::Column::SessionId.eq(session_id))
            .one(&txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;

        let lines = CartLine::find()
            .filter(cart_line::Column::CartId.eq(cart.id))
            .order_by_asc(cart_line::Column::CreatedAt)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let subtotal: Decimal = lines.iter().map(|l| l.line_total()).sum();

        // Re-validate the applied coupon against the final subtotal. An
        // invalid or under-minimum coupon silently contributes nothing.
        let now = Utc::now();
        let applied_coupon = match cart.coupon_id {
            Some(coupon_id) => Coupon::find_by_id(coupon_id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .filter(|c| c.is_valid_at(now) && subtotal >= c.min_amount),
            None => None,
        };
        let discount = applied_coupon
            .as_ref()
            .map(|c| c.discount_for(subtotal, now))
            .unwrap_or(Decimal::ZERO);

        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            session_id: Set(session_id.to_string()),
            customer_name: Set(input.customer_name),
            customer_email: Set(input.customer_email),
            customer_phone: Set(input.customer_phone),
            shipping_address: Set(input.shipping_address),
            shipping_city: Set(input.shipping_city),
            shipping_state: Set(input.shipping_state),
            shipping_zip_code: Set(input.shipping_zip_code),
            status: Set(OrderStatus::Pending),
            subtotal: Set(subtotal),
            discount: Set(discount),
            total: Set(subtotal - discount),
            coupon_id: Set(applied_coupon.as_ref().map(|c| c.id)),
            notes: Set(input.notes.unwrap_or_default()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let created = order_model.insert(&txn).await?;

        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total: Set(line.line_total()),
                created_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;

            // The reserved units become sold units: take them out of the
            // total, then drop the matching hold. Two independent fields.
            self.stock
                .consume(&txn, line.product_id, line.variant_id, line.quantity)
                .await?;
            self.stock
                .release(&txn, line.product_id, line.variant_id, line.quantity)
                .await?;
        }

        if let Some(coupon_model) = &applied_coupon {
            if discount > Decimal::ZERO && !self.coupons.redeem(&txn, coupon_model.id).await? {
                // Validity raced away between resolution and redemption; the
                // snapshot keeps the discount, matching what the shopper saw.
                warn!(
                    "Coupon {} could not be redeemed during checkout of {}",
                    coupon_model.code, order_number
                );
            }
        }

        // Reservations were already released line by line; delete the lines
        // directly instead of going through the cart's clear (which would
        // release a second time).
        CartLine::delete_many()
            .filter(cart_line::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        let mut cart_update: cart::ActiveModel = cart.into();
        cart_update.coupon_id = Set(None);
        cart_update.updated_at = Set(Utc::now());
        cart_update.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        if let Some(coupon_model) = &applied_coupon {
            if discount > Decimal::ZERO {
                self.event_sender
                    .send_or_log(Event::CouponRedeemed {
                        coupon_id: coupon_model.id,
                        order_id,
                    })
                    .await;
            }
        }

        info!("Created order {} from session {}", order_number, session_id);
        Ok(created)
    }

    /// Storefront lookup: the order must belong to the requesting session.
    #[instrument(skip(self))]
    pub async fn get_order_for_session(
        &self,
        session_id: &str,
        order_number: &str,
    ) -> Result<OrderDetail, ServiceError> {
        let order = self.find_by_number(&*self.db, order_number).await?;
        if order.session_id != session_id {
            // Treated as missing rather than forbidden so order numbers
            // cannot be probed from another session.
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_number
            )));
        }
        self.with_items(order).await
    }

    /// Warehouse lookup, no session check.
    pub async fn get_order(&self, order_number: &str) -> Result<OrderDetail, ServiceError> {
        let order = self.find_by_number(&*self.db, order_number).await?;
        self.with_items(order).await
    }

    /// Orders newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        limit: u64,
        status: Option<OrderStatus>,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// `pending → confirmed`.
    pub async fn confirm_order(&self, order_number: &str) -> Result<order::Model, ServiceError> {
        self.transition(order_number, OrderStatus::Confirmed).await
    }

    /// `confirmed → ready_to_ship`.
    pub async fn mark_ready_to_ship(
        &self,
        order_number: &str,
    ) -> Result<order::Model, ServiceError> {
        self.transition(order_number, OrderStatus::ReadyToShip)
            .await
    }

    /// `shipped → delivered`.
    pub async fn mark_delivered(&self, order_number: &str) -> Result<order::Model, ServiceError> {
        self.transition(order_number, OrderStatus::Delivered).await
    }

    /// Terminal cancellation, allowed from any pre-delivered state.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_number: &str) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let order = self.find_by_number_locked(&txn, order_number).await?;

        if !order.status.can_cancel() {
            return Err(ServiceError::OrderNotInExpectedState {
                expected: "a state before delivered".to_string(),
                actual: order.status.to_string(),
            });
        }

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.notify_status_change(&updated, old_status).await;
        Ok(updated)
    }

    /// Administrative reset: drops every order together with its items, all
    /// inventory movements and all shipments. Not part of the normal flow.
    #[instrument(skip(self))]
    pub async fn purge_all_orders(&self) -> Result<PurgeResult, ServiceError> {
        let txn = self.db.begin().await?;

        let shipments = Shipment::delete_many().exec(&txn).await?.rows_affected;
        let movements = InventoryMovement::delete_many()
            .exec(&txn)
            .await?
            .rows_affected;
        let order_items = OrderItem::delete_many().exec(&txn).await?.rows_affected;
        let orders = Order::delete_many().exec(&txn).await?.rows_affected;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrdersPurged {
                orders_deleted: orders,
            })
            .await;
        info!(
            "Purged {} orders, {} items, {} movements, {} shipments",
            orders, order_items, movements, shipments
        );

        Ok(PurgeResult {
            orders,
            order_items,
            movements,
            shipments,
        })
    }

    /// Guarded forward transition: applies only when the order sits exactly
    /// in the target's required predecessor state.
    #[instrument(skip(self))]
    async fn transition(
        &self,
        order_number: &str,
        target: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let required = target
            .required_predecessor()
            .ok_or_else(|| ServiceError::InvalidOperation(format!("{} has no guard", target)))?;

        let txn = self.db.begin().await?;
        let order = self.find_by_number_locked(&txn, order_number).await?;

        if order.status != required {
            return Err(ServiceError::OrderNotInExpectedState {
                expected: required.to_string(),
                actual: order.status.to_string(),
            });
        }

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(target);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.notify_status_change(&updated, old_status).await;
        info!(
            "Order {} moved {} -> {}",
            order_number, old_status, target
        );
        Ok(updated)
    }

    async fn notify_status_change(&self, order: &order::Model, old_status: OrderStatus) {
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: old_status.to_string(),
                new_status: order.status.to_string(),
            })
            .await;
    }

    async fn find_by_number<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_number: &str,
    ) -> Result<order::Model, ServiceError> {
        Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))
    }

    async fn find_by_number_locked<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_number: &str,
    ) -> Result<order::Model, ServiceError> {
        Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))
    }

    async fn with_items(&self, order: order::Model) -> Result<OrderDetail, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let shipments = Shipment::find()
            .filter(shipment::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;
        Ok(OrderDetail {
            order,
            items,
            shipments,
        })
    }
}

fn generate_order_number() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", raw[..8].to_uppercase())
}

/// Checkout form input.
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutInput {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(min = 1, max = 20))]
    pub customer_phone: String,
    #[validate(length(min = 1))]
    pub shipping_address: String,
    #[validate(length(min = 1, max = 100))]
    pub shipping_city: String,
    #[validate(length(min = 1, max = 100))]
    pub shipping_state: String,
    #[validate(length(min = 1, max = 20))]
    pub shipping_zip_code: String,
    pub notes: Option<String>,
}

/// Order with its item snapshots and any shipments.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub shipments: Vec<shipment::Model>,
}

/// Counts from an administrative purge.
#[derive(Debug, Serialize)]
pub struct PurgeResult {
    pub orders: u64,
    pub order_items: u64,
    pub movements: u64,
    pub shipments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_have_the_legacy_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), 12);
        assert!(number[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn order_numbers_are_unique_enough() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert_ne!(a, b);
    }

    #[test]
    fn checkout_input_validates_email() {
        let input = CheckoutInput {
            customer_name: "Juan Pérez".to_string(),
            customer_email: "not-an-email".to_string(),
            customer_phone: "809-555-0123".to_string(),
            shipping_address: "Calle Duarte 12".to_string(),
            shipping_city: "Santo Domingo".to_string(),
            shipping_state: "Distrito Nacional".to_string(),
            shipping_zip_code: "10101".to_string(),
            notes: None,
        };
        assert!(input.validate().is_err());
    }
}
