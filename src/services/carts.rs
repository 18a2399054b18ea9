use crate::{
    entities::{
        cart, cart_line, coupon, product, product_variant, Cart, CartLine, Coupon, Product,
        ProductVariant,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock::StockService,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Session-scoped cart operations. Every mutation that touches a cart line
/// also moves the matching stock reservation, inside one transaction, so a
/// failure partway leaves neither cart nor ledger half-updated.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    stock: Arc<StockService>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        stock: Arc<StockService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            stock,
        }
    }

    /// Looks up the session's cart, creating it lazily on first use.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, session_id: &str) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = self.find_cart(&*self.db, session_id).await? {
            return Ok(existing);
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id.to_string()),
            coupon_id: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        match cart.insert(&*self.db).await {
            Ok(created) => {
                self.event_sender
                    .send_or_log(Event::CartCreated(created.id))
                    .await;
                Ok(created)
            }
            // Unique session key: a concurrent request created the cart first.
            Err(err) => match self.find_cart(&*self.db, session_id).await? {
                Some(existing) => Ok(existing),
                None => Err(err.into()),
            },
        }
    }

    async fn find_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        session_id: &str,
    ) -> Result<Option<cart::Model>, ServiceError> {
        Ok(Cart::find()
            .filter(cart::Column::SessionId.eq(session_id))
            .one(conn)
            .await?)
    }

    /// Adds `quantity` units of a product (or variant) to the session's cart,
    /// reserving the same amount in the stock ledger. Re-adding an existing
    /// line is cumulative: the check compares the total desired quantity
    /// against availability with the line's own reservation given back.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        session_id: &str,
        input: AddItemInput,
    ) -> Result<CartDetail, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than 0".to_string(),
            ));
        }

        let cart = self.get_or_create_cart(session_id).await?;
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .filter(product::Column::IsActive.eq(true))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let variant = match input.variant_id {
            Some(variant_id) => {
                let variant = ProductVariant::find_by_id(variant_id)
                    .filter(product_variant::Column::ProductId.eq(product.id))
                    .filter(product_variant::Column::IsActive.eq(true))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::ValidationError(
                            "The selected variant is not valid".to_string(),
                        )
                    })?;
                Some(variant)
            }
            None => None,
        };

        let entry = self
            .stock
            .get_or_init(&txn, &product, input.variant_id)
            .await?;

        let existing_line = Self::line_query(cart.id, product.id, input.variant_id)
            .one(&txn)
            .await?;

        // Availability as if this line's current reservation were first given
        // back, compared against the total the shopper will end up with.
        let line_quantity = existing_line.as_ref().map(|l| l.quantity).unwrap_or(0);
        let desired = line_quantity + input.quantity;
        let available_for_line = entry.quantity - (entry.reserved_quantity - line_quantity);
        if desired > available_for_line {
            return Err(ServiceError::InsufficientStock {
                available: available_for_line - line_quantity,
            });
        }

        let line_id = match existing_line {
            Some(line) => {
                let line_id = line.id;
                let mut active: cart_line::ActiveModel = line.into();
                active.quantity = Set(desired);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
                line_id
            }
            None => {
                let unit_price = match &variant {
                    Some(variant) => variant.final_price(product.price),
                    None => product.price,
                };
                let line = cart_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    variant_id: Set(input.variant_id),
                    quantity: Set(input.quantity),
                    unit_price: Set(unit_price),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                line.insert(&txn).await?.id
            }
        };

        let entry = self
            .stock
            .reserve(&txn, product.id, input.variant_id, input.quantity)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: product.id,
                variant_id: input.variant_id,
                quantity: input.quantity,
            })
            .await;
        if entry.is_low_stock() {
            self.event_sender
                .send_or_log(Event::LowStock {
                    product_id: entry.product_id,
                    variant_id: entry.variant_id,
                    available: entry.available_quantity(),
                    min_stock_level: entry.min_stock_level,
                })
                .await;
        }

        info!(
            "Added {}x product {} to cart {} (line {})",
            input.quantity, product.id, cart.id, line_id
        );
        self.get_cart_detail(session_id).await
    }

    /// Sets a line to `new_quantity`, rebalancing the reservation. Zero or
    /// negative removes the line entirely.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        session_id: &str,
        line_id: Uuid,
        new_quantity: i32,
    ) -> Result<CartDetail, ServiceError> {
        let cart = self.require_cart(session_id).await?;
        let txn = self.db.begin().await?;

        let line = CartLine::find_by_id(line_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart line {} not found", line_id)))?;
        if line.cart_id != cart.id {
            return Err(ServiceError::InvalidOperation(
                "Line does not belong to this cart".to_string(),
            ));
        }

        if new_quantity <= 0 {
            self.stock
                .release(&txn, line.product_id, line.variant_id, line.quantity)
                .await?;
            let removed_line_id = line.id;
            line.delete(&txn).await?;
            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::CartItemRemoved {
                    cart_id: cart.id,
                    line_id: removed_line_id,
                })
                .await;
            return self.get_cart_detail(session_id).await;
        }

        // Release-then-reserve: a failed reserve rolls the whole update back,
        // and its InsufficientStock carries availability as if this line's
        // old reservation had been given back first.
        self.stock
            .release(&txn, line.product_id, line.variant_id, line.quantity)
            .await?;
        self.stock
            .reserve(&txn, line.product_id, line.variant_id, new_quantity)
            .await?;

        let mut active: cart_line::ActiveModel = line.into();
        active.quantity = Set(new_quantity);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                line_id,
                quantity: new_quantity,
            })
            .await;
        self.get_cart_detail(session_id).await
    }

    /// Removes a line and releases its reservation.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        session_id: &str,
        line_id: Uuid,
    ) -> Result<CartDetail, ServiceError> {
        self.update_item(session_id, line_id, 0).await
    }

    /// Releases every reservation, deletes all lines and drops the coupon
    /// association. Called on explicit emptying; checkout does its own line
    /// cleanup because reservations are already released there.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, session_id: &str) -> Result<(), ServiceError> {
        let cart = self.require_cart(session_id).await?;
        let txn = self.db.begin().await?;

        let lines = cart.find_related(CartLine).all(&txn).await?;
        for line in &lines {
            self.stock
                .release(&txn, line.product_id, line.variant_id, line.quantity)
                .await?;
        }

        CartLine::delete_many()
            .filter(cart_line::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let mut cart_update: cart::ActiveModel = cart.clone().into();
        cart_update.coupon_id = Set(None);
        cart_update.updated_at = Set(Utc::now());
        cart_update.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart.id))
            .await;
        info!("Cleared cart {}", cart.id);
        Ok(())
    }

    /// Associates a coupon with the session's cart after validating it
    /// against the current total.
    #[instrument(skip(self))]
    pub async fn apply_coupon(
        &self,
        session_id: &str,
        code: &str,
    ) -> Result<CartDetail, ServiceError> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Coupon code must not be empty".to_string(),
            ));
        }

        let cart = self.get_or_create_cart(session_id).await?;
        let coupon = Coupon::find()
            .filter(coupon::Column::Code.eq(code))
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::CouponNotFound)?;

        if !coupon.is_valid_at(Utc::now()) {
            return Err(ServiceError::CouponInvalid);
        }

        let (subtotal, _) = self.cart_sums(&*self.db, cart.id).await?;
        if subtotal < coupon.min_amount {
            return Err(ServiceError::ValidationError(format!(
                "The minimum amount for this coupon is {}",
                coupon.min_amount
            )));
        }

        let coupon_id = coupon.id;
        let mut active: cart::ActiveModel = cart.clone().into();
        active.coupon_id = Set(Some(coupon_id));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CouponApplied {
                cart_id: cart.id,
                coupon_id,
            })
            .await;
        self.get_cart_detail(session_id).await
    }

    /// Drops the cart's coupon association, if any.
    #[instrument(skip(self))]
    pub async fn remove_coupon(&self, session_id: &str) -> Result<CartDetail, ServiceError> {
        let cart = self.require_cart(session_id).await?;

        if cart.coupon_id.is_some() {
            let mut active: cart::ActiveModel = cart.clone().into();
            active.coupon_id = Set(None);
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;

            self.event_sender
                .send_or_log(Event::CouponRemoved { cart_id: cart.id })
                .await;
        }

        self.get_cart_detail(session_id).await
    }

    /// Full cart view with lines, totals and the re-evaluated discount.
    /// A coupon that has gone missing or invalid is detached here, exactly as
    /// the cart page would show it.
    #[instrument(skip(self))]
    pub async fn get_cart_detail(&self, session_id: &str) -> Result<CartDetail, ServiceError> {
        let cart = self.get_or_create_cart(session_id).await?;

        let lines = CartLine::find()
            .filter(cart_line::Column::CartId.eq(cart.id))
            .order_by_asc(cart_line::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut views = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;
        let mut item_count = 0;
        for (line, product) in lines {
            let variant = match line.variant_id {
                Some(variant_id) => ProductVariant::find_by_id(variant_id).one(&*self.db).await?,
                None => None,
            };
            subtotal += line.line_total();
            item_count += line.quantity;
            views.push(CartLineView::build(line, product, variant));
        }

        let (applied_coupon, discount) = self.resolve_coupon(&cart, subtotal).await?;

        Ok(CartDetail {
            total: subtotal - discount,
            cart,
            lines: views,
            subtotal,
            discount,
            item_count,
            applied_coupon,
        })
    }

    /// Item count for the cart badge.
    pub async fn item_count(&self, session_id: &str) -> Result<i32, ServiceError> {
        match self.find_cart(&*self.db, session_id).await? {
            Some(cart) => {
                let (_, count) = self.cart_sums(&*self.db, cart.id).await?;
                Ok(count)
            }
            None => Ok(0),
        }
    }

    async fn require_cart(&self, session_id: &str) -> Result<cart::Model, ServiceError> {
        self.find_cart(&*self.db, session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No cart for session {}", session_id)))
    }

    fn line_query(
        cart_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> sea_orm::Select<CartLine> {
        let query = CartLine::find()
            .filter(cart_line::Column::CartId.eq(cart_id))
            .filter(cart_line::Column::ProductId.eq(product_id));
        match variant_id {
            Some(variant_id) => query.filter(cart_line::Column::VariantId.eq(variant_id)),
            None => query.filter(cart_line::Column::VariantId.is_null()),
        }
    }

    async fn cart_sums<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> Result<(Decimal, i32), ServiceError> {
        let lines = CartLine::find()
            .filter(cart_line::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let subtotal = lines.iter().map(|l| l.line_total()).sum();
        let count = lines.iter().map(|l| l.quantity).sum();
        Ok((subtotal, count))
    }

    /// Re-evaluates the cart's coupon against the current subtotal. Detaches
    /// the association when the coupon no longer resolves or validates.
    async fn resolve_coupon(
        &self,
        cart: &cart::Model,
        subtotal: Decimal,
    ) -> Result<(Option<coupon::Model>, Decimal), ServiceError> {
        let Some(coupon_id) = cart.coupon_id else {
            return Ok((None, Decimal::ZERO));
        };

        let coupon = Coupon::find_by_id(coupon_id).one(&*self.db).await?;
        match coupon {
            Some(coupon) if coupon.is_valid_at(Utc::now()) => {
                let discount = coupon.discount_for(subtotal, Utc::now());
                Ok((Some(coupon), discount))
            }
            _ => {
                let mut active: cart::ActiveModel = cart.clone().into();
                active.coupon_id = Set(None);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?;
                Ok((None, Decimal::ZERO))
            }
        }
    }
}

/// Input for adding a product to the cart.
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

/// One cart line as the storefront renders it.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub display_name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl CartLineView {
    fn build(
        line: cart_line::Model,
        product: Option<product::Model>,
        variant: Option<product_variant::Model>,
    ) -> Self {
        let product_name = product
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Producto".to_string());
        let display_name = match &variant {
            Some(variant) => format!("{} - {}", product_name, variant.display_label()),
            None => product_name,
        };
        let sku = variant
            .as_ref()
            .map(|v| v.sku.clone())
            .or_else(|| product.as_ref().map(|p| p.sku.clone()))
            .unwrap_or_default();

        Self {
            id: line.id,
            product_id: line.product_id,
            variant_id: line.variant_id,
            display_name,
            sku,
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total(),
        }
    }
}

/// Cart with lines and derived totals; never cached, always recomputed.
#[derive(Debug, Serialize)]
pub struct CartDetail {
    pub cart: cart::Model,
    pub lines: Vec<CartLineView>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub item_count: i32,
    pub applied_coupon: Option<coupon::Model>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn add_item_input_deserializes_without_variant() {
        let json = r#"{
            "product_id": "550e8400-e29b-41d4-a716-446655440000",
            "quantity": 3
        }"#;

        let input: AddItemInput = serde_json::from_str(json).expect("valid payload");
        assert_eq!(input.quantity, 3);
        assert!(input.variant_id.is_none());
    }

    #[test]
    fn line_view_falls_back_when_catalog_rows_are_gone() {
        let line = cart_line::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variant_id: None,
            quantity: 2,
            unit_price: dec!(100.00),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let view = CartLineView::build(line, None, None);
        assert_eq!(view.display_name, "Producto");
        assert_eq!(view.line_total, dec!(200.00));
    }

    #[test]
    fn line_view_includes_variant_label_and_sku() {
        let product_id = Uuid::new_v4();
        let line = cart_line::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id,
            variant_id: Some(Uuid::new_v4()),
            quantity: 1,
            unit_price: dec!(500.00),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let product = product::Model {
            id: product_id,
            sku: "TALAD-01".to_string(),
            name: "Taladro inalámbrico".to_string(),
            price: dec!(450.00),
            original_price: None,
            stock: 10,
            is_featured: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let variant = product_variant::Model {
            id: line.variant_id.unwrap(),
            product_id,
            name: "Voltaje".to_string(),
            value: "20V".to_string(),
            sku: "TALAD-01-VOL-20V".to_string(),
            price_modifier: dec!(50.00),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let view = CartLineView::build(line, Some(product), Some(variant));
        assert_eq!(view.display_name, "Taladro inalámbrico - Voltaje: 20V");
        assert_eq!(view.sku, "TALAD-01-VOL-20V");
    }
}
