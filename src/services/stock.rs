use crate::{
    config::AppConfig,
    entities::{product, stock_entry, StockEntry},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Stock ledger: one row per (product, variant) holding total and reserved
/// quantities. Every mutation fetches its row with an exclusive lock, so the
/// read-then-write sequences on `quantity`/`reserved_quantity` serialize per
/// entry; callers supply the transaction the whole request runs in.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
}

impl StockService {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Read-only lookup, outside any transaction.
    pub async fn get_entry(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Option<stock_entry::Model>, ServiceError> {
        Ok(Self::entry_query(product_id, variant_id)
            .one(&*self.db)
            .await?)
    }

    fn entry_query(product_id: Uuid, variant_id: Option<Uuid>) -> sea_orm::Select<StockEntry> {
        let query = StockEntry::find().filter(stock_entry::Column::ProductId.eq(product_id));
        match variant_id {
            Some(variant_id) => query.filter(stock_entry::Column::VariantId.eq(variant_id)),
            None => query.filter(stock_entry::Column::VariantId.is_null()),
        }
    }

    async fn find_locked<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Option<stock_entry::Model>, ServiceError> {
        Ok(Self::entry_query(product_id, variant_id)
            .lock_exclusive()
            .one(conn)
            .await?)
    }

    async fn require_locked<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<stock_entry::Model, ServiceError> {
        self.find_locked(conn, product_id, variant_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No stock entry for product {}", product_id))
            })
    }

    /// Idempotent lookup-or-create. A missing entry is seeded from the
    /// product's legacy nominal stock count; a lost insert race resolves by
    /// re-reading the winner's row.
    #[instrument(skip(self, conn, product), fields(product_id = %product.id))]
    pub async fn get_or_init<C: ConnectionTrait>(
        &self,
        conn: &C,
        product: &product::Model,
        variant_id: Option<Uuid>,
    ) -> Result<stock_entry::Model, ServiceError> {
        if let Some(entry) = self.find_locked(conn, product.id, variant_id).await? {
            return Ok(entry);
        }

        let entry = stock_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            variant_id: Set(variant_id),
            quantity: Set(product.stock),
            reserved_quantity: Set(0),
            min_stock_level: Set(self.config.default_min_stock_level),
            location: Set(self.config.default_stock_location.clone()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        match entry.insert(conn).await {
            Ok(created) => {
                info!(
                    "Initialized stock entry for product {} (variant {:?}) with {} units",
                    product.id, variant_id, product.stock
                );
                Ok(created)
            }
            // Unique index collision: another request initialized the entry
            // first. Re-read the winner; anything else is a real error.
            Err(err) => match self.find_locked(conn, product.id, variant_id).await? {
                Some(existing) => Ok(existing),
                None => Err(err.into()),
            },
        }
    }

    /// Explicit creation for inventory intake. Unlike `get_or_init`, a
    /// duplicate (product, variant) pair is reported, not absorbed.
    #[instrument(skip(self))]
    pub async fn create_entry(
        &self,
        input: CreateStockEntryInput,
    ) -> Result<stock_entry::Model, ServiceError> {
        let existing = self.get_entry(input.product_id, input.variant_id).await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Stock entry already exists for product {}",
                input.product_id
            )));
        }

        let entry = stock_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            variant_id: Set(input.variant_id),
            quantity: Set(input.quantity),
            reserved_quantity: Set(0),
            min_stock_level: Set(input
                .min_stock_level
                .unwrap_or(self.config.default_min_stock_level)),
            location: Set(input
                .location
                .unwrap_or_else(|| self.config.default_stock_location.clone())),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        Ok(entry.insert(&*self.db).await?)
    }

    /// Holds `qty` units for an uncommitted cart. Fails without mutating when
    /// fewer than `qty` units are available.
    #[instrument(skip(self, conn))]
    pub async fn reserve<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        qty: i32,
    ) -> Result<stock_entry::Model, ServiceError> {
        let entry = self.require_locked(conn, product_id, variant_id).await?;

        let available = entry.available_quantity();
        if available < qty {
            return Err(ServiceError::InsufficientStock { available });
        }

        let reserved = entry.reserved_quantity + qty;
        let mut active: stock_entry::ActiveModel = entry.into();
        active.reserved_quantity = Set(reserved);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }

    /// Gives back a reservation. Releasing more than is reserved signals a
    /// bug upstream; the ledger refuses and the caller's transaction should
    /// roll back.
    #[instrument(skip(self, conn))]
    pub async fn release<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        qty: i32,
    ) -> Result<stock_entry::Model, ServiceError> {
        let entry = self.require_locked(conn, product_id, variant_id).await?;

        if entry.reserved_quantity < qty {
            error!(
                "Release of {} units exceeds reservation of {} for product {} (variant {:?})",
                qty, entry.reserved_quantity, product_id, variant_id
            );
            return Err(ServiceError::InvalidRelease);
        }

        let reserved = entry.reserved_quantity - qty;
        let mut active: stock_entry::ActiveModel = entry.into();
        active.reserved_quantity = Set(reserved);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }

    /// Permanently removes `qty` owned units (order confirmation, dispatch).
    /// Reservations are a separate field: callers release the matching
    /// reservation themselves.
    #[instrument(skip(self, conn))]
    pub async fn consume<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        qty: i32,
    ) -> Result<stock_entry::Model, ServiceError> {
        let entry = self.require_locked(conn, product_id, variant_id).await?;

        let available = entry.available_quantity();
        if available < qty {
            return Err(ServiceError::InsufficientStock { available });
        }

        let quantity = entry.quantity - qty;
        let mut active: stock_entry::ActiveModel = entry.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }

    /// Unconditional inbound intake.
    #[instrument(skip(self, conn))]
    pub async fn add<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        qty: i32,
    ) -> Result<stock_entry::Model, ServiceError> {
        let entry = self.require_locked(conn, product_id, variant_id).await?;

        let quantity = entry.quantity + qty;
        let mut active: stock_entry::ActiveModel = entry.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }

    /// Overwrites the total quantity (adjustment movements). Deliberately does
    /// not validate against the reservation, so an adjustment can drive
    /// availability negative; admin override semantics, kept as-is.
    #[instrument(skip(self, conn))]
    pub async fn set_absolute<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        qty: i32,
    ) -> Result<stock_entry::Model, ServiceError> {
        let entry = self.require_locked(conn, product_id, variant_id).await?;

        if qty < entry.reserved_quantity {
            warn!(
                "Adjustment sets quantity {} below reservation {} for product {} (variant {:?})",
                qty, entry.reserved_quantity, product_id, variant_id
            );
        }

        let mut active: stock_entry::ActiveModel = entry.into();
        active.quantity = Set(qty);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }

    /// Entries at or below their reorder threshold, for the warehouse report.
    #[instrument(skip(self))]
    pub async fn low_stock(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_entry::Model>, u64), ServiceError> {
        // available (= quantity - reserved) <= min_stock_level, evaluated
        // database-side over the raw columns.
        let paginator = StockEntry::find()
            .filter(
                sea_orm::Condition::all().add(
                    sea_orm::sea_query::Expr::col(stock_entry::Column::Quantity)
                        .sub(sea_orm::sea_query::Expr::col(
                            stock_entry::Column::ReservedQuantity,
                        ))
                        .lte(sea_orm::sea_query::Expr::col(
                            stock_entry::Column::MinStockLevel,
                        )),
                ),
            )
            .order_by_asc(stock_entry::Column::Quantity)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((entries, total))
    }

    /// Lists the whole ledger for the warehouse stock screen.
    pub async fn list_entries(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_entry::Model>, u64), ServiceError> {
        let paginator = StockEntry::find()
            .order_by_asc(stock_entry::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((entries, total))
    }
}

/// Input for explicit stock entry creation (inventory intake).
#[derive(Debug, Deserialize)]
pub struct CreateStockEntryInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub min_stock_level: Option<i32>,
    pub location: Option<String>,
}
