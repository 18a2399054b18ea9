use crate::{
    entities::{
        inventory_movement::{self, MovementType},
        product, InventoryMovement, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock::StockService,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Append-only movement journal. Recording a movement applies its effect to
/// the matching stock entry in the same transaction: `in` adds, `out`
/// consumes, `adjustment` overwrites the absolute quantity.
#[derive(Clone)]
pub struct MovementService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    stock: Arc<StockService>,
}

impl MovementService {
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

    /// Records a movement inside the caller's transaction. The journal row is
    /// kept even when the stock application fails (missing entry, not enough
    /// available units); the failure is logged. The legacy system behaved the
    /// same way and the warehouse relies on the journal being complete.
    #[instrument(skip(self, conn))]
    pub async fn record<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: RecordMovementInput,
    ) -> Result<inventory_movement::Model, ServiceError> {
        if input.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Movement quantity must not be negative".to_string(),
            ));
        }

        let movement = inventory_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            variant_id: Set(input.variant_id),
            movement_type: Set(input.movement_type),
            quantity: Set(input.quantity),
            reason: Set(input.reason),
            order_id: Set(input.order_id),
            notes: Set(input.notes.unwrap_or_default()),
            created_at: Set(Utc::now()),
        };
        let created = movement.insert(conn).await?;

        let applied = match input.movement_type {
            MovementType::In => match self.ensure_entry(conn, input.product_id, input.variant_id).await {
                Ok(()) => self
                    .stock
                    .add(conn, input.product_id, input.variant_id, input.quantity)
                    .await
                    .map(|_| ()),
                Err(err) => Err(err),
            },
            MovementType::Out => self
                .stock
                .consume(conn, input.product_id, input.variant_id, input.quantity)
                .await
                .map(|_| ()),
            MovementType::Adjustment => self
                .stock
                .set_absolute(conn, input.product_id, input.variant_id, input.quantity)
                .await
                .map(|_| ()),
        };

        if let Err(err) = applied {
            warn!(
                movement_id = %created.id,
                "Movement recorded but stock application failed: {}",
                err
            );
        }

        Ok(created)
    }

    /// Records a movement as its own unit of work (warehouse intake and
    /// adjustment screens).
    #[instrument(skip(self))]
    pub async fn record_standalone(
        &self,
        input: RecordMovementInput,
    ) -> Result<inventory_movement::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let created = self.record(&txn, input).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::MovementRecorded {
                movement_id: created.id,
                movement_type: created.movement_type.to_string(),
                quantity: created.quantity,
            })
            .await;
        info!(
            "Recorded {} movement of {} units for product {}",
            created.movement_type, created.quantity, created.product_id
        );
        Ok(created)
    }

    /// Movement journal, newest first, optionally filtered by type.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        page: u64,
        limit: u64,
        movement_type: Option<MovementType>,
    ) -> Result<(Vec<inventory_movement::Model>, u64), ServiceError> {
        let mut query = InventoryMovement::find();
        if let Some(movement_type) = movement_type {
            query = query.filter(inventory_movement::Column::MovementType.eq(movement_type));
        }

        let paginator = query
            .order_by_desc(inventory_movement::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let movements = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((movements, total))
    }

    /// Inbound intake may target a product that never had a ledger row;
    /// initialize it (seeded from the catalog's nominal count) before adding.
    async fn ensure_entry<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let product: product::Model = Product::find_by_id(product_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        self.stock.get_or_init(conn, &product, variant_id).await?;
        Ok(())
    }
}

/// Input for recording an inventory movement.
#[derive(Debug, Deserialize)]
pub struct RecordMovementInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: String,
    pub order_id: Option<Uuid>,
    pub notes: Option<String>,
}
