use crate::{
    entities::{
        inventory_movement::MovementType, order, order_item, shipment, Order, OrderItem, Shipment,
    },
    entities::order::OrderStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    services::movements::{MovementService, RecordMovementInput},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Warehouse dispatch. Shipping an order is one explicit orchestration:
/// guard the status, create the shipment, append one `out` movement per
/// item, flip the order to `shipped` — all inside a single transaction.
#[derive(Clone)]
pub struct ShipmentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    movements: Arc<MovementService>,
}

impl ShipmentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        movements: Arc<MovementService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            movements,
        }
    }

    /// Dispatches an order sitting in `ready_to_ship`. Any other status is a
    /// guarded no-op reported as `OrderNotInExpectedState`. A shipment that
    /// already exists for the order short-circuits: the status still flips,
    /// but no second round of movements is emitted.
    #[instrument(skip(self, input))]
    pub async fn ship_order(
        &self,
        order_number: &str,
        input: ShipOrderInput,
    ) -> Result<shipment::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;

        if order.status != OrderStatus::ReadyToShip {
            return Err(ServiceError::OrderNotInExpectedState {
                expected: OrderStatus::ReadyToShip.to_string(),
                actual: order.status.to_string(),
            });
        }

        let order_id = order.id;
        let old_status = order.status;

        let existing = Shipment::find()
            .filter(shipment::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?;

        let (shipment, is_new) = match existing {
            Some(shipment) => (shipment, false),
            None => {
                let model = shipment::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    tracking_number: Set(input.tracking_number.unwrap_or_default()),
                    carrier: Set(input
                        .carrier
                        .unwrap_or_else(|| "Sin especificar".to_string())),
                    shipped_at: Set(Utc::now()),
                    notes: Set(input
                        .notes
                        .unwrap_or_else(|| "Despachado automáticamente".to_string())),
                };
                (model.insert(&txn).await?, true)
            }
        };

        if is_new {
            let items = OrderItem::find()
                .filter(order_item::Column::OrderId.eq(order_id))
                .all(&txn)
                .await?;
            for item in &items {
                self.movements
                    .record(
                        &txn,
                        RecordMovementInput {
                            product_id: item.product_id,
                            variant_id: item.variant_id,
                            movement_type: MovementType::Out,
                            quantity: item.quantity,
                            reason: format!("Despacho orden {}", order_number),
                            order_id: Some(order_id),
                            notes: None,
                        },
                    )
                    .await?;
            }
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Shipped);
        active.updated_at = Set(Utc::now());
        let updated_order = active.update(&txn).await?;

        txn.commit().await?;

        if is_new {
            self.event_sender
                .send_or_log(Event::ShipmentCreated {
                    shipment_id: shipment.id,
                    order_id,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: updated_order.status.to_string(),
            })
            .await;

        info!("Dispatched order {} (shipment {})", order_number, shipment.id);
        Ok(shipment)
    }

    /// Shipments for one order.
    pub async fn get_shipments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<shipment::Model>, ServiceError> {
        Ok(Shipment::find()
            .filter(shipment::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    /// All shipments, most recent dispatch first.
    #[instrument(skip(self))]
    pub async fn list_shipments(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        let paginator = Shipment::find()
            .order_by_desc(shipment::Column::ShippedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let shipments = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((shipments, total))
    }
}

/// Optional dispatch details; the warehouse UI mostly ships with defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ShipOrderInput {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ship_order_input_defaults_to_empty() {
        let input: ShipOrderInput = serde_json::from_str("{}").expect("valid payload");
        assert!(input.tracking_number.is_none());
        assert!(input.carrier.is_none());
        assert!(input.notes.is_none());
    }
}
