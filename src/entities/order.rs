use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Customer order: an immutable snapshot taken at checkout. Money columns are
/// frozen at creation; only `status` advances afterwards.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    #[validate(length(min = 1, max = 20))]
    pub order_number: String,

    pub session_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_zip_code: String,
    pub status: OrderStatus,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total: Decimal,
    #[sea_orm(nullable)]
    pub coupon_id: Option<Uuid>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipments,
    #[sea_orm(
        belongs_to = "super::coupon::Entity",
        from = "Column::CouponId",
        to = "super::coupon::Column::Id"
    )]
    Coupon,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fulfillment status. Forward transitions are strictly linear; `Cancelled`
/// is terminal and reachable from any pre-delivered state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "ready_to_ship")]
    ReadyToShip,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// The state a forward transition must find the order in, or None for the
    /// entry state and for cancellation (which has its own guard).
    pub fn required_predecessor(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending | OrderStatus::Cancelled => None,
            OrderStatus::Confirmed => Some(OrderStatus::Pending),
            OrderStatus::ReadyToShip => Some(OrderStatus::Confirmed),
            OrderStatus::Shipped => Some(OrderStatus::ReadyToShip),
            OrderStatus::Delivered => Some(OrderStatus::Shipped),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Cancellation guard: any state before delivery that is not already
    /// terminal. Pending a product decision on narrower rules.
    pub fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn forward_transitions_are_strictly_linear() {
        assert_eq!(
            OrderStatus::Confirmed.required_predecessor(),
            Some(OrderStatus::Pending)
        );
        assert_eq!(
            OrderStatus::ReadyToShip.required_predecessor(),
            Some(OrderStatus::Confirmed)
        );
        assert_eq!(
            OrderStatus::Shipped.required_predecessor(),
            Some(OrderStatus::ReadyToShip)
        );
        assert_eq!(
            OrderStatus::Delivered.required_predecessor(),
            Some(OrderStatus::Shipped)
        );
    }

    #[test]
    fn cancellation_allowed_from_any_pre_delivered_state() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Confirmed.can_cancel());
        assert!(OrderStatus::ReadyToShip.can_cancel());
        assert!(OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(OrderStatus::ReadyToShip.to_string(), "ready_to_ship");
        assert_eq!(
            OrderStatus::from_str("ready_to_ship").unwrap(),
            OrderStatus::ReadyToShip
        );
        assert!(OrderStatus::from_str("unknown").is_err());
    }
}
