use crate::{
    entities::{coupon, Coupon},
    errors::ServiceError,
    events::EventSender,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Coupon administration and redemption. The validity window / discount math
/// itself lives on the entity; this service owns persistence and the
/// `used_count` bookkeeping.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
    #[allow(dead_code)]
    event_sender: Arc<EventSender>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a coupon with a normalized (upper-case) unique code.
    #[instrument(skip(self))]
    pub async fn create_coupon(
        &self,
        input: CreateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        input.validate()?;

        let code = input.code.trim().to_uppercase();
        if input.discount_value <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount value must be positive".to_string(),
            ));
        }
        if input.valid_from >= input.valid_to {
            return Err(ServiceError::ValidationError(
                "valid_from must precede valid_to".to_string(),
            ));
        }
        if input.discount_type == coupon::DiscountType::Percentage
            && input.discount_value > Decimal::from(100)
        {
            return Err(ServiceError::ValidationError(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }

        let existing = Coupon::find()
            .filter(coupon::Column::Code.eq(code.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Coupon {} already exists",
                code
            )));
        }

        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            description: Set(input.description.unwrap_or_default()),
            discount_type: Set(input.discount_type),
            discount_value: Set(input.discount_value),
            min_amount: Set(input.min_amount.unwrap_or(Decimal::ZERO)),
            max_discount: Set(input.max_discount),
            is_active: Set(true),
            valid_from: Set(input.valid_from),
            valid_to: Set(input.valid_to),
            usage_limit: Set(input.usage_limit),
            used_count: Set(0),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;
        info!("Created coupon {}", code);
        Ok(created)
    }

    pub async fn get_by_code(&self, code: &str) -> Result<coupon::Model, ServiceError> {
        Coupon::find()
            .filter(coupon::Column::Code.eq(code.trim().to_uppercase()))
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::CouponNotFound)
    }

    #[instrument(skip(self))]
    pub async fn list_coupons(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<coupon::Model>, u64), ServiceError> {
        let paginator = Coupon::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let coupons = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((coupons, total))
    }

    /// Marks one confirmed use. Returns `false` without mutating when the
    /// coupon is no longer valid; callers must check the result.
    #[instrument(skip(self, conn))]
    pub async fn redeem<C: ConnectionTrait>(
        &self,
        conn: &C,
        coupon_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let coupon = Coupon::find_by_id(coupon_id)
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or(ServiceError::CouponNotFound)?;

        if !coupon.is_valid_at(Utc::now()) {
            return Ok(false);
        }

        let used = coupon.used_count + 1;
        let mut active: coupon::ActiveModel = coupon.into();
        active.used_count = Set(used);
        active.update(conn).await?;
        Ok(true)
    }
}

/// Input for coupon creation.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponInput {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: coupon::DiscountType,
    pub discount_value: Decimal,
    pub min_amount: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub usage_limit: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn create_coupon_input_deserializes() {
        let json = r#"{
            "code": "verano10",
            "discount_type": "percentage",
            "discount_value": "10.00",
            "min_amount": "500.00",
            "valid_from": "2025-06-01T00:00:00Z",
            "valid_to": "2025-08-31T23:59:59Z"
        }"#;

        let input: CreateCouponInput = serde_json::from_str(json).expect("valid payload");
        assert_eq!(input.code, "verano10");
        assert_eq!(input.discount_type, coupon::DiscountType::Percentage);
        assert!(input.usage_limit.is_none());
    }

    fn arb_decimal(max_units: i64) -> impl Strategy<Value = Decimal> {
        (0..max_units).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        // The discount is bounded by the order amount for any coupon shape.
        #[test]
        fn discount_never_exceeds_amount(
            amount in arb_decimal(10_000_000),
            value in arb_decimal(1_000_000),
            fixed in proptest::bool::ANY,
        ) {
            let now = Utc::now();
            let c = coupon::Model {
                id: Uuid::new_v4(),
                code: "PROP".to_string(),
                description: String::new(),
                discount_type: if fixed {
                    coupon::DiscountType::Fixed
                } else {
                    coupon::DiscountType::Percentage
                },
                discount_value: value,
                min_amount: Decimal::ZERO,
                max_discount: None,
                is_active: true,
                valid_from: now - Duration::days(1),
                valid_to: now + Duration::days(1),
                usage_limit: None,
                used_count: 0,
                created_at: now,
            };

            let discount = c.discount_for(amount, now);
            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= amount);
        }

        // Below the minimum the discount is exactly zero.
        #[test]
        fn discount_zero_below_minimum(amount in arb_decimal(100_000)) {
            let now = Utc::now();
            let c = coupon::Model {
                id: Uuid::new_v4(),
                code: "PROP".to_string(),
                description: String::new(),
                discount_type: coupon::DiscountType::Fixed,
                discount_value: dec!(100.00),
                min_amount: dec!(1001.00),
                max_discount: None,
                is_active: true,
                valid_from: now - Duration::days(1),
                valid_to: now + Duration::days(1),
                usage_limit: None,
                used_count: 0,
                created_at: now,
            };

            prop_assume!(amount < c.min_amount);
            prop_assert_eq!(c.discount_for(amount, now), Decimal::ZERO);
        }
    }
}
