use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discount coupon. Validity and discount math live here; persistence and
/// redemption bookkeeping live in the coupon service.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub discount_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub min_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub max_discount: Option<Decimal>,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

impl Model {
    /// Valid iff active, inside the validity window, and under the usage cap.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if now < self.valid_from || now > self.valid_to {
            return false;
        }
        if let Some(limit) = self.usage_limit {
            if self.used_count >= limit {
                return false;
            }
        }
        true
    }

    /// Discount granted against `amount`. Zero when the coupon is invalid or
    /// the amount is under the minimum; percentage discounts are capped at
    /// `max_discount` when set; the result never exceeds `amount`.
    pub fn discount_for(&self, amount: Decimal, now: DateTime<Utc>) -> Decimal {
        if !self.is_valid_at(now) || amount < self.min_amount {
            return Decimal::ZERO;
        }

        let discount = match self.discount_type {
            DiscountType::Percentage => {
                let raw = amount * self.discount_value / Decimal::from(100);
                match self.max_discount {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
            DiscountType::Fixed => self.discount_value,
        };

        discount.min(amount).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType, value: Decimal) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            code: "FERRETERO20".to_string(),
            description: String::new(),
            discount_type,
            discount_value: value,
            min_amount: dec!(1000.00),
            max_discount: Some(dec!(500.00)),
            is_active: true,
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(30),
            usage_limit: Some(100),
            used_count: 0,
            created_at: now,
        }
    }

    #[test]
    fn percentage_discount_capped_at_max() {
        let c = coupon(DiscountType::Percentage, dec!(20.00));
        // 20% of 3000 = 600, capped at 500.
        assert_eq!(c.discount_for(dec!(3000.00), Utc::now()), dec!(500.00));
    }

    #[test]
    fn discount_is_zero_below_minimum_amount() {
        let c = coupon(DiscountType::Percentage, dec!(20.00));
        assert_eq!(c.discount_for(dec!(900.00), Utc::now()), Decimal::ZERO);
    }

    #[test]
    fn percentage_discount_without_cap() {
        let mut c = coupon(DiscountType::Percentage, dec!(10.00));
        c.max_discount = None;
        assert_eq!(c.discount_for(dec!(2000.00), Utc::now()), dec!(200.00));
    }

    #[test]
    fn fixed_discount_never_exceeds_amount() {
        let mut c = coupon(DiscountType::Fixed, dec!(1500.00));
        c.min_amount = Decimal::ZERO;
        assert_eq!(c.discount_for(dec!(1200.00), Utc::now()), dec!(1200.00));
    }

    #[test]
    fn discount_is_idempotent_for_same_inputs() {
        let c = coupon(DiscountType::Percentage, dec!(20.00));
        let now = Utc::now();
        let first = c.discount_for(dec!(3000.00), now);
        let second = c.discount_for(dec!(3000.00), now);
        assert_eq!(first, second);
    }

    #[test]
    fn inactive_coupon_is_invalid() {
        let mut c = coupon(DiscountType::Fixed, dec!(100.00));
        c.is_active = false;
        assert!(!c.is_valid_at(Utc::now()));
    }

    #[test]
    fn coupon_outside_window_is_invalid() {
        let mut c = coupon(DiscountType::Fixed, dec!(100.00));
        c.valid_to = Utc::now() - Duration::hours(1);
        assert!(!c.is_valid_at(Utc::now()));
    }

    #[test]
    fn exhausted_coupon_is_invalid() {
        let mut c = coupon(DiscountType::Fixed, dec!(100.00));
        c.usage_limit = Some(3);
        c.used_count = 3;
        assert!(!c.is_valid_at(Utc::now()));
    }

    #[test]
    fn unlimited_coupon_ignores_used_count() {
        let mut c = coupon(DiscountType::Fixed, dec!(100.00));
        c.usage_limit = None;
        c.used_count = 99_999;
        assert!(c.is_valid_at(Utc::now()));
    }
}
