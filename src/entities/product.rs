use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product. Read-only from the storefront core's point of view; the
/// `stock` column is the legacy nominal count used only to seed stock entries.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub sku: String,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub original_price: Option<Decimal>,
    pub stock: i32,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_variant::Entity")]
    Variants,
    #[sea_orm(has_many = "super::stock_entry::Entity")]
    StockEntries,
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variants.def()
    }
}

impl Related<super::stock_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Featured products can carry a strike-through price.
    pub fn has_discount(&self) -> bool {
        self.is_featured
            && self
                .original_price
                .map(|original| original > self.price)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, original: Option<Decimal>, featured: bool) -> Model {
        Model {
            id: Uuid::new_v4(),
            sku: "MART-001".to_string(),
            name: "Martillo de carpintero".to_string(),
            price,
            original_price: original,
            stock: 10,
            is_featured: featured,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn discount_requires_featured_and_higher_original_price() {
        assert!(product(dec!(450.00), Some(dec!(500.00)), true).has_discount());
        assert!(!product(dec!(450.00), Some(dec!(500.00)), false).has_discount());
        assert!(!product(dec!(500.00), Some(dec!(450.00)), true).has_discount());
        assert!(!product(dec!(450.00), None, true).has_discount());
    }
}
