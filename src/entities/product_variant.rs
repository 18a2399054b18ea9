use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product variant (color, tamaño, material, ...). A variant prices itself as
/// the parent product price plus its modifier; see `final_price`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub value: String,
    #[sea_orm(unique)]
    pub sku: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price_modifier: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(has_many = "super::stock_entry::Entity")]
    StockEntries,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::stock_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Price a cart line captures when this variant is chosen.
    pub fn final_price(&self, product_price: Decimal) -> Decimal {
        product_price + self.price_modifier
    }

    /// "Color: Rojo" style label used in messages and line displays.
    pub fn display_label(&self) -> String {
        format!("{}: {}", self.name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn final_price_adds_modifier() {
        let variant = Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "Tamaño".to_string(),
            value: "Grande".to_string(),
            sku: "MART-001-TAM-GRA".to_string(),
            price_modifier: dec!(50.00),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(variant.final_price(dec!(450.00)), dec!(500.00));
        assert_eq!(variant.display_label(), "Tamaño: Grande");
    }
}
