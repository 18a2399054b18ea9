use crate::{
    entities::{product, product_variant, Product, ProductVariant},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Catalog reader plus the minimal intake surface operators use to load the
/// catalog. The storefront core itself never mutates products.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let existing = Product::find()
            .filter(product::Column::Sku.eq(input.sku.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Product with SKU {} already exists",
                input.sku
            )));
        }

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(input.sku),
            name: Set(input.name),
            price: Set(input.price),
            original_price: Set(input.original_price),
            stock: Set(input.stock.unwrap_or(0)),
            is_featured: Set(input.is_featured.unwrap_or(false)),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;
        info!("Created product {} ({})", created.name, created.sku);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn create_variant(
        &self,
        product_id: Uuid,
        input: CreateVariantInput,
    ) -> Result<product_variant::Model, ServiceError> {
        input.validate()?;

        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let model = product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            name: Set(input.name),
            value: Set(input.value),
            sku: Set(input.sku),
            price_modifier: Set(input.price_modifier.unwrap_or(Decimal::ZERO)),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        Ok(model.insert(&*self.db).await?)
    }

    /// Active products, newest first.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let paginator = Product::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((products, total))
    }

    /// Product with its active variants.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductWithVariants, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let variants = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .filter(product_variant::Column::IsActive.eq(true))
            .order_by_asc(product_variant::Column::Name)
            .all(&*self.db)
            .await?;

        Ok(ProductWithVariants { product, variants })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVariantInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub value: String,
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    pub price_modifier: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct ProductWithVariants {
    pub product: product::Model,
    pub variants: Vec<product_variant::Model>,
}
