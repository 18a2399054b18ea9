use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    services::products::{CreateProductInput, CreateVariantInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Catalog routes. The storefront reads them; the intake endpoints exist for
/// operators loading the catalog.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/", post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/variants", post(create_variant))
}

/// Active products, newest first.
#[utoipa::path(
    get,
    path = "/products",
    params(PaginationParams),
    responses((status = 200, description = "Products returned")),
    tag = "catalog"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .products
        .list_products(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        products,
        params.page,
        params.per_page,
        total,
    )))
}

/// Product with its active variants.
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Operator intake: add a product to the catalog.
async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .products
        .create_product(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

/// Operator intake: add a variant to a product.
async fn create_variant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateVariantInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let variant = state
        .services
        .products
        .create_variant(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(variant))
}
