use crate::handlers::common::{map_service_error, no_content_response, success_response};
use crate::{errors::ApiError, services::carts::AddItemInput, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Storefront cart routes, keyed by the caller's session id.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:session_id", get(get_cart))
        .route("/:session_id/items", post(add_item))
        .route("/:session_id/items/:line_id", put(update_item))
        .route("/:session_id/items/:line_id", delete(remove_item))
        .route("/:session_id/clear", post(clear_cart))
        .route("/:session_id/count", get(cart_count))
        .route("/:session_id/coupon", post(apply_coupon))
        .route("/:session_id/coupon", delete(remove_coupon))
}

/// Cart detail with lines, totals and the applied coupon.
async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .carts
        .get_cart_detail(&session_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Add a product (or variant) to the cart, reserving stock.
async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let input = AddItemInput {
        product_id: payload.product_id,
        variant_id: payload.variant_id,
        quantity: payload.quantity,
    };

    let detail = state
        .services
        .carts
        .add_item(&session_id, input)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Change a line's quantity (0 removes it).
async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((session_id, line_id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .carts
        .update_item(&session_id, line_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Remove a line, releasing its reservation.
async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((session_id, line_id)): Path<(String, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .carts
        .remove_item(&session_id, line_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Empty the cart and release every reservation.
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .carts
        .clear_cart(&session_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Item count for the cart badge.
async fn cart_count(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let count = state
        .services
        .carts
        .item_count(&session_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({ "count": count })))
}

/// Apply a coupon code to the cart.
async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<ApplyCouponRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .carts
        .apply_coupon(&session_id, &payload.coupon_code)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Remove the applied coupon.
async fn remove_coupon(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .carts
        .remove_coupon(&session_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct ApplyCouponRequest {
    coupon_code: String,
}
