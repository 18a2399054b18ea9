use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{errors::ApiError, services::orders::CheckoutInput, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Storefront checkout and order lookup.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout/:session_id", post(checkout))
        .route("/orders/:session_id/:order_number", get(order_detail))
}

/// Convert the session's cart into an order.
async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .place_order(&session_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

/// Order detail, restricted to the session that placed it.
async fn order_detail(
    State(state): State<Arc<AppState>>,
    Path((session_id, order_number)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .orders
        .get_order_for_session(&session_id, &order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}
