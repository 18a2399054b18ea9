use crate::handlers::common::{
    created_response, map_service_error, success_response, PaginatedResponse, PaginationParams,
};
use crate::{
    entities::{inventory_movement::MovementType, order::OrderStatus},
    errors::ApiError,
    services::movements::RecordMovementInput,
    services::shipments::ShipOrderInput,
    services::stock::CreateStockEntryInput,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use utoipa::IntoParams;

/// Warehouse operator routes: order workflow, movement journal, shipments,
/// stock screens.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders", delete(purge_orders))
        .route("/orders/:order_number", get(order_detail))
        .route("/orders/:order_number/confirm", post(confirm_order))
        .route("/orders/:order_number/ready", post(mark_ready_to_ship))
        .route("/orders/:order_number/ship", post(ship_order))
        .route("/orders/:order_number/deliver", post(mark_delivered))
        .route("/orders/:order_number/cancel", post(cancel_order))
        .route("/movements", get(list_movements))
        .route("/movements", post(record_movement))
        .route("/shipments", get(list_shipments))
        .route("/stock", get(list_stock))
        .route("/stock", post(create_stock_entry))
        .route("/stock/low", get(low_stock))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListFilters {
    /// Fulfillment status to filter by (e.g. `pending`, `ready_to_ship`)
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}
fn default_per_page() -> u64 {
    20
}

/// List orders for the warehouse screen, newest first.
#[utoipa::path(
    get,
    path = "/warehouse/orders",
    params(OrderListFilters),
    responses(
        (status = 200, description = "Orders returned"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<OrderListFilters>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = match filters.status.as_deref() {
        Some(raw) => match OrderStatus::from_str(raw) {
            Ok(status) => Some(status),
            // Unknown status filters match nothing, mirroring the legacy
            // warehouse list.
            Err(_) => {
                return Ok(success_response(PaginatedResponse::<
                    crate::entities::order::Model,
                >::new(
                    vec![], filters.page, filters.per_page, 0
                )))
            }
        },
        None => None,
    };

    let (orders, total) = state
        .services
        .orders
        .list_orders(filters.page, filters.per_page, status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        orders,
        filters.page,
        filters.per_page,
        total,
    )))
}

/// Order detail for the warehouse (no session restriction).
async fn order_detail(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .orders
        .get_order(&order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Confirm a pending order.
#[utoipa::path(
    post,
    path = "/warehouse/orders/{order_number}/confirm",
    params(("order_number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order confirmed"),
        (status = 409, description = "Order not in expected state", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn confirm_order(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .confirm_order(&order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Mark a confirmed order ready for dispatch.
async fn mark_ready_to_ship(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .mark_ready_to_ship(&order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Dispatch an order: creates the shipment, emits the `out` movements and
/// flips the status to `shipped`.
#[utoipa::path(
    post,
    path = "/warehouse/orders/{order_number}/ship",
    params(("order_number" = String, Path, description = "Order number")),
    responses(
        (status = 201, description = "Shipment created"),
        (status = 409, description = "Order not ready to ship", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn ship_order(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
    payload: Option<Json<ShipOrderInput>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let input = payload.map(|Json(input)| input).unwrap_or_default();

    let shipment = state
        .services
        .shipments
        .ship_order(&order_number, input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(shipment))
}

/// Mark a shipped order delivered.
async fn mark_delivered(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .mark_delivered(&order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Cancel an order (allowed until delivery).
async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .cancel_order(&order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Administrative reset: delete every order, item, movement and shipment.
#[utoipa::path(
    delete,
    path = "/warehouse/orders",
    responses((status = 200, description = "All orders purged")),
    tag = "warehouse"
)]
pub async fn purge_orders(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let result = state
        .services
        .orders
        .purge_all_orders()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(result))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementListFilters {
    /// Movement type to filter by (`in`, `out`, `adjustment`)
    #[serde(rename = "type")]
    pub movement_type: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

/// Inventory movement journal, newest first.
#[utoipa::path(
    get,
    path = "/warehouse/movements",
    params(MovementListFilters),
    responses((status = 200, description = "Movements returned")),
    tag = "warehouse"
)]
pub async fn list_movements(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<MovementListFilters>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let movement_type = match filters.movement_type.as_deref() {
        Some(raw) => match MovementType::from_str(raw) {
            Ok(movement_type) => Some(movement_type),
            Err(_) => {
                return Ok(success_response(PaginatedResponse::<
                    crate::entities::inventory_movement::Model,
                >::new(
                    vec![], filters.page, filters.per_page, 0
                )))
            }
        },
        None => None,
    };

    let (movements, total) = state
        .services
        .movements
        .list_movements(filters.page, filters.per_page, movement_type)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        movements,
        filters.page,
        filters.per_page,
        total,
    )))
}

/// Record an intake, outbound or adjustment movement; the effect is applied
/// to the stock entry immediately.
async fn record_movement(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RecordMovementInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let movement = state
        .services
        .movements
        .record_standalone(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(movement))
}

/// Dispatch log, most recent first.
async fn list_shipments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (shipments, total) = state
        .services
        .shipments
        .list_shipments(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        shipments,
        params.page,
        params.per_page,
        total,
    )))
}

/// Full stock ledger.
async fn list_stock(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (entries, total) = state
        .services
        .stock
        .list_entries(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        entries,
        params.page,
        params.per_page,
        total,
    )))
}

/// Explicit stock entry creation (duplicate pairs are a conflict).
async fn create_stock_entry(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateStockEntryInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let entry = state
        .services
        .stock
        .create_entry(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(entry))
}

/// Entries at or below their reorder threshold.
#[utoipa::path(
    get,
    path = "/warehouse/stock/low",
    params(PaginationParams),
    responses((status = 200, description = "Low stock entries returned")),
    tag = "warehouse"
)]
pub async fn low_stock(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (entries, total) = state
        .services
        .stock
        .low_stock(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        entries,
        params.page,
        params.per_page,
        total,
    )))
}
