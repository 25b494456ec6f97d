use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::order_status::OrderStatus;
use crate::services::orders::{
    CreateOrderRequest, OrderFilter, OrderListResponse, OrderResponse,
};
use crate::{ApiResponse, AppState};

use super::common::{default_page, default_per_page};

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Target status: "in_delivery", "completed" or "cancelled".
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderNotesRequest {
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Create an order; item prices are snapshotted at creation time",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer or product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("customer_id" = Option<Uuid>, Query, description = "Filter by customer"),
    ),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<OrderListResponse>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let status = query.status.as_deref().map(OrderStatus::parse).transpose()?;
    let filter = OrderFilter {
        status,
        customer_id: query.customer_id,
    };
    let result = state
        .services
        .orders
        .list_orders(query.page, query.per_page, filter)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Apply a lifecycle transition (new -> in_delivery -> completed/cancelled)",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Unknown status value", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed or concurrent update", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let new_status = OrderStatus::parse(&request.status)?;
    let order = state
        .services
        .orders
        .update_order_status(id, new_status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/complete",
    summary = "Complete order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order completed", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn complete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.complete_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.cancel_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/notes",
    summary = "Update order notes",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderNotesRequest,
    responses(
        (status = 200, description = "Notes updated", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_notes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderNotesRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .update_notes(id, request.notes)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}/orders",
    summary = "Customer order history",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<Vec<OrderResponse>>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_customer_orders(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let orders = state.services.orders.list_customer_orders(id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub fn order_read_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/customers/:id/orders", get(list_customer_orders))
}

pub fn order_create_routes() -> Router<AppState> {
    Router::new().route("/orders", post(create_order))
}

pub fn order_update_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/:id/status", put(update_order_status))
        .route("/orders/:id/complete", post(complete_order))
        .route("/orders/:id/notes", put(update_order_notes))
}

pub fn order_cancel_routes() -> Router<AppState> {
    Router::new().route("/orders/:id/cancel", post(cancel_order))
}

pub fn order_delete_routes() -> Router<AppState> {
    Router::new().route("/orders/:id", delete(delete_order))
}
