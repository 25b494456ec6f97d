use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::customers::{
    CreateCustomerRequest, CustomerListResponse, CustomerResponse, UpdateCustomerRequest,
};
use crate::{ApiResponse, AppState};

use super::common::{default_page, default_per_page};

#[derive(Debug, Deserialize)]
pub struct ListCustomersQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    /// Name fragment (substring match).
    pub name: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    summary = "Create customer",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = ApiResponse<CustomerResponse>),
        (status = 400, description = "Invalid data or duplicate phone", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CustomerResponse>>), ServiceError> {
    let customer = state.services.customers.create_customer(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(customer))))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    summary = "List customers",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("name" = Option<String>, Query, description = "Filter by name fragment"),
    ),
    responses(
        (status = 200, description = "Customers retrieved", body = ApiResponse<CustomerListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<ListCustomersQuery>,
) -> Result<Json<ApiResponse<CustomerListResponse>>, ServiceError> {
    let result = state
        .services
        .customers
        .list_customers(query.page, query.per_page, query.name)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    summary = "Get customer",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer retrieved", body = ApiResponse<CustomerResponse>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CustomerResponse>>, ServiceError> {
    let customer = state.services.customers.get_customer(id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    summary = "Update customer",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<CustomerResponse>),
        (status = 400, description = "Invalid data or duplicate phone", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<Json<ApiResponse<CustomerResponse>>, ServiceError> {
    let customer = state
        .services
        .customers
        .update_customer(id, request)
        .await?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    summary = "Delete customer",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.customers.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn customer_read_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers))
        .route("/customers/:id", get(get_customer))
}

pub fn customer_write_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", post(create_customer))
        .route("/customers/:id", put(update_customer))
        .route("/customers/:id", delete(delete_customer))
}
