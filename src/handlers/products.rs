use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::products::{
    CreateProductRequest, ProductFilter, ProductListResponse, ProductResponse, ProductType,
    UpdateProductRequest,
};
use crate::{ApiResponse, AppState};

use super::common::{default_page, default_per_page};

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub product_type: Option<String>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid data", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    let product = state.services.products.create_product(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("product_type" = Option<String>, Query, description = "Filter: \"gas\" or \"water\""),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
    ),
    responses(
        (status = 200, description = "Products retrieved", body = ApiResponse<ProductListResponse>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ApiResponse<ProductListResponse>>, ServiceError> {
    let product_type = query
        .product_type
        .as_deref()
        .map(ProductType::parse)
        .transpose()?;
    let filter = ProductFilter {
        product_type,
        is_active: query.is_active,
    };
    let result = state
        .services
        .products
        .list_products(query.page, query.per_page, filter)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.products.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    summary = "Update product",
    description = "Partial update; a price change never rewrites existing order items",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.products.update_product(id, request).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    summary = "Delete product",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is referenced by existing orders", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.products.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn product_read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

pub fn product_write_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product))
        .route("/products/:id", delete(delete_product))
}
