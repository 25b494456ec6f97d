/*!
 * Delivery management API for a gas and water bottle distributor.
 *
 * Customers, a small product catalog, and orders with a strict delivery
 * lifecycle (`new -> in_delivery -> completed/cancelled`), exposed over
 * an axum HTTP API backed by SeaORM.
 */

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod request_id;
pub mod services;

use auth::{permissions as perm, AuthRouterExt};
pub use handlers::AppServices;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Standard response envelope.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: request_id::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// All `/api/v1` routes, grouped and gated by permission.
pub fn api_v1_routes() -> Router<AppState> {
    let orders_read = handlers::orders::order_read_routes().with_permission(perm::ORDERS_READ);
    let orders_create =
        handlers::orders::order_create_routes().with_permission(perm::ORDERS_CREATE);
    let orders_update =
        handlers::orders::order_update_routes().with_permission(perm::ORDERS_UPDATE);
    let orders_cancel =
        handlers::orders::order_cancel_routes().with_permission(perm::ORDERS_CANCEL);
    let orders_delete =
        handlers::orders::order_delete_routes().with_permission(perm::ORDERS_DELETE);

    let customers_read =
        handlers::customers::customer_read_routes().with_permission(perm::CUSTOMERS_READ);
    let customers_write =
        handlers::customers::customer_write_routes().with_permission(perm::CUSTOMERS_WRITE);

    let products_read =
        handlers::products::product_read_routes().with_permission(perm::PRODUCTS_READ);
    let products_write =
        handlers::products::product_write_routes().with_permission(perm::PRODUCTS_WRITE);

    Router::new()
        .merge(orders_read)
        .merge(orders_create)
        .merge(orders_update)
        .merge(orders_cancel)
        .merge(orders_delete)
        .merge(customers_read)
        .merge(customers_write)
        .merge(products_read)
        .merge(products_write)
}

/// Unauthenticated status and health routes.
pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api_status))
        .route("/status", get(api_status))
        .route("/health", get(health_check))
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "service": "delivery-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            request_id::scope_request_id(request_id::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            request_id::scope_request_id(request_id::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }
}
