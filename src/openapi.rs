use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Delivery API",
        version = "0.1.0",
        description = r#"
# Gas & Water Delivery Management API

Backend for a bottled gas and water delivery business: customer registry,
product catalog and order management with a strict delivery lifecycle.

## Authentication

All `/api/v1` endpoints require a JWT obtained from `POST /auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

## Order lifecycle

```
new -> in_delivery -> completed
  \        |
   +-> cancelled <-+
```

Item prices are snapshotted at order creation; later product price changes
never rewrite existing orders.
"#
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::complete_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::update_order_notes,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::list_customer_orders,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,
        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderListResponse,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderItemRequest,
            crate::services::order_status::OrderStatus,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::handlers::orders::UpdateOrderNotesRequest,
            crate::services::customers::CustomerResponse,
            crate::services::customers::CustomerListResponse,
            crate::services::customers::CreateCustomerRequest,
            crate::services::customers::UpdateCustomerRequest,
            crate::services::products::ProductResponse,
            crate::services::products::ProductListResponse,
            crate::services::products::CreateProductRequest,
            crate::services::products::UpdateProductRequest,
            crate::services::products::ProductType,
            crate::errors::ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
