mod common;

use axum::http::{Method, StatusCode};
use common::{as_decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn product_crud_round_trip() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "P13 gas bottle",
                "description": "13kg bottle",
                "price": "110.00",
                "product_type": "gas",
                "stock_quantity": 25,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["is_active"], true);
    assert_eq!(as_decimal(&body["data"]["price"]), dec!(110.00));

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(json!({ "price": "115.00", "stock_quantity": 30 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(as_decimal(&body["data"]["price"]), dec!(115.00));
    assert_eq!(body["data"]["stock_quantity"], 30);
    assert_eq!(body["data"]["name"], "P13 gas bottle");

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/products/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/products/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_positive_price_is_rejected() {
    let app = TestApp::new().await;

    for price in ["0", "-5.00"] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/products",
                Some(json!({
                    "name": "Broken product",
                    "price": price,
                    "product_type": "gas",
                })),
            )
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "price {price:?} should be rejected"
        );
    }

    // Price updates go through the same check.
    let product = app.seed_product("20L water", "water", dec!(12.50), true).await;
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/products/{}", product.id),
            Some(json!({ "price": "0" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_product_type_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Beer crate",
                "price": "50.00",
                "product_type": "beer",
            })),
        )
        .await;
    // Unknown enum variants fail body deserialization.
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn list_products_filters_by_type_and_active() {
    let app = TestApp::new().await;
    app.seed_product("P13 gas bottle", "gas", dec!(110.00), true).await;
    app.seed_product("P45 gas bottle", "gas", dec!(390.00), false).await;
    app.seed_product("20L water", "water", dec!(12.50), true).await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/products?product_type=gas", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 2);

    let response = app
        .request_authenticated(
            Method::GET,
            "/api/v1/products?product_type=gas&is_active=true",
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["products"][0]["name"], "P13 gas bottle");

    let response = app
        .request_authenticated(Method::GET, "/api/v1/products?product_type=diesel", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_referenced_by_orders_cannot_be_deleted() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Maria Silva", "27999990020").await;
    let product = app.seed_product("P13 gas bottle", "gas", dec!(110.00), true).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "customer_id": customer.id,
                "items": [{ "product_id": product.id, "quantity": 1 }],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order_id = response_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/products/{}", product.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The order's price snapshot stays resolvable.
    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/products/{}", product.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Once the order is gone the delete goes through.
    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/products/{}", product.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn missing_product_is_a_404() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/products/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
