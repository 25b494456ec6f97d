mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn customer_crud_round_trip() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/customers",
            Some(json!({
                "name": "Maria Silva",
                "phone": "27999990000",
                "address": "Rua das Flores 12",
                "consumption_pattern_days": 20,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["consumption_pattern_days"], 20);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/customers/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["name"], "Maria Silva");

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/customers/{id}"),
            Some(json!({ "address": "Rua Nova 99" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["address"], "Rua Nova 99");
    // Untouched fields survive a partial update.
    assert_eq!(body["data"]["phone"], "27999990000");

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/customers/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/customers/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_phone_is_rejected() {
    let app = TestApp::new().await;

    for phone in ["123", "27 99999-0000", "2799999000012", "abcdefghij"] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/customers",
                Some(json!({
                    "name": "Maria Silva",
                    "phone": phone,
                    "address": "Rua das Flores 12",
                })),
            )
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "phone {phone:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn duplicate_phone_is_rejected_on_create_and_update() {
    let app = TestApp::new().await;
    app.seed_customer("Maria Silva", "27999990000").await;
    let other = app.seed_customer("Joao Santos", "27999990001").await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/customers",
            Some(json!({
                "name": "Imposter",
                "phone": "27999990000",
                "address": "Elsewhere 1",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("already registered"));

    // Taking another customer's phone via update is also rejected.
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/customers/{}", other.id),
            Some(json!({ "phone": "27999990000" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Re-submitting a customer's own phone is fine.
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/customers/{}", other.id),
            Some(json!({ "phone": "27999990001" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn consumption_days_out_of_range_is_rejected() {
    let app = TestApp::new().await;

    for days in [0, 366] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/customers",
                Some(json!({
                    "name": "Maria Silva",
                    "phone": "27999990002",
                    "address": "Rua das Flores 12",
                    "consumption_pattern_days": days,
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn list_customers_filters_by_name_fragment() {
    let app = TestApp::new().await;
    app.seed_customer("Maria Silva", "27999990003").await;
    app.seed_customer("Mariana Costa", "27999990004").await;
    app.seed_customer("Joao Santos", "27999990005").await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/customers?name=Maria", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 2);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/customers", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 3);
}

#[tokio::test]
async fn missing_customer_is_a_404() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/customers/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/customers/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
