mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{response_json, TestApp};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use uuid::Uuid;

use delivery_api::auth::hash_password;
use delivery_api::entities::user;

async fn seed_user(app: &TestApp, email: &str, password: &str, is_active: bool) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Test Operator".to_string()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(password)),
        is_active: Set(is_active),
        created_at: Set(now),
        updated_at: Set(Some(now)),
    }
    .insert(&*app.state.db)
    .await
    .expect("seed user for tests")
}

#[tokio::test]
async fn login_issues_usable_tokens() {
    let app = TestApp::new().await;
    seed_user(&app, "operator@example.com", "s3cret-pass", true).await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "operator@example.com", "password": "s3cret-pass" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    let access_token = body["access_token"].as_str().unwrap().to_string();
    let refresh_token = body["refresh_token"].as_str().unwrap().to_string();

    // The access token opens gated routes.
    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&access_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The refresh token can be exchanged for a fresh pair.
    let response = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh_token })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn wrong_password_and_inactive_accounts_are_rejected() {
    let app = TestApp::new().await;
    seed_user(&app, "operator@example.com", "s3cret-pass", true).await;
    seed_user(&app, "gone@example.com", "s3cret-pass", false).await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "operator@example.com", "password": "wrong" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "gone@example.com", "password": "s3cret-pass" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "nobody@example.com", "password": "s3cret-pass" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    seed_user(&app, "operator@example.com", "s3cret-pass", true).await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "operator@example.com", "password": "s3cret-pass" })),
            None,
        )
        .await;
    let body = response_json(response).await;
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let response = app
        .request(Method::POST, "/auth/logout", None, Some(&access_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // A revoked token no longer opens gated routes.
    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&access_token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
