use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    middleware, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use delivery_api::{
    auth::{permissions, AuthConfig, AuthService, Claims},
    config::AppConfig,
    db,
    entities::{customer, product},
    events::{self, EventSender},
    handlers::AppServices,
    services::notifications::WhatsAppNotifier,
    AppState,
};

/// Harness spinning up the full router against a file-backed SQLite
/// database in a temporary directory.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    #[allow(dead_code)]
    auth_service: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = TempDir::new().expect("create temp dir for test database");
        let db_path = db_dir.path().join("delivery_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            std::time::Duration::from_secs(cfg.jwt_expiration as u64),
            std::time::Duration::from_secs(cfg.refresh_token_expiration as u64),
        );
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let notifier = Arc::new(WhatsAppNotifier::from_app_config(&cfg));
        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), notifier);

        let state = AppState {
            db: db_arc,
            config: cfg.clone(),
            event_sender,
            services,
        };

        let token = mint_token(&cfg.jwt_secret);

        let api_router = delivery_api::api_v1_routes().layer(middleware::from_fn_with_state(
            auth_service.clone(),
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: Request<Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ));

        let router = Router::new()
            .merge(delivery_api::status_routes())
            .nest("/api/v1", api_router)
            .with_state(state.clone())
            .nest(
                "/auth",
                delivery_api::auth::auth_routes().with_state(auth_service.clone()),
            );

        Self {
            router,
            state,
            token,
            auth_service,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Inserts a customer directly, bypassing the HTTP layer.
    pub async fn seed_customer(&self, name: &str, phone: &str) -> customer::Model {
        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            phone: Set(phone.to_string()),
            address: Set("Test Street 1".to_string()),
            consumption_pattern_days: Set(30),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        model
            .insert(&*self.state.db)
            .await
            .expect("seed customer for tests")
    }

    /// Inserts a product directly, bypassing the HTTP layer.
    pub async fn seed_product(
        &self,
        name: &str,
        product_type: &str,
        price: Decimal,
        is_active: bool,
    ) -> product::Model {
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            product_type: Set(product_type.to_string()),
            stock_quantity: Set(50),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        model
            .insert(&*self.state.db)
            .await
            .expect("seed product for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

fn mint_token(secret: &str) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        name: Some("Test Operator".to_string()),
        email: Some("operator@example.com".to_string()),
        roles: vec!["operator".to_string()],
        permissions: permissions::operator_permissions(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
        nbf: now.timestamp(),
        iss: "delivery-auth".to_string(),
        aud: "delivery-api".to_string(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode access token")
}

/// Reads a decimal field that may serialize as a string or a number.
#[allow(dead_code)]
pub fn as_decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal value: {other:?}"),
    }
}

/// Deserializes a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is valid json")
}

#[allow(dead_code)]
pub fn assert_status(response: &axum::response::Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
