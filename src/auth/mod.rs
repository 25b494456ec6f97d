/*!
 * Authentication and authorization.
 *
 * JWT (HS256) access/refresh tokens backed by the `users` table, an
 * in-memory revocation list, and permission-checking middleware wired
 * through [`AuthRouterExt`].
 */

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::user::{self, Entity as UserEntity, Model as UserModel};

/// Permission names used to gate route groups.
pub mod permissions {
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_UPDATE: &str = "orders:update";
    pub const ORDERS_CANCEL: &str = "orders:cancel";
    pub const ORDERS_DELETE: &str = "orders:delete";
    pub const CUSTOMERS_READ: &str = "customers:read";
    pub const CUSTOMERS_WRITE: &str = "customers:write";
    pub const PRODUCTS_READ: &str = "products:read";
    pub const PRODUCTS_WRITE: &str = "products:write";

    /// Full permission set granted to every active operator account.
    pub fn operator_permissions() -> Vec<String> {
        [
            ORDERS_READ,
            ORDERS_CREATE,
            ORDERS_UPDATE,
            ORDERS_CANCEL,
            ORDERS_DELETE,
            CUSTOMERS_READ,
            CUSTOMERS_WRITE,
            PRODUCTS_READ,
            PRODUCTS_WRITE,
        ]
        .iter()
        .map(|p| p.to_string())
        .collect()
    }
}

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from a validated token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience: "delivery-api".to_string(),
            jwt_issuer: "delivery-auth".to_string(),
            access_token_expiration,
            refresh_token_expiration,
        }
    }

    pub fn from_app_config(cfg: &crate::config::AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
            Duration::from_secs(cfg.refresh_token_expiration as u64),
        )
    }
}

/// Token blacklist entry
#[derive(Clone, Debug)]
struct BlacklistedToken {
    jti: String,
    expiry: DateTime<Utc>,
}

/// Authentication service handling credentials, token issuance and
/// validation.
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DbPool>,
    blacklisted_tokens: Arc<RwLock<Vec<BlacklistedToken>>>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DbPool>) -> Self {
        Self {
            config,
            db,
            blacklisted_tokens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Verifies email/password and returns the matching active user.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserModel, AuthError> {
        let user = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            warn!(email = %email, "Login attempt for deactivated account");
            return Err(AuthError::InvalidCredentials);
        }

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Generates an access/refresh token pair for a user.
    pub async fn generate_token(&self, user: &UserModel) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let refresh_exp = now
            + ChronoDuration::from_std(self.config.refresh_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let roles = vec!["operator".to_string()];
        let perms = permissions::operator_permissions();

        let access_claims = Claims {
            sub: user.id.to_string(),
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            roles: roles.clone(),
            permissions: perms,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        // Refresh tokens carry minimal data; permissions are re-derived
        // when the token is exchanged.
        let refresh_claims = Claims {
            sub: user.id.to_string(),
            name: None,
            email: None,
            roles: vec![],
            permissions: vec![],
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let key = EncodingKey::from_secret(self.config.jwt_secret.as_bytes());
        let access_token = encode(&Header::new(Algorithm::HS256), &access_claims, &key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;
        let refresh_token = encode(&Header::new(Algorithm::HS256), &refresh_claims, &key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    /// Validates a JWT token and extracts the claims.
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.clone()]);
        validation.set_issuer(&[self.config.jwt_issuer.clone()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Exchanges a refresh token for a new token pair. The old refresh
    /// token is revoked.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate_token(refresh_token).await?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let user = UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        let new_tokens = self.generate_token(&user).await?;
        self.blacklist(claims.jti, claims.exp).await;

        Ok(new_tokens)
    }

    /// Revokes a token by blacklisting its jti until it would have
    /// expired anyway.
    pub async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.validate_token(token).await?;
        self.blacklist(claims.jti, claims.exp).await;
        Ok(())
    }

    async fn blacklist(&self, jti: String, exp: i64) {
        let expiry = DateTime::<Utc>::from_timestamp(exp, 0).unwrap_or_else(Utc::now);
        let mut blacklist = self.blacklisted_tokens.write().await;
        let now = Utc::now();
        blacklist.retain(|t| t.expiry > now);
        blacklist.push(BlacklistedToken { jti, expiry });
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist.iter().any(|t| t.jti == token_id)
    }
}

/// Hashes a password as `salt$hex(sha256(salt + password))`.
pub fn hash_password(password: &str) -> String {
    let salt: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let digest = Sha256::digest(format!("{salt}{password}").as_bytes());
    format!("{salt}${}", hex::encode(digest))
}

/// Verifies a password against a `salt$hex` digest.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let digest = Sha256::digest(format!("{salt}{password}").as_bytes());
    hex::encode(digest) == expected
}

/// Token pair response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING_TOKEN",
                "No authentication token provided".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Could not create token".to_string(),
            ),
            Self::UserNotFound => (
                StatusCode::NOT_FOUND,
                "AUTH_USER_NOT_FOUND",
                "User not found".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::DatabaseError(_) | Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal authentication error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Authentication middleware: validates the bearer token and stores the
/// resulting [`AuthUser`] in the request extensions.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let headers = request.headers().clone();

    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match extract_auth_from_headers(&headers, &auth_service).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

async fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_value) = auth_header.to_str() {
            if auth_value.starts_with("Bearer ") {
                let token = auth_value.trim_start_matches("Bearer ").trim();
                let claims = auth_service.validate_token(token).await?;

                return Ok(AuthUser {
                    user_id: claims.sub,
                    name: claims.name,
                    email: claims.email,
                    roles: claims.roles,
                    permissions: claims.permissions,
                    token_id: claims.jti,
                });
            }
        }
    }

    Err(AuthError::MissingAuth)
}

/// Permission middleware; admins pass every check.
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => return Err(AuthError::MissingAuth),
    };

    if user.is_admin() {
        return Ok(next.run(request).await);
    }

    if !user.has_permission(&required_permission) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication routes
pub fn auth_routes() -> axum::Router<Arc<AuthService>> {
    axum::Router::new()
        .route("/login", axum::routing::post(login_handler))
        .route("/refresh", axum::routing::post(refresh_token_handler))
        .route("/logout", axum::routing::post(logout_handler))
        .layer(DefaultBodyLimit::max(1024 * 64))
}

async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenPair>, AuthError> {
    let user = auth_service
        .authenticate(&credentials.email, &credentials.password)
        .await?;

    info!(user_id = %user.id, "User logged in");
    let token_pair = auth_service.generate_token(&user).await?;

    Ok(Json(token_pair))
}

async fn refresh_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(refresh_request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let token_pair = auth_service
        .refresh_token(&refresh_request.refresh_token)
        .await?;

    Ok(Json(token_pair))
}

async fn logout_handler(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AuthError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_value) = auth_header.to_str() {
            if auth_value.starts_with("Bearer ") {
                let token = auth_value.trim_start_matches("Bearer ").trim();
                auth_service.revoke_token(token).await?;
                return Ok(Json(
                    serde_json::json!({ "message": "Successfully logged out" }),
                ));
            }
        }
    }

    Err(AuthError::MissingToken)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("s3cret");
        assert!(hash.contains('$'));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "no-dollar-sign"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn two_hashes_of_same_password_differ() {
        // Random salt per hash.
        assert_ne!(hash_password("s3cret"), hash_password("s3cret"));
    }

    #[test]
    fn operator_permissions_cover_orders() {
        let perms = permissions::operator_permissions();
        assert!(perms.iter().any(|p| p == permissions::ORDERS_CREATE));
        assert!(perms.iter().any(|p| p == permissions::ORDERS_CANCEL));
    }
}
