//! Per-request identifier propagation.
//!
//! Every request gets an id (incoming `X-Request-Id` header or a fresh UUID)
//! that is scoped into a task-local so error payloads and response metadata
//! can pick it up without threading it through call signatures.

use std::cell::RefCell;
use std::fmt;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

/// Runs `future` with the given request id installed in the task-local scope.
pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

/// Returns the request id for the current task, if one is in scope.
pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// Middleware that assigns a request id and echoes it back on the response.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(RequestId::new)
        .unwrap_or_default();

    request.extensions_mut().insert(request_id.clone());

    let mut response = scope_request_id(request_id.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_id_is_visible_inside_the_scope() {
        let seen = scope_request_id(RequestId::new("abc"), async {
            current_request_id().map(|rid| rid.as_str().to_string())
        })
        .await;
        assert_eq!(seen.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn no_id_outside_a_scope() {
        assert!(current_request_id().is_none());
    }
}
