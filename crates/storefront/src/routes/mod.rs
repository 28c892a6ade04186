//! HTTP route handlers for the shop API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                     - Liveness
//! GET    /health/ready               - Readiness (database + cache)
//!
//! # Auth (rate limited when enabled)
//! POST   /api/auth/signup            - Register, sets session cookies
//! POST   /api/auth/login             - Log in, sets session cookies
//! POST   /api/auth/logout            - Revoke session, clears cookies
//! POST   /api/auth/refresh-token     - New access token cookie
//! GET    /api/auth/profile           - Current user (requires auth)
//! POST   /api/auth/forgot-password   - Email a reset link
//! POST   /api/auth/reset-password    - Set a new password
//!
//! # Products
//! GET    /api/products               - All products (admin)
//! POST   /api/products               - Create (admin)
//! GET    /api/products/featured      - Featured list (cached)
//! GET    /api/products/{id}          - Product detail
//! PUT    /api/products/{id}          - Update (admin)
//! PATCH  /api/products/{id}          - Toggle featured (admin)
//! DELETE /api/products/{id}          - Delete (admin)
//! ```

pub mod auth;
pub mod health;
pub mod products;

use axum::{
    Router,
    extract::FromRequest,
    http::Request,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// JSON request body. Malformed bodies are answered with a 400 `{"message"}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/profile", get(auth::profile))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/featured", get(products::featured))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .patch(products::toggle_featured)
                .delete(products::destroy),
        )
}

/// Build the complete application router.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app(state: AppState) -> Router {
    let mut auth = auth_routes();
    if state.config().rate_limit {
        auth = auth.layer(auth_rate_limiter());
    }

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth)
        .nest("/api/products", product_routes())
        .with_state(state)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::testing::{TestApp, test_config};

    fn logout_from(ip: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/logout")
            .header("x-real-ip", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_id_is_echoed_or_generated() {
        let app = TestApp::new();

        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "upstream-42")
            .body(Body::empty())
            .unwrap();
        let response = app.router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "upstream-42");

        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "bad id")
            .body(Body::empty())
            .unwrap();
        let response = app.router().oneshot(request).await.unwrap();
        let generated = response.headers()["x-request-id"].to_str().unwrap();
        assert_eq!(generated.len(), 36);
    }

    async fn login_with(content_type: &str, body: &'static str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let response = TestApp::new().router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_errors() {
        let (status, body) = login_with("application/json", r#"{"email":"a@shop.test"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("password"));

        let (status, body) = login_with("application/json", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let (status, body) = login_with("text/plain", "hello").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_auth_routes_are_rate_limited_per_client() {
        let mut config = test_config();
        config.rate_limit = true;
        let router = TestApp::with_config(config).router();

        for _ in 0..5 {
            let response = router.clone().oneshot(logout_from("203.0.113.7")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let limited = router.clone().oneshot(logout_from("203.0.113.7")).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = router.oneshot(logout_from("198.51.100.1")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_product_routes_are_not_rate_limited() {
        let mut config = test_config();
        config.rate_limit = true;
        let router = TestApp::with_config(config).router();

        for _ in 0..8 {
            let request = Request::builder()
                .uri("/api/products/featured")
                .header("x-real-ip", "203.0.113.9")
                .body(Body::empty())
                .unwrap();
            let response = router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
