//! Integration tests for Bazaar.
//!
//! Requests go through the full router, wired to in-memory stores, an
//! in-process session cache, a manual clock and a recording mailer.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

pub use bazaar_storefront::testing::TestApp;

/// A collected response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of a cookie set by this response, if any.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookie_headers(name)
            .next()
            .and_then(|raw| raw.split(';').next())
            .and_then(|pair| pair.split_once('='))
            .map(|(_, value)| value.to_owned())
    }

    /// The full `Set-Cookie` header for a cookie, attributes included.
    #[must_use]
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.set_cookie_headers(name).next().map(str::to_owned)
    }

    fn set_cookie_headers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter(move |v| v.starts_with(&format!("{name}=")))
    }

    /// The `message` field of a JSON body.
    #[must_use]
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// Send one request through a fresh copy of the router.
pub async fn send(
    router: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    cookies: &[(&str, &str)],
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if !cookies.is_empty() {
        let header_value = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.header(header::COOKIE, header_value);
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        headers,
        body,
    }
}

/// Session cookies issued by signup or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    /// Pull both session cookies out of a response.
    #[must_use]
    pub fn from_response(response: &TestResponse) -> Self {
        Self {
            access_token: response.cookie("accessToken").unwrap(),
            refresh_token: response.cookie("refreshToken").unwrap(),
        }
    }

    /// Cookie pairs to send back.
    #[must_use]
    pub fn cookies(&self) -> [(&str, &str); 2] {
        [
            ("accessToken", self.access_token.as_str()),
            ("refreshToken", self.refresh_token.as_str()),
        ]
    }
}

/// Register an account and return its session.
pub async fn sign_up(app: &TestApp, email: &str, password: &str) -> Session {
    let response = send(
        app.router(),
        Method::POST,
        "/api/auth/signup",
        Some(serde_json::json!({ "name": "Test Shopper", "email": email, "password": password })),
        &[],
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    Session::from_response(&response)
}

/// Log in and return the new session.
pub async fn log_in(app: &TestApp, email: &str, password: &str) -> Session {
    let response = send(
        app.router(),
        Method::POST,
        "/api/auth/login",
        Some(serde_json::json!({ "email": email, "password": password })),
        &[],
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    Session::from_response(&response)
}

/// Register an admin and return a session carrying the admin role.
pub async fn admin_session(app: &TestApp) -> Session {
    sign_up(app, "admin@shop.test", "admin-password").await;
    app.promote_to_admin("admin@shop.test").await;
    log_in(app, "admin@shop.test", "admin-password").await
}
