//! Integration tests for the catalog routes and the featured products cache.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use bazaar_integration_tests::{Session, TestApp, TestResponse, admin_session, send, sign_up};
use serde_json::{Value, json};

fn product(name: &str, featured: bool) -> Value {
    json!({
        "name": name,
        "description": "Hand thrown stoneware",
        "price": "24.50",
        "image": "https://cdn.shop.test/mug.jpg",
        "category": "kitchen",
        "brand": "Bazaar",
        "countInStock": 12,
        "isFeatured": featured,
    })
}

async fn create(app: &TestApp, admin: &Session, name: &str, featured: bool) -> Value {
    let response = send(
        app.router(),
        Method::POST,
        "/api/products",
        Some(product(name, featured)),
        &admin.cookies(),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body
}

async fn featured(app: &TestApp) -> TestResponse {
    send(app.router(), Method::GET, "/api/products/featured", None, &[]).await
}

fn names(list: &Value) -> Vec<&str> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect()
}

// =============================================================================
// Access control
// =============================================================================

#[tokio::test]
async fn test_catalog_writes_require_admin() {
    let app = TestApp::new();

    let anonymous = send(
        app.router(),
        Method::POST,
        "/api/products",
        Some(product("Mug", false)),
        &[],
    )
    .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let customer = sign_up(&app, "shopper@shop.test", "shopper-password").await;
    let forbidden = send(
        app.router(),
        Method::POST,
        "/api/products",
        Some(product("Mug", false)),
        &customer.cookies(),
    )
    .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let listing = send(
        app.router(),
        Method::GET,
        "/api/products",
        None,
        &customer.cookies(),
    )
    .await;
    assert_eq!(listing.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_lists_and_reads_products() {
    let app = TestApp::new();
    let admin = admin_session(&app).await;
    let mug = create(&app, &admin, "Mug", false).await;
    create(&app, &admin, "Bowl", true).await;

    let listing = send(
        app.router(),
        Method::GET,
        "/api/products",
        None,
        &admin.cookies(),
    )
    .await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(names(&listing.body["products"]), ["Mug", "Bowl"]);

    let uri = format!("/api/products/{}", mug["_id"]);
    let detail = send(app.router(), Method::GET, &uri, None, &[]).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert_eq!(detail.body["price"], "24.50");
    assert_eq!(detail.body["countInStock"], 12);

    let missing = send(app.router(), Method::GET, "/api/products/999", None, &[]).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.message(), "Product not found");
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let app = TestApp::new();
    let admin = admin_session(&app).await;

    let response = send(
        app.router(),
        Method::POST,
        "/api/products",
        Some(product("   ", false)),
        &admin.cookies(),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Featured cache
// =============================================================================

#[tokio::test]
async fn test_featured_reads_are_served_from_cache() {
    let app = TestApp::new();
    let admin = admin_session(&app).await;
    create(&app, &admin, "Vase", true).await;
    create(&app, &admin, "Plate", false).await;

    let reads_before = app.products.featured_reads();
    let first = featured(&app).await;
    let second = featured(&app).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body, second.body);
    assert_eq!(names(&first.body), ["Vase"]);
    assert!(app.products.featured_reads() - reads_before <= 1);
}

#[tokio::test]
async fn test_toggle_featured_is_reflected() {
    let app = TestApp::new();
    let admin = admin_session(&app).await;
    let jug = create(&app, &admin, "Jug", false).await;
    assert_eq!(names(&featured(&app).await.body), Vec::<&str>::new());

    let uri = format!("/api/products/{}", jug["_id"]);
    let toggled = send(app.router(), Method::PATCH, &uri, None, &admin.cookies()).await;
    assert_eq!(toggled.status, StatusCode::OK);
    assert_eq!(toggled.body["isFeatured"], true);
    assert_eq!(names(&featured(&app).await.body), ["Jug"]);

    send(app.router(), Method::PATCH, &uri, None, &admin.cookies()).await;
    assert_eq!(names(&featured(&app).await.body), Vec::<&str>::new());
}

#[tokio::test]
async fn test_updating_featured_product_refreshes_cache() {
    let app = TestApp::new();
    let admin = admin_session(&app).await;
    let lamp = create(&app, &admin, "Lamp", true).await;
    assert_eq!(names(&featured(&app).await.body), ["Lamp"]);

    let uri = format!("/api/products/{}", lamp["_id"]);
    let renamed = send(
        app.router(),
        Method::PUT,
        &uri,
        Some(json!({ "name": "Desk Lamp" })),
        &admin.cookies(),
    )
    .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["category"], "kitchen");
    assert_eq!(names(&featured(&app).await.body), ["Desk Lamp"]);

    send(
        app.router(),
        Method::PUT,
        &uri,
        Some(json!({ "isFeatured": false })),
        &admin.cookies(),
    )
    .await;
    assert_eq!(names(&featured(&app).await.body), Vec::<&str>::new());
}

#[tokio::test]
async fn test_deleting_featured_product_removes_it_from_cache() {
    let app = TestApp::new();
    let admin = admin_session(&app).await;
    let rug = create(&app, &admin, "Rug", true).await;
    create(&app, &admin, "Throw", true).await;
    assert_eq!(names(&featured(&app).await.body), ["Rug", "Throw"]);

    let uri = format!("/api/products/{}", rug["_id"]);
    let deleted = send(app.router(), Method::DELETE, &uri, None, &admin.cookies()).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.message(), "Product deleted successfully");

    assert_eq!(names(&featured(&app).await.body), ["Throw"]);

    let again = send(app.router(), Method::DELETE, &uri, None, &admin.cookies()).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let live = send(app.router(), Method::GET, "/health", None, &[]).await;
    assert_eq!(live.status, StatusCode::OK);

    let ready = send(app.router(), Method::GET, "/health/ready", None, &[]).await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body, json!({ "database": true, "cache": true }));
    assert!(ready.headers.contains_key("x-request-id"));
}
