use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use variant_reconciler::config::ReconcileConfig;
use variant_reconciler::routes::create_router;
use variant_reconciler::seed::{self, TEE_MODEL_ID};
use variant_reconciler::{MemoryStore, VariantEngine};

fn app() -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(seed::apparel_catalog());
    let engine = Arc::new(VariantEngine::new(store.clone(), ReconcileConfig::default()));
    (store, create_router().with_state(engine))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn trigger(body: Value, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/trigger/variant-generator")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_, app) = app();
    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_trigger_requires_user() {
    let (store, app) = app();
    let (status, body) = send(app, trigger(json!({"mode": "product", "productId": TEE_MODEL_ID}), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("X-User-Id"));
    assert!(store.variants_of(TEE_MODEL_ID).is_empty());
}

#[tokio::test]
async fn test_trigger_product_returns_counts() {
    let (store, app) = app();
    let (status, body) = send(
        app,
        trigger(json!({"mode": "product", "productId": TEE_MODEL_ID}), Some("merchandiser")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["created"], 4);
    assert_eq!(body["updated"], 0);
    assert_eq!(body["deleted"], 0);
    assert_eq!(body["errors"], json!([]));
    assert_eq!(store.variants_of(TEE_MODEL_ID).len(), 4);
    println!("✓ Trigger response: {}", body);
}

#[tokio::test]
async fn test_trigger_with_prepared_variants_is_differential() {
    let (store, app) = app();
    let existing = store.add_variant(TEE_MODEL_ID, &[(1, "\"red\""), (2, "\"s\"")]);

    let (status, body) = send(
        app,
        trigger(
            json!({
                "mode": "product",
                "productId": TEE_MODEL_ID,
                "preparedVariants": [
                    {"attributes": [{"attributeId": 1, "value": "red"}, {"attributeId": 2, "value": "s"}], "name": "Red S"},
                    {"attributes": [{"attributeId": 1, "value": "blue"}, {"attributeId": 2, "value": "m"}]}
                ]
            }),
            Some("editor"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["created"], 1);
    assert_eq!(body["updated"], 1);
    assert_eq!(body["deleted"], 0);
    assert!(store.variants_of(TEE_MODEL_ID).iter().any(|v| v.id == existing));
}

#[tokio::test]
async fn test_trigger_rejects_incomplete_request() {
    let (_, app) = app();
    let (status, body) = send(app, trigger(json!({"mode": "family_variant"}), Some("editor"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("familyVariantId"));
}

#[tokio::test]
async fn test_trigger_unknown_product_is_not_found() {
    let (_, app) = app();
    let (status, body) = send(
        app,
        trigger(json!({"mode": "product", "productId": "missing"}), Some("editor")),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_preview_endpoints() {
    let (store, app) = app();

    let (status, body) = send(app.clone(), get("/products/tee-model/variant-preview")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCombinations"], 4);
    assert_eq!(body["axes"][0]["code"], "color");
    assert_eq!(body["axes"][0]["selectedCount"], 2);
    assert_eq!(body["axes"][0]["totalAvailable"], 3);

    let (status, body) = send(app.clone(), get("/products/tee-model/variant-preview/count")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);

    let (status, _) = send(app, get("/products/missing/variant-preview/count")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Previews never write
    assert!(store.variants_of(TEE_MODEL_ID).is_empty());
}
