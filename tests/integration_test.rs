//! Integration tests for the gift API
//!
//! These tests verify the entire application stack including:
//! - HTTP routing
//! - Request/response handling
//! - Record store and blob store coordination
//! - Error handling

use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use giftpage::blob::MemoryBlobStore;
use giftpage::database::{init_db, GiftStore};
use giftpage::rewrite::{MessageRewriter, RewriteFuture};
use giftpage::route::{create_app, AppState};
use giftpage::service::GiftService;

const CDN: &str = "https://cdn.example.com";

struct TestApp {
    app: Router,
    blobs: Arc<MemoryBlobStore>,
    _temp_db: NamedTempFile,
}

/// Helper function to create a test application with a temporary database
/// and an in-memory blob store
fn setup_test_app() -> TestApp {
    setup_with_rewriter(None)
}

fn setup_with_rewriter(rewriter: Option<Arc<dyn MessageRewriter>>) -> TestApp {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");

    let blobs = Arc::new(MemoryBlobStore::new(CDN));
    let state = AppState {
        gifts: GiftService::new(GiftStore::new(Arc::new(db)), blobs.clone()),
        rewriter,
    };

    TestApp {
        app: create_app(state),
        blobs,
        _temp_db: temp_db,
    }
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    edit_key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = edit_key {
        builder = builder.header("X-Edit-Key", key);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse JSON")
    };
    (status, json)
}

/// Creates a gift and returns its edit key
async fn create(app: &Router, payload: Value) -> String {
    let (status, body) = send(app, "POST", "/api/gift", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["editKey"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_then_read_returns_content_without_edit_key() {
    let t = setup_test_app();
    let image = t.blobs.insert("a1.jpg");

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/gift")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "slug": "for-mom",
                        "recipientName": "Mom",
                        "greeting": "Happy birthday!",
                        "message": "Thank you for everything.",
                        "images": [image]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["slug"], "for-mom");
    assert_eq!(body["editKey"].as_str().unwrap().len(), 32);

    let (status, gift) = send(&t.app, "GET", "/api/gift/for-mom", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gift["recipientName"], "Mom");
    assert_eq!(gift["greeting"], "Happy birthday!");
    assert_eq!(gift["message"], "Thank you for everything.");
    assert_eq!(gift["images"], json!([image]));
    assert!(gift["createdAt"].is_string());
    assert!(gift.get("editKey").is_none());
}

#[tokio::test]
async fn test_client_supplied_edit_key_is_ignored() {
    let t = setup_test_app();

    let key = create(
        &t.app,
        json!({"slug": "mine", "recipientName": "Sam", "editKey": "chosen-by-client"}),
    )
    .await;
    assert_ne!(key, "chosen-by-client");

    let (status, _) = send(
        &t.app,
        "PUT",
        "/api/gift/mine",
        Some("chosen-by-client"),
        Some(json!({"message": "hijack"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_duplicate_slug_conflicts_and_keeps_original() {
    let t = setup_test_app();
    create(&t.app, json!({"slug": "taken", "recipientName": "First"})).await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/gift",
        None,
        Some(json!({"slug": "taken", "recipientName": "Second"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (_, gift) = send(&t.app, "GET", "/api/gift/taken", None, None).await;
    assert_eq!(gift["recipientName"], "First");
}

#[tokio::test]
async fn test_create_requires_slug_and_recipient_name() {
    let t = setup_test_app();

    let cases = [
        json!({"recipientName": "Mom"}),
        json!({"slug": "", "recipientName": "Mom"}),
        json!({"slug": "for-mom"}),
        json!({"slug": "for-mom", "recipientName": "   "}),
        json!({"slug": "bad slug", "recipientName": "Mom"}),
    ];
    for payload in cases {
        let (status, body) = send(&t.app, "POST", "/api/gift", None, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_eq!(body["code"], "validation");
    }
}

#[tokio::test]
async fn test_create_with_malformed_json_is_bad_request() {
    let t = setup_test_app();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/gift")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_gift_is_not_found() {
    let t = setup_test_app();

    let (status, body) = send(&t.app, "GET", "/api/gift/nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Gift not found");
}

#[tokio::test]
async fn test_update_with_wrong_key_is_forbidden_and_changes_nothing() {
    let t = setup_test_app();
    let image = t.blobs.insert("keep.jpg");
    create(
        &t.app,
        json!({"slug": "locked", "recipientName": "Ann", "message": "original", "images": [image]}),
    )
    .await;
    let (_, before) = send(&t.app, "GET", "/api/gift/locked", None, None).await;

    let (status, body) = send(
        &t.app,
        "PUT",
        "/api/gift/locked",
        Some("not-the-key"),
        Some(json!({"message": "changed", "images": []})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (_, after) = send(&t.app, "GET", "/api/gift/locked", None, None).await;
    assert_eq!(before, after);
    assert!(t.blobs.delete_calls().is_empty());
    assert!(t.blobs.contains("keep.jpg"));
}

#[tokio::test]
async fn test_update_without_key_is_unauthenticated() {
    let t = setup_test_app();
    create(&t.app, json!({"slug": "nokey", "recipientName": "Ann"})).await;

    let (status, body) = send(
        &t.app,
        "PUT",
        "/api/gift/nokey",
        None,
        Some(json!({"message": "changed"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _) = send(
        &t.app,
        "PUT",
        "/api/gift/nokey",
        Some(""),
        Some(json!({"message": "changed"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_unknown_gift_is_not_found() {
    let t = setup_test_app();

    let (status, _) = send(
        &t.app,
        "PUT",
        "/api/gift/ghost",
        Some("any"),
        Some(json!({"message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_without_images_field_keeps_images() {
    let t = setup_test_app();
    let a = t.blobs.insert("a.jpg");
    let b = t.blobs.insert("b.jpg");
    let key = create(
        &t.app,
        json!({"slug": "partial", "recipientName": "Ann", "greeting": "Hi", "images": [a, b]}),
    )
    .await;

    let (status, gift) = send(
        &t.app,
        "PUT",
        "/api/gift/partial",
        Some(key.as_str()),
        Some(json!({"message": "new message"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gift["message"], "new message");
    assert_eq!(gift["greeting"], "Hi");
    assert_eq!(gift["recipientName"], "Ann");
    assert_eq!(gift["images"], json!([a, b]));
    assert!(gift.get("editKey").is_none());
    assert!(t.blobs.delete_calls().is_empty());
}

#[tokio::test]
async fn test_update_with_empty_images_deletes_all_prior_blobs() {
    let t = setup_test_app();
    let a = t.blobs.insert("a.jpg");
    let b = t.blobs.insert("b.jpg");
    let key = create(
        &t.app,
        json!({"slug": "clear", "recipientName": "Ann", "images": [a, b]}),
    )
    .await;

    let (status, gift) = send(
        &t.app,
        "PUT",
        "/api/gift/clear",
        Some(key.as_str()),
        Some(json!({"images": []})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gift["images"], json!([]));

    assert_eq!(t.blobs.delete_calls(), vec![vec!["a.jpg", "b.jpg"]]);
    assert!(!t.blobs.contains("a.jpg"));
    assert!(!t.blobs.contains("b.jpg"));
}

#[tokio::test]
async fn test_update_with_empty_recipient_name_is_rejected() {
    let t = setup_test_app();
    let key = create(&t.app, json!({"slug": "named", "recipientName": "Ann"})).await;

    let (status, _) = send(
        &t.app,
        "PUT",
        "/api/gift/named",
        Some(key.as_str()),
        Some(json!({"recipientName": " "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_aborts_when_blob_deletion_fails() {
    let t = setup_test_app();
    let a = t.blobs.insert("a.jpg");
    let b = t.blobs.insert("b.jpg");
    let key = create(
        &t.app,
        json!({"slug": "stuck", "recipientName": "Ann", "message": "before", "images": [a, b]}),
    )
    .await;
    let (_, before) = send(&t.app, "GET", "/api/gift/stuck", None, None).await;
    t.blobs.fail_deletes_of("b.jpg");

    let (status, body) = send(
        &t.app,
        "PUT",
        "/api/gift/stuck",
        Some(key.as_str()),
        Some(json!({"message": "after", "images": []})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("b.jpg"));

    let (_, after) = send(&t.app, "GET", "/api/gift/stuck", None, None).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_update_skips_malformed_image_urls() {
    let t = setup_test_app();
    let good = t.blobs.insert("good.jpg");
    let key = create(
        &t.app,
        json!({"slug": "legacy", "recipientName": "Ann", "images": ["not a url", good]}),
    )
    .await;

    let (status, gift) = send(
        &t.app,
        "PUT",
        "/api/gift/legacy",
        Some(key.as_str()),
        Some(json!({"images": []})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gift["images"], json!([]));
    assert_eq!(t.blobs.delete_calls(), vec![vec!["good.jpg"]]);
}

#[tokio::test]
async fn test_delete_unknown_gift_succeeds_twice() {
    let t = setup_test_app();

    for _ in 0..2 {
        let (status, body) = send(&t.app, "DELETE", "/api/gift/ghost", Some("any"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
    }
}

#[tokio::test]
async fn test_delete_removes_gift_and_images() {
    let t = setup_test_app();
    let a = t.blobs.insert("a.jpg");
    let key = create(
        &t.app,
        json!({"slug": "bye", "recipientName": "Ann", "images": [a]}),
    )
    .await;

    let (status, _) = send(&t.app, "DELETE", "/api/gift/bye", Some(key.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!t.blobs.contains("a.jpg"));

    let (status, _) = send(&t.app, "GET", "/api/gift/bye", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, "DELETE", "/api/gift/bye", Some(key.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_delete_requires_matching_key() {
    let t = setup_test_app();
    create(&t.app, json!({"slug": "guarded", "recipientName": "Ann"})).await;

    let (status, _) = send(&t.app, "DELETE", "/api/gift/guarded", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.app, "DELETE", "/api/gift/guarded", Some("wrong"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&t.app, "GET", "/api/gift/guarded", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_skips_malformed_image_urls() {
    let t = setup_test_app();
    let good = t.blobs.insert("good.jpg");
    let key = create(
        &t.app,
        json!({"slug": "legacy-bye", "recipientName": "Ann", "images": ["not a url", good]}),
    )
    .await;

    let (status, _) = send(
        &t.app,
        "DELETE",
        "/api/gift/legacy-bye",
        Some(key.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(t.blobs.delete_calls(), vec![vec!["good.jpg"]]);
    assert!(!t.blobs.contains("good.jpg"));

    let (status, _) = send(&t.app, "GET", "/api/gift/legacy-bye", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_utf8_edit_key_is_forbidden() {
    let t = setup_test_app();
    create(&t.app, json!({"slug": "binary", "recipientName": "Ann"})).await;

    for (method, body) in [
        ("PUT", Body::from(json!({"message": "changed"}).to_string())),
        ("DELETE", Body::empty()),
    ] {
        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri("/api/gift/binary")
                    .header("content-type", "application/json")
                    .header("X-Edit-Key", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap())
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method}");
        let body = response_json(response.into_body()).await;
        assert_eq!(body["code"], "forbidden");
    }

    let (status, gift) = send(&t.app, "GET", "/api/gift/binary", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gift["message"], "");
}

#[tokio::test]
async fn test_delete_keeps_gift_when_blob_deletion_fails() {
    let t = setup_test_app();
    let a = t.blobs.insert("a.jpg");
    let key = create(
        &t.app,
        json!({"slug": "sticky", "recipientName": "Ann", "images": [a]}),
    )
    .await;
    t.blobs.fail_deletes_of("a.jpg");

    let (status, body) = send(&t.app, "DELETE", "/api/gift/sticky", Some(key.as_str()), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal");

    let (status, gift) = send(&t.app, "GET", "/api/gift/sticky", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gift["images"], json!([a]));
}

#[tokio::test]
async fn test_summaries_skip_unknown_slugs() {
    let t = setup_test_app();
    create(
        &t.app,
        json!({"slug": "known", "recipientName": "Ann", "message": "secret-ish"}),
    )
    .await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/gifts/list",
        None,
        Some(json!({"slugs": ["known", "unknown"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let summaries = body.as_array().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["slug"], "known");
    assert_eq!(summaries[0]["recipientName"], "Ann");
    assert!(summaries[0]["createdAt"].is_string());
    assert!(summaries[0].get("message").is_none());
    assert!(summaries[0].get("editKey").is_none());
}

#[tokio::test]
async fn test_summaries_for_empty_list() {
    let t = setup_test_app();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/gifts/list",
        None,
        Some(json!({"slugs": []})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_summaries_reject_non_array_body() {
    let t = setup_test_app();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/gifts/list",
        None,
        Some(json!({"slugs": "known"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Request body must be an object with a \"slugs\" array."
    );
}

#[tokio::test]
async fn test_end_to_end_image_replacement() {
    let t = setup_test_app();
    let u1 = t.blobs.insert("u1");
    let u2 = t.blobs.insert("u2");

    let key = create(
        &t.app,
        json!({"recipientName": "Mom", "slug": "for-mom", "images": [u1, u2]}),
    )
    .await;

    let (status, _) = send(
        &t.app,
        "PUT",
        "/api/gift/for-mom",
        Some(key.as_str()),
        Some(json!({"images": [u1]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(t.blobs.delete_calls(), vec![vec!["u2"]]);
    assert!(t.blobs.contains("u1"));
    assert!(!t.blobs.contains("u2"));

    let (_, gift) = send(&t.app, "GET", "/api/gift/for-mom", None, None).await;
    assert_eq!(gift["images"], json!([u1]));
}

#[tokio::test]
async fn test_upload_url_returns_public_url_under_cdn() {
    let t = setup_test_app();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/upload-url",
        None,
        Some(json!({"filename": "Beach.PNG", "contentType": "image/png"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let public_url = body["publicUrl"].as_str().unwrap();
    assert!(public_url.starts_with("https://cdn.example.com/"));
    assert!(public_url.ends_with(".png"));
    assert!(body["uploadUrl"].as_str().unwrap().starts_with("memory://upload/"));
}

#[tokio::test]
async fn test_upload_url_requires_filename_and_content_type() {
    let t = setup_test_app();

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/upload-url",
        None,
        Some(json!({"filename": "a.jpg"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

struct UppercaseRewriter;

impl MessageRewriter for UppercaseRewriter {
    fn rewrite(&self, text: &str) -> RewriteFuture<'_> {
        let text = text.to_uppercase();
        Box::pin(async move { Ok(text) })
    }
}

struct BrokenRewriter;

impl MessageRewriter for BrokenRewriter {
    fn rewrite(&self, _text: &str) -> RewriteFuture<'_> {
        Box::pin(async { Err(anyhow::anyhow!("upstream exploded")) })
    }
}

#[tokio::test]
async fn test_rewrite_message_passes_through() {
    let t = setup_with_rewriter(Some(Arc::new(UppercaseRewriter)));

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/rewrite-message",
        None,
        Some(json!({"text": "thank you"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rewrittenText"], "THANK YOU");

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/rewrite-message",
        None,
        Some(json!({"text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rewrite_message_failures_are_generic_500() {
    let t = setup_with_rewriter(Some(Arc::new(BrokenRewriter)));

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/rewrite-message",
        None,
        Some(json!({"text": "thank you"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["error"].as_str().unwrap().contains("exploded"));

    let t = setup_test_app();
    let (status, _) = send(
        &t.app,
        "POST",
        "/api/rewrite-message",
        None,
        Some(json!({"text": "thank you"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
