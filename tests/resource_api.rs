use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use resource_sdk::{create_resource, resource_app, App, DocumentDatabase, FieldDef, MemoryDatabase, Schema};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn post_schema() -> Schema {
    Schema::new().field("title", FieldDef::string())
}

async fn app_with(db: Arc<dyn DocumentDatabase>) -> App {
    let resource = create_resource(post_schema(), db.as_ref(), "posts").await.unwrap();
    resource_app(db, &resource)
}

async fn app() -> App {
    app_with(Arc::new(MemoryDatabase::new())).await
}

async fn send(app: &App, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

async fn insert(app: &App, title: &str) -> String {
    let (status, body) = send(app, "POST", "/posts", Some(json!({"title": title}))).await;
    assert_eq!(status, StatusCode::OK);
    body["insertedId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn post_then_get_returns_the_document() {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/posts", Some(json!({"title": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], json!(true));
    let id = body["insertedId"].as_str().unwrap();

    let (status, doc) = send(&app, "GET", &format!("/posts/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc, json!({"_id": id, "title": "hello"}));
}

#[tokio::test]
async fn post_missing_required_field_is_400_with_issues() {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/posts", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["issues"][0]["code"], json!("invalid_type"));
    assert_eq!(body["issues"][0]["path"], json!(["title"]));
    assert_eq!(body["issues"][0]["message"], json!("Required"));

    let (_, list) = send(&app, "GET", "/posts", None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn post_strips_undeclared_fields() {
    let app = app().await;
    let id = {
        let (_, body) = send(&app, "POST", "/posts", Some(json!({"title": "t", "admin": true, "_id": "x"}))).await;
        body["insertedId"].as_str().unwrap().to_string()
    };
    let (_, doc) = send(&app, "GET", &format!("/posts/{}", id), None).await;
    assert_eq!(doc, json!({"_id": id, "title": "t"}));
}

#[tokio::test]
async fn put_on_missing_id_returns_null() {
    let app = app().await;
    let missing = "5f0c6a7e-0000-4000-8000-000000000000";
    let (status, body) = send(&app, "PUT", &format!("/posts/{}", missing), Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn put_returns_previous_document_and_applies_update() {
    let app = app().await;
    let id = insert(&app, "before").await;
    let (status, body) = send(&app, "PUT", &format!("/posts/{}", id), Some(json!({"title": "after"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"_id": id, "title": "before"}));

    let (_, doc) = send(&app, "GET", &format!("/posts/{}", id), None).await;
    assert_eq!(doc["title"], json!("after"));
}

#[tokio::test]
async fn put_with_invalid_body_is_400_and_leaves_document_alone() {
    let app = app().await;
    let id = insert(&app, "keep").await;
    let (status, body) = send(&app, "PUT", &format!("/posts/{}", id), Some(json!({"title": 7}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["issues"][0]["expected"], json!("string"));

    let (_, doc) = send(&app, "GET", &format!("/posts/{}", id), None).await;
    assert_eq!(doc["title"], json!("keep"));
}

#[tokio::test]
async fn list_respects_limit_and_skip() {
    let app = app().await;
    for title in ["a", "b", "c"] {
        insert(&app, title).await;
    }

    let (status, body) = send(&app, "GET", "/posts?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "GET", "/posts?skip=1&limit=5", None).await;
    let titles: Vec<&str> = body.as_array().unwrap().iter().map(|d| d["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["b", "c"]);

    let (_, body) = send(&app, "GET", "/posts?limit=0", None).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn list_rejects_non_numeric_paging() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/posts?limit=ten", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("bad_request"));
}

#[tokio::test]
async fn delete_then_get_returns_null() {
    let app = app().await;
    let id = insert(&app, "gone").await;

    let (status, deleted) = send(&app, "DELETE", &format!("/posts/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({"_id": id, "title": "gone"}));

    let (status, doc) = send(&app, "GET", &format!("/posts/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc, Value::Null);

    let (_, again) = send(&app, "DELETE", &format!("/posts/{}", id), None).await;
    assert_eq!(again, Value::Null);
}

#[tokio::test]
async fn malformed_ids_and_json_are_bad_requests() {
    let app = app().await;
    let (status, _) = send(&app, "GET", "/posts/not-an-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/posts")
        .header("content-type", "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = app().await;
    let big = "x".repeat(resource_sdk::routes::BODY_LIMIT_BYTES + 1);
    let (status, body) = send(&app, "POST", "/posts", Some(json!({"title": big}))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], json!("payload_too_large"));
}

#[tokio::test]
async fn oversized_content_length_gets_the_json_error_body() {
    let app = app().await;
    let body = json!({"title": "x".repeat(resource_sdk::routes::BODY_LIMIT_BYTES)}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/posts")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["error"]["code"], json!("payload_too_large"));

    let (_, list) = send(&app, "GET", "/posts", None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn trailing_slash_reaches_the_collection_routes() {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/posts/", Some(json!({"title": "slash"}))).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["insertedId"].as_str().unwrap().to_string();

    let (status, list) = send(&app, "GET", "/posts/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([{"_id": id, "title": "slash"}]));

    let (status, doc) = send(&app, "GET", &format!("/posts/{}/", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["title"], json!("slash"));
}

#[tokio::test]
async fn resource_collection_handle_sees_http_writes() {
    let db: Arc<dyn DocumentDatabase> = Arc::new(MemoryDatabase::new());
    let resource = create_resource(post_schema(), db.as_ref(), "posts").await.unwrap();
    let app = resource_app(db.clone(), &resource);
    insert(&app, "via http").await;

    let docs = resource.collection.find(Default::default()).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["title"], json!("via http"));
}

#[tokio::test]
async fn invalid_collection_name_is_refused() {
    let db = MemoryDatabase::new();
    assert!(create_resource(post_schema(), &db, "posts/../x").await.is_err());
}

#[tokio::test]
async fn service_routes_report_health_and_readiness() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], json!("ok"));

    let (_, body) = send(&app, "GET", "/version", None).await;
    assert_eq!(body["name"], json!("resource-sdk"));
}

#[tokio::test]
async fn info_describes_the_mounted_resource() {
    let db: Arc<dyn DocumentDatabase> = Arc::new(MemoryDatabase::new());
    let schema = post_schema().field("tags", FieldDef::array(FieldDef::string()).optional());
    let resource = create_resource(schema, db.as_ref(), "articles").await.unwrap();
    assert_eq!(resource.path(), "/articles");
    let app = resource_app(db, &resource);

    let (status, body) = send(&app, "GET", "/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("resource-sdk"));
    assert_eq!(
        body["resource"],
        json!({
            "collection": "articles",
            "path": "/articles",
            "fields": ["tags", "title"],
            "unknownKeys": "strip"
        })
    );

    let (status, _) = send(&app, "GET", "/articles", None).await;
    assert_eq!(status, StatusCode::OK);
}
