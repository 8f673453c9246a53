//! Request-level behavior of the HTTP surface

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use mirrorcast::config::ServerConfig;
use mirrorcast::server::{self, CLIENT_COOKIE};
use mirrorcast::service::SyncService;
use mirrorcast::session::SessionLimits;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

fn app() -> Router {
    let service = Arc::new(SyncService::with_limits(SessionLimits::default(), 8));
    server::router(service, &ServerConfig::default())
}

fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let response = app
        .clone()
        .oneshot(request(method, uri, cookie, body))
        .await
        .unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        cookie,
        body,
    }
}

/// A fresh participant: the identity cookie from its first request.
async fn participant(app: &Router) -> String {
    let reply = call(app, Method::GET, "/api/sessions/current", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["inSession"], json!(false));
    let cookie = reply.cookie.expect("identity cookie");
    assert!(cookie.starts_with(&format!("{}=", CLIENT_COOKIE)));
    cookie
}

#[tokio::test]
async fn test_identity_cookie_is_stable() {
    let app = app();
    let cookie = participant(&app).await;

    let reply = call(&app, Method::GET, "/api/sessions/current", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.cookie.is_none());

    let reply = call(
        &app,
        Method::GET,
        "/api/sessions/current",
        Some(&format!("{}=garbage", CLIENT_COOKIE)),
        None,
    )
    .await;
    assert!(reply.cookie.is_some());
}

#[tokio::test]
async fn test_create_requires_a_name() {
    let app = app();
    let cookie = participant(&app).await;

    let reply = call(&app, Method::POST, "/api/sessions", Some(&cookie), Some(json!({}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], json!("Session name is required"));

    let reply = call(
        &app,
        Method::POST,
        "/api/sessions",
        Some(&cookie),
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/sessions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let app = app();
    let owner = participant(&app).await;
    let viewer = participant(&app).await;

    let created = call(
        &app,
        Method::POST,
        "/api/sessions",
        Some(&owner),
        Some(json!({ "name": "Math Class" })),
    )
    .await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.body["isOwner"], json!(true));
    let session_id = created.body["sessionId"].as_str().unwrap().to_string();

    let listed = call(&app, Method::GET, "/api/sessions", None, None).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
    assert_eq!(listed.body[0]["name"], json!("Math Class"));

    let missing = call(
        &app,
        Method::POST,
        "/api/sessions/join",
        Some(&viewer),
        Some(json!({ "sessionId": "does-not-exist" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(
        missing.body["error"],
        json!("Session not found: does-not-exist")
    );

    let joined = call(
        &app,
        Method::POST,
        "/api/sessions/join",
        Some(&viewer),
        Some(json!({ "sessionId": session_id })),
    )
    .await;
    assert_eq!(joined.status, StatusCode::OK);
    assert_eq!(joined.body["session"]["name"], json!("Math Class"));

    let current = call(&app, Method::GET, "/api/sessions/current", Some(&viewer), None).await;
    assert_eq!(current.body["inSession"], json!(true));
    assert_eq!(current.body["isOwner"], json!(false));

    let claim = call(&app, Method::POST, "/api/sessions/claim", Some(&viewer), None).await;
    assert_eq!(claim.status, StatusCode::CONFLICT);

    let update = json!({
        "isInitial": true,
        "content": {
            "kind": "directory",
            "children": { "notes.md": { "kind": "file", "data": "x = 1" } }
        }
    });
    let denied = call(&app, Method::POST, "/sync/update", Some(&viewer), Some(update.clone())).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["error"], json!("Only the session owner can publish"));

    let published = call(&app, Method::POST, "/sync/update", Some(&owner), Some(update)).await;
    assert_eq!(published.status, StatusCode::OK);
    assert_eq!(published.body["applied"], json!(1));

    let stats = call(&app, Method::GET, "/sync/stats", Some(&viewer), None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["fileCount"], json!(1));
    assert_eq!(stats.body["clientCount"], json!(2));

    let left = call(&app, Method::POST, "/api/sessions/leave", Some(&owner), None).await;
    assert_eq!(left.body["success"], json!(true));
    let listed = call(&app, Method::GET, "/api/sessions", None, None).await;
    assert_eq!(listed.body, json!([]));
}

#[tokio::test]
async fn test_session_scoped_routes_need_a_session() {
    let app = app();
    let cookie = participant(&app).await;

    for (method, uri) in [
        (Method::GET, "/sync/stats"),
        (Method::GET, "/events"),
        (Method::POST, "/api/sessions/claim"),
    ] {
        let reply = call(&app, method, uri, Some(&cookie), None).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(reply.body["error"], json!("Not in a session"));
    }

    let publish = call(
        &app,
        Method::POST,
        "/sync/update",
        Some(&cookie),
        Some(json!({ "isInitial": false, "changes": {} })),
    )
    .await;
    assert_eq!(publish.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_event_stream_opens_with_connected() {
    let app = app();
    let owner = participant(&app).await;
    call(
        &app,
        Method::POST,
        "/api/sessions",
        Some(&owner),
        Some(json!({ "name": "stream" })),
    )
    .await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/events", Some(&owner), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    let text = String::from_utf8(first.to_vec()).unwrap();
    assert!(text.starts_with("data: "));
    assert!(text.contains(r#""type":"connected""#));
}

#[tokio::test]
async fn test_health_reports_session_count() {
    let app = app();
    let reply = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], json!("ok"));
    assert_eq!(reply.body["sessions"], json!(0));
}
