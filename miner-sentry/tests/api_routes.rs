//! HTTP API tests driven through the router with `tower::ServiceExt`.

mod common;

use std::collections::HashMap;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::routing::post;
use miner_sentry::api::{AppState, build_router};
use miner_sentry::config::ProcessConfig;
use miner_sentry::services::ServiceContainer;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{StubMiner, lookup, serve, system_info};

struct TestApp {
    router: Router,
    services: ServiceContainer,
    _dir: tempfile::TempDir,
}

async fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = HashMap::new();
    vars.insert("SENTRY_DATA_DIR", dir.path().display().to_string());
    let process = ProcessConfig::from_lookup(lookup(vars)).unwrap();

    let services = ServiceContainer::new(process).await.unwrap();
    let router = build_router(AppState::from_services(&services), false);
    TestApp {
        router,
        services,
        _dir: dir,
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn put_settings(&self, settings: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, "/api/settings", Some(settings)).await
    }
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = app.call(Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["daemon_running"], false);
}

#[tokio::test]
async fn test_settings_round_trip_reports_reload_outcome() {
    let app = app().await;

    let (status, body) = app
        .put_settings(json!({
            "poll_interval_minutes": 5,
            "temp_max": 65.0,
            "endpoints": ["192.168.1.50/", "http://192.168.1.51"]
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["saved"], true);
    assert_eq!(body["reload"], "daemon_not_running");

    let (status, body) = app.call(Method::GET, "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read_only"], false);
    assert_eq!(body["settings"]["poll_interval_minutes"], 5);
    assert_eq!(body["settings"]["retention_days"], 30);
    assert_eq!(
        body["settings"]["endpoints"],
        json!(["http://192.168.1.50", "http://192.168.1.51"])
    );

    let on_disk = std::fs::read_to_string(&app.services.process.settings_file).unwrap();
    assert!(on_disk.contains("http://192.168.1.51"));
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let app = app().await;

    let (status, body) = app
        .put_settings(json!({ "temp_min": 80.0, "temp_max": 60.0 }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("temp_min"));

    // Nothing was applied.
    assert_eq!(app.services.config.current().temp_min, 20.0);
}

#[tokio::test]
async fn test_poll_then_query_and_delete() {
    let app = app().await;
    let miner = StubMiner::new(system_info(450.0, 55.0, "12.3M", 5200.0));
    let endpoint = miner.start().await;

    app.put_settings(json!({ "endpoints": [endpoint] })).await;

    let (status, body) = app.call(Method::POST, "/api/poll", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["polled"], 1);
    assert_eq!(body["total"], 1);
    assert_eq!(body["failures"], json!([]));

    let (status, body) = app.call(Method::GET, "/api/miners", None).await;
    assert_eq!(status, StatusCode::OK);
    let miners = body["miners"].as_array().unwrap();
    assert_eq!(miners.len(), 1);
    assert_eq!(miners[0]["endpoint"], endpoint.as_str());
    assert_eq!(miners[0]["latest"]["best_diff"], "12.3M");
    assert_eq!(miners[0]["minutes_ago"], 0);
    let id = miners[0]["id"].as_i64().unwrap();

    let (status, body) = app
        .call(Method::GET, &format!("/api/readings?miner_id={id}&hours=2"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"], 2);
    assert_eq!(body["miners"][0]["readings"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/miners/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/miners/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_poll_reports_failures_without_erroring() {
    let app = app().await;
    let down = common::refused_endpoint().await;
    app.put_settings(json!({ "endpoints": [down] })).await;

    let (status, body) = app.call(Method::POST, "/api/poll", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["polled"], 0);
    assert_eq!(body["total"], 1);
    assert_eq!(body["failures"][0]["kind"], "connect");
}

#[tokio::test]
async fn test_readings_window_is_clamped_to_retention() {
    let app = app().await;
    app.put_settings(json!({ "retention_days": 2 })).await;

    let (status, body) = app
        .call(Method::GET, "/api/readings?hours=1000", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"], 48);
    assert_eq!(body["miners"], json!([]));
}

#[tokio::test]
async fn test_readings_for_unknown_miner() {
    let app = app().await;
    let (status, _) = app
        .call(Method::GET, "/api/readings?miner_id=42", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notification_test_endpoint() {
    let app = app().await;

    let (status, body) = app
        .call(Method::POST, "/api/notifications/test", None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let hook = serve(Router::new().route("/hook", post(|| async { StatusCode::NO_CONTENT }))).await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/notifications/test",
            Some(json!({ "target": format!("{hook}/hook") })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
