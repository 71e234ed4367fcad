//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{Json, Router, routing::get};
use miner_sentry::config::{ConfigService, JsonFileStore, Settings};
use miner_sentry::database::{DbPool, init_pool_with_size, run_migrations};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// In-memory database with the schema applied.
pub async fn setup_test_db() -> DbPool {
    let pool = init_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("Failed to create test pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A local URL nothing listens on.
pub async fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Device status document as the firmware reports it (voltage in mV).
pub fn system_info(hash_rate: f64, temp: f64, best_diff: &str, voltage_mv: f64) -> Value {
    json!({
        "hashRate": hash_rate,
        "temp": temp,
        "bestDiff": best_diff,
        "voltage": voltage_mv,
        "stratumDiff": 1000,
        "sharesAccepted": 12,
        "sharesRejected": 1,
        "stratumURL": "public-pool.io",
        "stratumPort": 21496,
        "stratumUser": "bc1qexample.worker",
        "isUsingFallbackStratum": 0
    })
}

/// Live-editable device stub: tests change the document between polls.
#[derive(Clone)]
pub struct StubMiner {
    doc: Arc<Mutex<Value>>,
}

impl StubMiner {
    pub fn new(doc: Value) -> Self {
        Self {
            doc: Arc::new(Mutex::new(doc)),
        }
    }

    pub fn set(&self, doc: Value) {
        *self.doc.lock() = doc;
    }

    pub async fn start(&self) -> String {
        let doc = self.doc.clone();
        let router = Router::new().route(
            "/api/system/info",
            get(move || {
                let body = doc.lock().clone();
                async move { Json(body) }
            }),
        );
        serve(router).await
    }
}

/// Settings file in `dir` holding `endpoints`, loaded into a fresh service.
pub fn config_with(dir: &std::path::Path, endpoints: Vec<String>) -> Arc<ConfigService> {
    let store = Arc::new(JsonFileStore::new(dir.join("settings.json")));
    let config = Arc::new(ConfigService::new(store));
    config
        .save(Settings {
            endpoints,
            ..Settings::default()
        })
        .expect("valid settings");
    config
}

/// Environment lookup backed by a map.
pub fn lookup(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
    move |key| vars.get(key).cloned()
}
