#![allow(dead_code)]
use std::{env, sync::Arc, time::Duration as StdDuration};

use axum::{body::Body, http::Request, response::Response, Router};
use logbook_backend::{
    config::{Config, LogbookConfig},
    services::{EntryStore, MemoryEntryStore},
    state::AppState,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tower::ServiceExt;

static DB_LOCK: OnceCell<Mutex<()>> = OnceCell::const_new();

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.logbook.database_connection = Some("memory".into());
    config
}

pub fn memory_state(logbook: LogbookConfig) -> (AppState, Arc<MemoryEntryStore>) {
    let mut config = test_config();
    config.logbook = logbook;
    let store = Arc::new(MemoryEntryStore::new());
    let state = AppState::new(config, store.clone() as Arc<dyn EntryStore>);
    (state, store)
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("call app")
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Serializes tests that share the Postgres table.
pub async fn db_lock() -> MutexGuard<'static, ()> {
    DB_LOCK
        .get_or_init(|| async { Mutex::new(()) })
        .await
        .lock()
        .await
}

/// Migrated pool for `TEST_DATABASE_URL`, or `None` when it is unset.
pub async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(StdDuration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

pub async fn reset_entries(pool: &PgPool) {
    sqlx::query("TRUNCATE logbook_entries RESTART IDENTITY")
        .execute(pool)
        .await
        .expect("truncate logbook_entries");
}
