//! Shared helpers for integration tests.
//! Note: #[allow(dead_code)] because each test file compiles common/ separately.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use video_hub::{
    db,
    services::{object_store::ObjectStore, sqlite_store::SqliteObjectStore},
};

pub const BOUNDARY: &str = "video-hub-test-boundary";

/// Router over a private in-memory SQLite database.
pub struct TestServer {
    pub router: Router,
    pub pool: Arc<sqlx::SqlitePool>,
}

impl TestServer {
    pub async fn new(chunk_size: usize) -> Self {
        let pool = Arc::new(db::connect_in_memory().await.expect("in-memory database"));
        db::run_migrations(&pool).await.expect("migrations");
        let backend = Arc::new(SqliteObjectStore::new(pool.clone()));
        Self::with_backend(pool, backend, chunk_size)
    }

    /// Same routes, but videos go to `backend` instead of SQLite.
    pub fn with_backend(
        pool: Arc<sqlx::SqlitePool>,
        backend: Arc<dyn ObjectStore>,
        chunk_size: usize,
    ) -> Self {
        let state = video_hub::build_state(pool.clone(), backend, chunk_size);
        let router = video_hub::app(state, 16 * 1024 * 1024);
        Self { router, pool }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    pub async fn json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let (status, _, bytes) = self.send(builder.body(body).unwrap()).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Upload `data` as the `video` field; returns status and response text.
    pub async fn upload(&self, field: &str, filename: &str, data: &[u8]) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(field, filename, data)))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, String::from_utf8(body.to_vec()).unwrap())
    }
}

pub fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    let head = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: video/mp4\r\n\r\n"
    );
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Pull the id out of "Video uploaded successfully. File ID: <id>".
pub fn uploaded_id(text: &str) -> String {
    text.rsplit("File ID: ")
        .next()
        .expect("upload response carries an id")
        .trim()
        .to_string()
}

pub fn test_video(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}
