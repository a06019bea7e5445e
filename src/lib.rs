//! Video hub: user registration and login, plus chunked video upload and
//! streaming on top of SQLite.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use services::{
    chunk_store::ChunkStore, object_store::ObjectStore, user_service::UserService,
    video_service::VideoService,
};
use sqlx::SqlitePool;
use state::AppState;
use std::sync::Arc;

/// Assemble application state from a database pool and a video backend.
pub fn build_state(
    db: Arc<SqlitePool>,
    video_backend: Arc<dyn ObjectStore>,
    chunk_size: usize,
) -> AppState {
    AppState {
        videos: VideoService::new(ChunkStore::new(video_backend, chunk_size)),
        users: UserService::new(db),
    }
}

/// Build the full router with state attached.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes::routes::routes(max_upload_bytes).with_state(state)
}
