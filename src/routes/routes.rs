//! Defines routes for the user and video endpoints.
//!
//! ## Structure
//! - **Users**
//!   - `POST   /users` — create user
//!   - `GET    /users` — list users
//!   - `POST   /login` — exact-match credential check
//!
//! - **Videos**
//!   - `POST   /upload`       — multipart upload (field `video`)
//!   - `GET    /video/first`  — stream the earliest video
//!   - `GET    /video/latest` — stream the most recent video
//!   - `GET    /video/{id}`   — stream a video by id
//!   - `DELETE /video/{id}`   — delete a video
//!
//! - **Docs**
//!   - `GET    /docs/openapi.json` — OpenAPI description of these routes
//!
//! Static `/video/first` and `/video/latest` take precedence over `{id}`.

use crate::{
    handlers::{
        docs_handlers::openapi_json,
        health_handlers::{healthz, readyz},
        user_handlers::{create_user, list_users, login},
        video_handlers::{
            delete_video, get_first_video, get_latest_video, get_video, upload_video,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. `max_upload_bytes` bounds the `/upload` request body.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/docs/openapi.json", get(openapi_json))
        // users
        .route("/users", get(list_users).post(create_user))
        .route("/login", post(login))
        // videos
        .route(
            "/upload",
            post(upload_video).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/video/first", get(get_first_video))
        .route("/video/latest", get(get_latest_video))
        .route("/video/{id}", get(get_video).delete(delete_video))
}
