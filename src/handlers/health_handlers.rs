//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the user and video stores

use crate::services::{user_service::UserService, video_service::VideoService};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Round-trips to the user table and to the video store. HTTP 200 when both
/// answer, HTTP 503 otherwise, with a JSON body describing each check.
pub async fn readyz(
    State(users): State<UserService>,
    State(videos): State<VideoService>,
) -> impl IntoResponse {
    let users_check = match users.ping().await {
        Ok(()) => CheckStatus::ok(),
        Err(e) => CheckStatus::failed(e.to_string()),
    };
    let videos_check = match videos.ping().await {
        Ok(()) => CheckStatus::ok(),
        Err(e) => CheckStatus::failed(e.to_string()),
    };

    let overall_ok = users_check.ok && videos_check.ok;

    let mut checks = HashMap::new();
    checks.insert("users", users_check);
    checks.insert("videos", videos_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
