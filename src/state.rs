//! Shared application state handed to every handler.

use crate::services::{user_service::UserService, video_service::VideoService};
use axum::extract::FromRef;

/// Built once at start-up and cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub videos: VideoService,
    pub users: UserService,
}

impl FromRef<AppState> for VideoService {
    fn from_ref(state: &AppState) -> Self {
        state.videos.clone()
    }
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}
