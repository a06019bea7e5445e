//! HTTP handlers for users and login.

use crate::{
    errors::AppError,
    models::user::{LoginCredentials, NewUser, User},
    services::user_service::UserService,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

/// `POST /users`
pub async fn create_user(
    State(service): State<UserService>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(new_user) = payload?;
    let user = service.create(new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users`
pub async fn list_users(State(service): State<UserService>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(service.list().await?))
}

/// `POST /login` — answers 401 with no user data when nothing matches.
pub async fn login(
    State(service): State<UserService>,
    payload: Result<Json<LoginCredentials>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(credentials) = payload?;
    let user = service.login(&credentials).await?;
    Ok(Json(user))
}
