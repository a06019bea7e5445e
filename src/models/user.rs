//! Registered users and login credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered user.
///
/// The password is kept as submitted and compared verbatim at login. It is
/// never written back out in responses.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /users`. All fields are required.
#[derive(Deserialize, Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub password: String,
}

/// Body of `POST /login`.
#[derive(Deserialize, Debug, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}
