//! User registration, listing and login against the `users` table.

use crate::models::user::{LoginCredentials, NewUser, User};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type UserResult<T> = Result<T, UserError>;

#[derive(Clone)]
pub struct UserService {
    pub db: Arc<SqlitePool>,
}

impl UserService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(&self, new_user: NewUser) -> UserResult<User> {
        for (field, value) in [
            ("name", &new_user.name),
            ("username", &new_user.username),
            ("password", &new_user.password),
        ] {
            if value.trim().is_empty() {
                return Err(UserError::Validation(format!("`{field}` must not be empty")));
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            username: new_user.username,
            password: new_user.password,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, name, username, password, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.created_at)
        .execute(&*self.db)
        .await?;

        info!(user_id = %user.id, username = %user.username, "created user");
        Ok(user)
    }

    pub async fn list(&self) -> UserResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, username, password, created_at
             FROM users ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(users)
    }

    /// Exact-match lookup on username and password.
    pub async fn login(&self, credentials: &LoginCredentials) -> UserResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, username, password, created_at
             FROM users WHERE username = ? AND password = ?
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(&credentials.username)
        .bind(&credentials.password)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(UserError::InvalidCredentials)
    }

    pub async fn ping(&self) -> UserResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
