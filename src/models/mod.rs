//! Core data models for the video hub.
//!
//! Records map to database tables via `sqlx::FromRow` and serialize as JSON
//! via `serde`. Required columns are non-optional fields, so a row missing one
//! fails to decode instead of producing a zero value.

pub mod user;
pub mod video;
