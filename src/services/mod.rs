pub mod chunk_store;
pub mod memory_store;
pub mod object_store;
pub mod sqlite_store;
pub mod user_service;
pub mod video_service;
