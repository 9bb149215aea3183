//! Database connection, schema and the record repository
pub mod entities;
pub mod migrations;
pub mod repository;

pub use repository::{DbRepository, ImageLocation, ImageRecord, ImageRepository, MemoryRepository};

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Connects using a full connection string, `sqlite://…` or `postgres://…`.
pub async fn connect_db(url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(url).await
}

#[cfg(test)]
/// Fresh in-memory SQLite database.
pub async fn connect_test_db() -> Result<DatabaseConnection, DbErr> {
    Database::connect("sqlite::memory:").await
}
