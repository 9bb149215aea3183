//! Record storage behind a narrow append/list/get interface.
//!
//! Records are written once by the persistence layer and never updated or
//! deleted. Listing is newest first; rows sharing a timestamp fall back to
//! the id, which is time-ordered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait, QueryOrder,
};
use serde::Serialize;
use tokio::sync::RwLock;

use super::entities::generated_images;
use crate::error::AppError;

/// Where a record's image bytes live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageLocation {
    /// Base64 payload kept with the metadata
    Inline {
        /// MIME type of the payload
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// base64 (standard alphabet) image bytes
        data: String,
    },
    /// Object in a storage service
    Remote {
        /// Public URL
        url: String,
        /// Provider's identifier for the object
        #[serde(rename = "providerId")]
        provider_id: String,
        /// MIME type of the object
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ImageLocation {
    /// MIME type of the stored image.
    pub fn mime_type(&self) -> &str {
        match self {
            ImageLocation::Inline { mime_type, .. } | ImageLocation::Remote { mime_type, .. } => {
                mime_type
            }
        }
    }
}

/// One persisted generation result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Unique, never reused
    pub id: String,
    /// The user's prompt, untrusted
    pub prompt: String,
    /// Where the bytes are
    pub image_location: ImageLocation,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<generated_images::Model> for ImageRecord {
    type Error = DbErr;

    fn try_from(model: generated_images::Model) -> Result<Self, Self::Error> {
        let image_location = match (model.image_data, model.image_url, model.provider_id) {
            (Some(data), _, _) => ImageLocation::Inline {
                mime_type: model.mime_type,
                data,
            },
            (None, Some(url), Some(provider_id)) => ImageLocation::Remote {
                url,
                provider_id,
                mime_type: model.mime_type,
            },
            _ => {
                return Err(DbErr::Custom(format!(
                    "record {} has no image location",
                    model.id
                )));
            }
        };
        Ok(Self {
            id: model.id,
            prompt: model.prompt,
            image_location,
            timestamp: model.created_at,
        })
    }
}

impl From<&ImageRecord> for generated_images::Model {
    fn from(record: &ImageRecord) -> Self {
        let (mime_type, image_data, image_url, provider_id) = match &record.image_location {
            ImageLocation::Inline { mime_type, data } => {
                (mime_type.clone(), Some(data.clone()), None, None)
            }
            ImageLocation::Remote {
                url,
                provider_id,
                mime_type,
            } => (
                mime_type.clone(),
                None,
                Some(url.clone()),
                Some(provider_id.clone()),
            ),
        };
        Self {
            id: record.id.clone(),
            prompt: record.prompt.clone(),
            mime_type,
            image_data,
            image_url,
            provider_id,
            created_at: record.timestamp,
        }
    }
}

/// Append-only record storage.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Stores a new record. Fails if the id already exists.
    async fn append(&self, record: &ImageRecord) -> Result<(), AppError>;

    /// Every record, newest first.
    async fn list_descending(&self) -> Result<Vec<ImageRecord>, AppError>;

    /// One record by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<ImageRecord>, AppError>;
}

/// sea-orm backed repository, used in production.
#[derive(Clone, Debug)]
pub struct DbRepository {
    db: DatabaseConnection,
}

impl DbRepository {
    /// Wraps a connection. Migrations are the caller's job.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImageRepository for DbRepository {
    async fn append(&self, record: &ImageRecord) -> Result<(), AppError> {
        let model = generated_images::Model::from(record);
        generated_images::ActiveModel {
            id: Set(model.id),
            prompt: Set(model.prompt),
            mime_type: Set(model.mime_type),
            image_data: Set(model.image_data),
            image_url: Set(model.image_url),
            provider_id: Set(model.provider_id),
            created_at: Set(model.created_at),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn list_descending(&self) -> Result<Vec<ImageRecord>, AppError> {
        let models = generated_images::Entity::find()
            .order_by_desc(generated_images::Column::CreatedAt)
            .order_by_desc(generated_images::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(ImageRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ImageRecord>, AppError> {
        let model = generated_images::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?;
        Ok(model.map(ImageRecord::try_from).transpose()?)
    }
}

/// In-process repository for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<Vec<ImageRecord>>,
}

impl MemoryRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageRepository for MemoryRepository {
    async fn append(&self, record: &ImageRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(AppError::InternalServerError(format!(
                "duplicate record id {}",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn list_descending(&self) -> Result<Vec<ImageRecord>, AppError> {
        let mut records: Vec<ImageRecord> =
            self.records.read().await.iter().rev().cloned().collect();
        // stable, so equal timestamps stay newest-insert first
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ImageRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm_migration::MigratorTrait;

    async fn db_repository() -> DbRepository {
        let db = crate::db::connect_test_db()
            .await
            .expect("connect test db");
        crate::db::migrations::Migrator::up(&db, None)
            .await
            .expect("run migrations");
        DbRepository::new(db)
    }

    fn record(id: &str, prompt: &str, timestamp: DateTime<Utc>) -> ImageRecord {
        ImageRecord {
            id: id.to_string(),
            prompt: prompt.to_string(),
            image_location: ImageLocation::Inline {
                mime_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            },
            timestamp,
        }
    }

    async fn assert_ordering(repo: &dyn ImageRepository) {
        assert!(repo.list_descending().await.expect("list").is_empty());

        let now = Utc::now();
        for (id, prompt, offset) in [("01-a", "A", 0), ("02-b", "B", 1), ("03-c", "C", 2)] {
            repo.append(&record(id, prompt, now + Duration::seconds(offset)))
                .await
                .expect("append");
        }
        let prompts: Vec<String> = repo
            .list_descending()
            .await
            .expect("list")
            .into_iter()
            .map(|record| record.prompt)
            .collect();
        assert_eq!(prompts, ["C", "B", "A"]);
    }

    #[tokio::test]
    async fn memory_lists_newest_first() {
        assert_ordering(&MemoryRepository::new()).await;
    }

    #[tokio::test]
    async fn db_lists_newest_first() {
        assert_ordering(&db_repository().await).await;
    }

    #[tokio::test]
    async fn same_timestamp_keeps_insert_order() {
        let now = Utc::now();
        let memory = MemoryRepository::new();
        let db = db_repository().await;
        let repos: [&dyn ImageRepository; 2] = [&memory, &db];
        for repo in repos {
            for (id, prompt) in [("01-a", "A"), ("02-b", "B"), ("03-c", "C")] {
                repo.append(&record(id, prompt, now)).await.expect("append");
            }
            let ids: Vec<String> = repo
                .list_descending()
                .await
                .expect("list")
                .into_iter()
                .map(|record| record.id)
                .collect();
            assert_eq!(ids, ["03-c", "02-b", "01-a"]);
        }
    }

    #[tokio::test]
    async fn db_round_trips_remote_location() {
        let repo = db_repository().await;
        let remote = ImageRecord {
            image_location: ImageLocation::Remote {
                url: "https://cdn.example.org/x.png".to_string(),
                provider_id: "promptframe/x".to_string(),
                mime_type: "image/png".to_string(),
            },
            ..record("x", "remote one", Utc::now())
        };
        repo.append(&remote).await.expect("append");

        let fetched = repo.get_by_id("x").await.expect("get").expect("exists");
        assert_eq!(fetched.image_location, remote.image_location);
        assert_eq!(fetched.prompt, "remote one");
        assert!(repo.get_by_id("missing").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let now = Utc::now();
        let memory = MemoryRepository::new();
        let db = db_repository().await;
        let repos: [&dyn ImageRepository; 2] = [&memory, &db];
        for repo in repos {
            repo.append(&record("dup", "first", now)).await.expect("append");
            assert!(repo.append(&record("dup", "second", now)).await.is_err());
        }
    }

    #[test]
    fn gallery_json_shape() {
        let value = serde_json::to_value(record("abc", "hi", Utc::now())).expect("serialize");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["imageLocation"]["kind"], "inline");
        assert_eq!(value["imageLocation"]["mimeType"], "image/png");
        assert!(value["timestamp"].is_string());
    }
}
