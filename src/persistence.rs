//! Writes generation results: object upload first, metadata row second.
//!
//! The two steps can't share a transaction. When the row insert fails after
//! the upload went through, the uploaded object is deleted again so storage
//! doesn't collect orphans. If that delete fails too it's logged and the
//! insert error is still what the caller sees.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::base_image::ImagePayload;
use crate::constants::GENERATIONS_PREFIX;
use crate::db::{ImageLocation, ImageRecord, ImageRepository};
use crate::error::AppError;
use crate::storage::{ObjectStore, StoredObject};

/// A new record id: UUIDv7, so ids sort by creation time.
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

/// The only writer of records.
#[derive(Clone)]
pub struct Persistence {
    repository: Arc<dyn ImageRepository>,
    store: Option<Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("store", &self.store.as_ref().map(|store| store.name()))
            .finish_non_exhaustive()
    }
}

impl Persistence {
    /// Without a store, images are kept inline in the record.
    pub fn new(
        repository: Arc<dyn ImageRepository>,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self { repository, store }
    }

    /// Read access for the gallery and single-record handlers.
    pub fn repository(&self) -> &dyn ImageRepository {
        self.repository.as_ref()
    }

    /// Uploads (when a store is configured) and records one generated image.
    pub async fn save(&self, prompt: &str, image: &ImagePayload) -> Result<ImageRecord, AppError> {
        let id = new_record_id();

        let (image_location, uploaded) = match &self.store {
            None => (
                ImageLocation::Inline {
                    mime_type: image.mime_type.clone(),
                    data: BASE64.encode(&image.bytes),
                },
                None,
            ),
            Some(store) => {
                let key = format!("{GENERATIONS_PREFIX}/{id}");
                let stored = store.put(&key, &image.bytes, &image.mime_type).await?;
                (
                    ImageLocation::Remote {
                        url: stored.url.clone(),
                        provider_id: stored.provider_id.clone(),
                        mime_type: image.mime_type.clone(),
                    },
                    Some((store, stored)),
                )
            }
        };

        let record = ImageRecord {
            id,
            prompt: prompt.to_string(),
            image_location,
            timestamp: Utc::now(),
        };

        if let Err(err) = self.repository.append(&record).await {
            if let Some((store, stored)) = uploaded {
                compensate(store.as_ref(), &stored).await;
            }
            return Err(err);
        }

        info!("Stored record {} ({} bytes)", record.id, image.bytes.len());
        Ok(record)
    }

    /// The image bytes behind a record.
    pub async fn read_image(&self, record: &ImageRecord) -> Result<ImagePayload, AppError> {
        match &record.image_location {
            ImageLocation::Inline { mime_type, data } => {
                let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                    AppError::InternalServerError(format!(
                        "record {} has undecodable inline data: {err}",
                        record.id
                    ))
                })?;
                Ok(ImagePayload::new(bytes, Some(mime_type)))
            }
            ImageLocation::Remote {
                url,
                provider_id,
                mime_type,
            } => {
                let store = self.store.as_ref().ok_or_else(|| {
                    AppError::Storage(format!(
                        "record {} is stored remotely but no object store is configured",
                        record.id
                    ))
                })?;
                let bytes = store
                    .fetch(&StoredObject {
                        url: url.clone(),
                        provider_id: provider_id.clone(),
                    })
                    .await?;
                Ok(ImagePayload::new(bytes, Some(mime_type)))
            }
        }
    }
}

async fn compensate(store: &dyn ObjectStore, stored: &StoredObject) {
    match store.delete(&stored.provider_id).await {
        Ok(()) => warn!(
            "Record insert failed, removed uploaded object {} from {}",
            stored.provider_id,
            store.name()
        ),
        Err(err) => error!(
            "Record insert failed and object {} in {} could not be removed: {}",
            stored.provider_id,
            store.name(),
            err
        ),
    }
}
