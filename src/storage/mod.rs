//! Object storage for generated images.
//!
//! The store only ever sees opaque keys and bytes. Which record a key belongs
//! to is the persistence layer's business.

use async_trait::async_trait;

use crate::error::AppError;

pub mod cloudinary;
pub mod local;

pub use cloudinary::CloudinaryStore;
pub use local::LocalStore;

/// Where an uploaded object ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Public retrieval URL
    pub url: String,
    /// Identifier the provider knows the object by
    pub provider_id: String,
}

/// A remote (or local) blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Stores `bytes` under `key`, which carries no extension.
    async fn put(&self, key: &str, bytes: &[u8], mime_type: &str)
    -> Result<StoredObject, AppError>;

    /// Reads back a stored object.
    async fn fetch(&self, object: &StoredObject) -> Result<Vec<u8>, AppError>;

    /// Removes a stored object. Deleting something that's already gone is fine.
    async fn delete(&self, provider_id: &str) -> Result<(), AppError>;
}
