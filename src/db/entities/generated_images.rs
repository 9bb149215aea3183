//! One row per successful generation
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "generated_images")]
/// Stored generation metadata
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    /// UUIDv7 string
    pub id: String,
    #[sea_orm(column_type = "Text")]
    /// user prompt, as typed
    pub prompt: String,
    /// MIME type of the image
    pub mime_type: String,
    #[sea_orm(column_type = "Text", nullable)]
    /// base64 payload when stored inline
    pub image_data: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    /// public URL when stored remotely
    pub image_url: Option<String>,
    #[sea_orm(nullable)]
    /// storage provider's identifier when stored remotely
    pub provider_id: Option<String>,
    /// creation time, the gallery sort key
    pub created_at: DateTimeUtc,
}

/// no relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
