//! sea-orm entities
pub mod generated_images;
