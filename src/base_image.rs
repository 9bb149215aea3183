//! Loads the fixed image that every prompt edits.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::AppError;

/// Image bytes plus their MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    /// Raw image bytes
    pub bytes: Vec<u8>,
    /// e.g. `image/png`
    pub mime_type: String,
}

impl ImagePayload {
    /// Builds a payload, sniffing the MIME type from the bytes when none is given.
    pub fn new(bytes: Vec<u8>, mime_type: Option<&str>) -> Self {
        let mime_type = match mime_type {
            Some(mime) if mime.starts_with("image/") => mime.to_string(),
            _ => sniff_mime_type(&bytes).to_string(),
        };
        Self { bytes, mime_type }
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Best guess at the MIME type of some image bytes, `image/png` when unknown.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/png")
}

/// Maps a MIME type to a file extension.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/avif" => "avif",
        _ => "png",
    }
}

/// Reads the base image. A missing file is the caller's problem, so it maps to a 400.
pub async fn load_base_image(path: &Path) -> Result<ImagePayload, AppError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Err(AppError::BadRequest(format!(
            "Base image {} is empty",
            path.display()
        ))),
        Ok(bytes) => Ok(ImagePayload::new(bytes, None)),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(AppError::BadRequest(format!(
            "Base image not found at {}",
            path.display()
        ))),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
pub(crate) const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8, 0xCF, 0xC0, 0xF0,
    0x1F, 0x00, 0x05, 0x00, 0x01, 0xFF, 0x89, 0x99, 0x3D, 0x1D, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45,
    0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_base_image_is_a_client_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_base_image(&dir.path().join("nope.png"))
            .await
            .expect_err("missing file");
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn loads_and_sniffs_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("base.bin");
        std::fs::write(&path, TINY_PNG).expect("write png");

        let payload = load_base_image(&path).await.expect("load");
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.extension(), "png");
        assert_eq!(payload.bytes, TINY_PNG);
    }

    #[test]
    fn explicit_mime_wins_over_sniffing() {
        let payload = ImagePayload::new(TINY_PNG.to_vec(), Some("image/webp"));
        assert_eq!(payload.mime_type, "image/webp");
        let payload = ImagePayload::new(b"not an image".to_vec(), Some("text/plain"));
        assert_eq!(payload.mime_type, "image/png");
    }
}
