//! Shared constants/setters for things
//!

use std::sync::LazyLock;

/// Default generation API root.
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default image model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Model name used before the image model left preview, still accepted in config.
pub const LEGACY_MODEL_ALIAS: &str = "gemini-2.5-flash-image-preview";

/// Header carrying the API key on generation requests.
pub const X_GOOG_API_KEY: &str = "x-goog-api-key";

/// Response header carrying the id of a freshly generated record.
pub const X_IMAGE_ID: &str = "x-image-id";

/// What the model must leave untouched unless told otherwise.
pub const DEFAULT_PRESERVED_FEATURE: &str =
    "the character's face, including the small star-shaped mark under the left eye";

/// Title used on share pages and the gallery.
pub const SITE_TITLE: &str = "promptframe";

/// Where local-storage files are mounted.
pub const MEDIA_ROUTE: &str = "/media";

/// Key prefix for stored generations.
pub const GENERATIONS_PREFIX: &str = "generations";

/// Max length of the prompt-derived part of a download filename.
pub const DOWNLOAD_SLUG_MAX_LEN: usize = 48;

/// Max age (in seconds) for image cache entries.
pub const IMAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60 * 24;

/// Shared cache max age (in seconds) for image cache entries.
pub const IMAGE_CACHE_S_MAXAGE_SECONDS: u64 = 60 * 60 * 24 * 7;

/// Cache-Control value for image responses. Records never change once written.
pub static IMAGE_CACHE_CONTROL: LazyLock<String> = LazyLock::new(|| {
    format!(
        "public, max-age={}, s-maxage={}, immutable",
        IMAGE_CACHE_MAX_AGE_SECONDS, IMAGE_CACHE_S_MAXAGE_SECONDS
    )
});

/// Linear backoff step between upstream retries, in milliseconds.
pub const UPSTREAM_BACKOFF_MS: u64 = 500;

#[cfg(test)]
/// Public URL used in tests
pub const TEST_PUBLIC_URL: &str = "https://example.org";
