//! CLI parser
use clap::{Parser, ValueEnum};
use std::num::{NonZeroU16, NonZeroUsize};
use std::path::PathBuf;

use crate::constants::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_MODEL, DEFAULT_PRESERVED_FEATURE};

/// Where generated image bytes end up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// Base64 payload stored in the metadata row itself.
    #[default]
    Inline,
    /// Files written to `--media-dir` and served under `/media/`.
    Local,
    /// Uploaded to Cloudinary.
    Cloudinary,
}

/// How remote-URL records are handed back to clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ServeMode {
    /// Fetch the stored object server-side and stream it back.
    #[default]
    Proxy,
    /// Redirect the client to the storage URL.
    Redirect,
}

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "PROMPTFRAME_DEBUG")]
    /// Enable debug logging. Env: PROMPTFRAME_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "3000", env = "PROMPTFRAME_PORT")]
    /// http listener, defaults to `3000`.
    /// Env: PROMPTFRAME_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "PROMPTFRAME_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: PROMPTFRAME_LISTEN_ADDRESS
    pub listen_address: String,
    #[clap(
        long,
        default_value = "http://localhost:3000",
        env = "PROMPTFRAME_PUBLIC_URL"
    )]
    /// Absolute URL the site is reachable on, used for share-page links.
    /// Env: PROMPTFRAME_PUBLIC_URL
    pub public_url: String,

    #[clap(
        long,
        default_value = "sqlite://promptframe.sqlite?mode=rwc",
        env = "PROMPTFRAME_DATABASE_URL"
    )]
    /// Database connection string, sqlite or postgres.
    /// Env: PROMPTFRAME_DATABASE_URL
    pub database_url: String,

    #[clap(long, default_value = "./assets/base.png", env = "PROMPTFRAME_BASE_IMAGE")]
    /// The fixed image every prompt edits.
    /// Env: PROMPTFRAME_BASE_IMAGE
    pub base_image: PathBuf,

    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// API key for the image-generation endpoint. Env: GEMINI_API_KEY
    pub gemini_api_key: String,
    #[clap(long, default_value = DEFAULT_GEMINI_ENDPOINT, env = "PROMPTFRAME_GEMINI_ENDPOINT")]
    /// Base URL of the generation API. Env: PROMPTFRAME_GEMINI_ENDPOINT
    pub gemini_endpoint: String,
    #[clap(long, default_value = DEFAULT_MODEL, env = "PROMPTFRAME_MODEL")]
    /// Model identifier. Env: PROMPTFRAME_MODEL
    pub model: String,
    #[clap(
        long,
        default_value = DEFAULT_PRESERVED_FEATURE,
        env = "PROMPTFRAME_PRESERVED_FEATURE"
    )]
    /// The visual marker the model is told to keep intact.
    /// Env: PROMPTFRAME_PRESERVED_FEATURE
    pub preserved_feature: String,
    #[clap(long, default_value = "2", env = "PROMPTFRAME_UPSTREAM_RETRIES")]
    /// Retries for transport errors and 5xx from the generation API.
    /// Env: PROMPTFRAME_UPSTREAM_RETRIES
    pub upstream_retries: u32,
    #[clap(long, default_value = "120", env = "PROMPTFRAME_UPSTREAM_TIMEOUT_SECS")]
    /// Per-request timeout for the generation API.
    /// Env: PROMPTFRAME_UPSTREAM_TIMEOUT_SECS
    pub upstream_timeout_secs: u64,
    #[clap(long, default_value = "4", env = "PROMPTFRAME_MAX_CONCURRENT_GENERATIONS")]
    /// Cap on simultaneous generation calls.
    /// Env: PROMPTFRAME_MAX_CONCURRENT_GENERATIONS
    pub max_concurrent_generations: NonZeroUsize,

    #[clap(long, value_enum, default_value_t, env = "PROMPTFRAME_STORAGE")]
    /// Image storage backend. Env: PROMPTFRAME_STORAGE
    pub storage: StorageKind,
    #[clap(long, default_value = "./media", env = "PROMPTFRAME_MEDIA_DIR")]
    /// Directory for the `local` storage backend. Env: PROMPTFRAME_MEDIA_DIR
    pub media_dir: PathBuf,
    #[clap(long, env = "CLOUDINARY_CLOUD_NAME")]
    /// Cloudinary cloud name. Env: CLOUDINARY_CLOUD_NAME
    pub cloudinary_cloud_name: Option<String>,
    #[clap(long, env = "CLOUDINARY_API_KEY", hide_env_values = true)]
    /// Cloudinary API key. Env: CLOUDINARY_API_KEY
    pub cloudinary_api_key: Option<String>,
    #[clap(long, env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    /// Cloudinary API secret. Env: CLOUDINARY_API_SECRET
    pub cloudinary_api_secret: Option<String>,
    #[clap(long, default_value = "promptframe", env = "CLOUDINARY_FOLDER")]
    /// Folder uploads land in. Env: CLOUDINARY_FOLDER
    pub cloudinary_folder: String,

    #[clap(long, value_enum, default_value_t, env = "PROMPTFRAME_SERVE_MODE")]
    /// Proxy or redirect for remotely stored images. Env: PROMPTFRAME_SERVE_MODE
    pub serve_mode: ServeMode,
}
