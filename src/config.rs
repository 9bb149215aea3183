//! Config handling

use std::path::PathBuf;
use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::cli::{CliOptions, ServeMode, StorageKind};
use crate::constants::{DEFAULT_MODEL, LEGACY_MODEL_ALIAS};
use crate::storage::cloudinary::CloudinaryCredentials;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info)
            .with_module_level("sqlx", LevelFilter::Warn);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Maps the historical model alias onto its current name.
pub fn normalize_model_id(model: &str) -> String {
    let model = model.trim();
    if model.is_empty() {
        return DEFAULT_MODEL.to_string();
    }
    if model.eq_ignore_ascii_case(LEGACY_MODEL_ALIAS) {
        return DEFAULT_MODEL.to_string();
    }
    model.to_string()
}

/// Errors found while turning CLI options into [Settings].
#[derive(Debug)]
pub enum ConfigError {
    /// `--public-url` didn't parse
    InvalidPublicUrl(url::ParseError),
    /// `--gemini-endpoint` didn't parse
    InvalidEndpoint(url::ParseError),
    /// A required option for the chosen storage backend is missing
    MissingOption(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPublicUrl(err) => write!(f, "Invalid public URL: {err}"),
            Self::InvalidEndpoint(err) => write!(f, "Invalid generation endpoint: {err}"),
            Self::MissingOption(name) => write!(f, "Missing required option --{name}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Resolved storage backend.
#[derive(Clone, Debug)]
pub enum StorageSettings {
    /// Keep the image in the metadata row.
    Inline,
    /// Write files to a directory.
    Local {
        /// Root directory for stored files
        media_dir: PathBuf,
    },
    /// Upload to Cloudinary.
    Cloudinary(CloudinaryCredentials),
}

/// Validated runtime settings.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Absolute site URL, no trailing slash
    pub public_url: Url,
    /// Generation API root
    pub gemini_endpoint: Url,
    /// Normalised model identifier
    pub model: String,
    /// Generation API credential
    pub api_key: String,
    /// Path of the base image
    pub base_image: PathBuf,
    /// Visual marker named in the prompt template
    pub preserved_feature: String,
    /// Retry count for retryable upstream failures
    pub upstream_retries: u32,
    /// Per-request upstream timeout
    pub upstream_timeout: Duration,
    /// Concurrent generation cap
    pub max_concurrent_generations: usize,
    /// Storage backend
    pub storage: StorageSettings,
    /// How remote images are served
    pub serve_mode: ServeMode,
}

impl Settings {
    /// Validates and resolves the CLI options.
    pub fn from_cli(cli: &CliOptions) -> Result<Self, ConfigError> {
        let public_url =
            Url::parse(cli.public_url.trim_end_matches('/')).map_err(ConfigError::InvalidPublicUrl)?;
        let gemini_endpoint = Url::parse(cli.gemini_endpoint.trim_end_matches('/'))
            .map_err(ConfigError::InvalidEndpoint)?;

        let storage = match cli.storage {
            StorageKind::Inline => StorageSettings::Inline,
            StorageKind::Local => StorageSettings::Local {
                media_dir: cli.media_dir.clone(),
            },
            StorageKind::Cloudinary => StorageSettings::Cloudinary(CloudinaryCredentials {
                cloud_name: required(&cli.cloudinary_cloud_name, "cloudinary-cloud-name")?,
                api_key: required(&cli.cloudinary_api_key, "cloudinary-api-key")?,
                api_secret: required(&cli.cloudinary_api_secret, "cloudinary-api-secret")?,
                folder: cli.cloudinary_folder.trim_matches('/').to_string(),
            }),
        };

        Ok(Self {
            public_url,
            gemini_endpoint,
            model: normalize_model_id(&cli.model),
            api_key: cli.gemini_api_key.clone(),
            base_image: cli.base_image.clone(),
            preserved_feature: cli.preserved_feature.clone(),
            upstream_retries: cli.upstream_retries,
            upstream_timeout: Duration::from_secs(cli.upstream_timeout_secs),
            max_concurrent_generations: cli.max_concurrent_generations.get(),
            storage,
            serve_mode: cli.serve_mode,
        })
    }

    /// The public URL as a string without a trailing slash.
    pub fn base_url(&self) -> String {
        self.public_url.as_str().trim_end_matches('/').to_string()
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingOption(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> CliOptions {
        let mut full = vec!["promptframe", "--gemini-api-key", "k"];
        full.extend_from_slice(args);
        CliOptions::try_parse_from(full).expect("parse cli")
    }

    #[test]
    fn legacy_model_alias_is_normalized() {
        assert_eq!(normalize_model_id("gemini-2.5-flash-image-preview"), DEFAULT_MODEL);
        assert_eq!(normalize_model_id(" Gemini-2.5-Flash-Image-Preview "), DEFAULT_MODEL);
        assert_eq!(normalize_model_id("gemini-3-pro-image-preview"), "gemini-3-pro-image-preview");
        assert_eq!(normalize_model_id(""), DEFAULT_MODEL);
    }

    #[test]
    fn cloudinary_requires_credentials() {
        let cli = parse(&["--storage", "cloudinary", "--cloudinary-cloud-name", "demo"]);
        let err = Settings::from_cli(&cli).expect_err("missing key should fail");
        assert!(matches!(err, ConfigError::MissingOption("cloudinary-api-key")));
    }

    #[test]
    fn defaults_resolve() {
        let cli = parse(&["--model", "gemini-2.5-flash-image-preview"]);
        let settings = Settings::from_cli(&cli).expect("settings");
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.base_url(), "http://localhost:3000");
        assert!(matches!(settings.storage, StorageSettings::Inline));
        assert_eq!(settings.serve_mode, ServeMode::Proxy);
    }
}
