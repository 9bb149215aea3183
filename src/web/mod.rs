//! HTTP surface: router, shared state and server startup
use std::num::NonZeroU16;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::Semaphore;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::cli::ServeMode;
use crate::config::{Settings, StorageSettings};
use crate::constants::MEDIA_ROUTE;
use crate::generation::ImageGenerator;
use crate::persistence::Persistence;

mod api;
mod images;
mod prelude;
mod share;
mod views;

#[derive(Clone)]
pub(crate) struct AppState {
    base_url: String,
    base_image: PathBuf,
    preserved_feature: String,
    serve_mode: ServeMode,
    generator: Arc<dyn ImageGenerator>,
    persistence: Persistence,
    generation_permits: Arc<Semaphore>,
}

impl AppState {
    fn new(
        settings: &Settings,
        generator: Arc<dyn ImageGenerator>,
        persistence: Persistence,
    ) -> Self {
        Self {
            base_url: settings.base_url(),
            base_image: settings.base_image.clone(),
            preserved_feature: settings.preserved_feature.clone(),
            serve_mode: settings.serve_mode,
            generator,
            persistence,
            generation_permits: Arc::new(Semaphore::new(settings.max_concurrent_generations)),
        }
    }
}

fn create_router(media_dir: Option<&Path>) -> Router<AppState> {
    let router = Router::new()
        .route("/", get(views::root_handler))
        .route("/api/generate", post(api::generate_handler))
        .route("/api/gallery", get(api::gallery_handler))
        .route("/api/image/{id}", get(api::image_handler))
        .route("/api/download/{id}", get(api::download_handler))
        .route("/api/share/{id}", get(share::share_handler));

    match media_dir {
        Some(dir) => router.nest_service(MEDIA_ROUTE, ServeDir::new(dir)),
        None => router,
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Binds the listener and serves until ctrl-c.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    settings: &Settings,
    generator: Arc<dyn ImageGenerator>,
    persistence: Persistence,
) -> Result<(), anyhow::Error> {
    let media_dir = match &settings.storage {
        StorageSettings::Local { media_dir } => Some(media_dir.as_path()),
        StorageSettings::Inline | StorageSettings::Cloudinary(_) => None,
    };
    let app = create_router(media_dir).with_state(AppState::new(settings, generator, persistence));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{} ({})", addr, settings.base_url());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}
