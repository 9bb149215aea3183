use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use promptframe::config::{Settings, StorageSettings, setup_logging};
use promptframe::constants::MEDIA_ROUTE;
use promptframe::db::DbRepository;
use promptframe::generation::GeminiClient;
use promptframe::persistence::Persistence;
use promptframe::storage::{CloudinaryStore, LocalStore, ObjectStore};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = promptframe::cli::CliOptions::parse();

    let _ = setup_logging(cli.debug);

    let settings = match Settings::from_cli(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            error!("Configuration error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let db = match promptframe::db::connect_db(&cli.database_url).await {
        Ok(db) => db,
        Err(err) => {
            error!("Database connection error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = promptframe::db::migrations::Migrator::up(&db, None).await {
        error!("Database migration error: {}", err);
        return ExitCode::FAILURE;
    }

    let http = match reqwest::Client::builder()
        .timeout(settings.upstream_timeout)
        .build()
    {
        Ok(http) => http,
        Err(err) => {
            error!("Failed to build HTTP client: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let store: Option<Arc<dyn ObjectStore>> = match &settings.storage {
        StorageSettings::Inline => None,
        StorageSettings::Local { media_dir } => Some(Arc::new(LocalStore::new(
            media_dir.clone(),
            &format!("{}{}", settings.base_url(), MEDIA_ROUTE),
        ))),
        StorageSettings::Cloudinary(credentials) => {
            Some(Arc::new(CloudinaryStore::new(http, credentials.clone())))
        }
    };
    info!(
        "Storing images {}",
        store.as_ref().map_or("inline", |store| store.name())
    );

    let generator = match GeminiClient::new(
        settings.gemini_endpoint.clone(),
        &settings.model,
        &settings.api_key,
        settings.upstream_retries,
        settings.upstream_timeout,
    ) {
        Ok(generator) => generator,
        Err(err) => {
            error!("Failed to build generation client: {}", err);
            return ExitCode::FAILURE;
        }
    };
    info!("Generating with model {}", settings.model);

    let persistence = Persistence::new(Arc::new(DbRepository::new(db)), store);

    if let Err(err) = promptframe::web::setup_server(
        &cli.listen_address,
        cli.port,
        &settings,
        Arc::new(generator),
        persistence,
    )
    .await
    {
        error!("Application error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
