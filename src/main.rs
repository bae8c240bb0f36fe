use std::sync::Arc;

use tracing::{error, info};

use arbor::config::StorageBackend;
use arbor::web::WebServer;
use arbor::{Config, Database, DirectoryService, FileBucket, LocalBucket, S3Bucket};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = arbor::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        arbor::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> arbor::Result<()> {
    config.validate()?;
    info!("arbor - hierarchical file storage");

    let db = Database::open(&config.database.path).await?;

    let (bucket, local): (Arc<dyn FileBucket>, Option<Arc<LocalBucket>>) =
        match config.storage.backend {
            StorageBackend::Local => {
                let local = Arc::new(LocalBucket::from_config(&config.storage)?);
                info!("Storing objects under {}", config.storage.local_path);
                let bucket: Arc<dyn FileBucket> = local.clone();
                (bucket, Some(local))
            }
            StorageBackend::S3 => {
                let bucket: Arc<dyn FileBucket> = Arc::new(S3Bucket::from_config(&config.storage)?);
                (bucket, None)
            }
        };

    let root = DirectoryService::new(&db, bucket.as_ref())
        .with_object_purge(config.storage.purge_objects_on_delete)
        .with_default_page_length(config.listing.default_page_length)
        .ensure_root()
        .await?;
    info!("Root directory is {}", root.id);

    WebServer::new(&config.server, local)?.run().await
}
