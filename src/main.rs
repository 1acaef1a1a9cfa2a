use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use object_explorer::{
    api,
    config::{Config, StorageBackend},
    object_store as obj, AppState,
};

type Backend = (Arc<dyn obj::ObjectStore>, Option<Arc<obj::UrlSigner>>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "object-explorer starting");

    let config = Config::load()?;
    let (object_store, signer) = open_backend(&config).await?;
    let state = Arc::new(AppState::new(config.clone(), object_store, signer));

    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

/// `LOG_FORMAT` picks the output: `gcp` for Cloud Logging, `json`, or plain text.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match std::env::var("LOG_FORMAT")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "gcp" => registry.with(tracing_stackdriver::layer()).init(),
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(false),
            )
            .init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_backend(config: &Config) -> anyhow::Result<Backend> {
    match config.storage.backend {
        StorageBackend::Local => {
            let secret = match config.capabilities.signing_secret {
                Some(ref s) => s.as_bytes().to_vec(),
                None => {
                    tracing::warn!("SIGNING_SECRET not set; issued URLs die with this process");
                    random_secret()?
                }
            };
            let signer = Arc::new(obj::UrlSigner::new(
                &secret,
                config.capabilities.public_base_url.as_str(),
            ));
            let store = obj::LocalStore::new(&config.storage.local_storage_path)?
                .with_signer(Arc::clone(&signer));
            info!(path = %config.storage.local_storage_path, "Using local storage backend");
            Ok((Arc::new(store), Some(signer)))
        }
        StorageBackend::Gcs => {
            let bucket = config
                .storage
                .gcs_bucket
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("GCS_BUCKET is required for the gcs backend"))?;
            let store =
                obj::GcsStore::new(bucket, config.storage.gcs_credentials_file.as_deref()).await?;
            info!(bucket, "Using GCS storage backend");
            Ok((Arc::new(store), None))
        }
    }
}

fn random_secret() -> anyhow::Result<Vec<u8>> {
    use ring::rand::SecureRandom;

    let mut secret = vec![0u8; 32];
    ring::rand::SystemRandom::new()
        .fill(&mut secret)
        .map_err(|_| anyhow::anyhow!("Failed to generate signing secret"))?;
    Ok(secret)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
