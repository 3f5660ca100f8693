use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_annotator::{
    api,
    config::{Config, ProcessingBackend, StorageBackend},
    invoker::{self, ProcessingInvoker},
    object_store::{self, ObjectStore},
    tracker::UploadTracker,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "image-annotator starting");

    // Load configuration
    let config = Config::load()?;

    // Initialize object store backend
    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let store = object_store::LocalStore::new(&config.storage.local_storage_path)?;
            info!(
                "Using local storage backend at: {}",
                config.storage.local_storage_path
            );
            Arc::new(store)
        }
        StorageBackend::S3 => {
            let bucket = config
                .storage
                .s3_bucket
                .as_deref()
                .expect("S3_BUCKET validated in config");
            let store = object_store::S3Store::new(
                bucket,
                &config.storage.aws_region,
                config.storage.aws_endpoint.as_deref(),
            )
            .await;
            info!("Using S3 storage backend, bucket: {}", bucket);
            Arc::new(store)
        }
    };

    // Initialize the processing invoker
    let bucket = config.storage.s3_bucket.as_deref().unwrap_or_default();
    let trigger: Arc<dyn ProcessingInvoker> = match config.processing.backend {
        ProcessingBackend::Lambda => {
            let lambda = invoker::LambdaInvoker::new(
                &config.processing.function_name,
                bucket,
                &config.storage.aws_region,
                config.processing.lambda_endpoint.as_deref(),
            )
            .await;
            info!(
                "Using Lambda processing backend, function: {}",
                config.processing.function_name
            );
            Arc::new(lambda)
        }
        ProcessingBackend::Noop => {
            info!("Using noop processing backend");
            Arc::new(invoker::NoopInvoker)
        }
    };

    let tracker = UploadTracker::new(
        store,
        trigger,
        Duration::from_millis(config.upstream_timeout_ms),
    );

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        tracker,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on: {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
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
