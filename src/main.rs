//! Production entry point for the chunkd upload service.
//!
//! Wires the durable JSON progress store, the chunk assembler, and the
//! REST API together and serves them on a single listener.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{app, AppState};
use chunkd_core::{ChunkAssembler, UploadConfig, UploadTracker};
use chunkd_store::JsonFileStore;

/// Main entry point for the chunkd application
///
/// Starts the REST server on port 3000 (configurable via CHUNKD_ADDR).
/// Upload progress records are persisted as JSON files so interrupted
/// uploads can resume after a restart.
///
/// # Environment Variables
/// - `CHUNKD_ADDR`: server address (default: "0.0.0.0:3000")
/// - `CHUNKD_UPLOAD_DIR`: chunk and artifact directory (default: "./data/uploads")
/// - `CHUNKD_STATE_DIR`: progress record directory (default: "./data/upload-state")
/// - `CHUNKD_MAX_CHUNK_BYTES`: per-chunk payload ceiling (default: 64 MiB)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chunkd=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CHUNKD_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let upload_dir: PathBuf = std::env::var("CHUNKD_UPLOAD_DIR")
        .unwrap_or_else(|_| "./data/uploads".into())
        .into();
    let state_dir: PathBuf = std::env::var("CHUNKD_STATE_DIR")
        .unwrap_or_else(|_| "./data/upload-state".into())
        .into();
    let max_chunk_bytes = match std::env::var("CHUNKD_MAX_CHUNK_BYTES") {
        Ok(value) => value.parse()?,
        Err(_) => chunkd_core::DEFAULT_MAX_CHUNK_BYTES,
    };

    tracing::info!("++ Starting chunkd REST on {}", addr);
    tracing::info!("++ Upload dir: {}", upload_dir.display());
    tracing::info!("++ State dir: {}", state_dir.display());

    let store = JsonFileStore::open(state_dir)?;
    let config = Arc::new(UploadConfig::new(upload_dir, max_chunk_bytes)?);
    let tracker = UploadTracker::new(Arc::new(store));
    let assembler = Arc::new(ChunkAssembler::new(config, tracker));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(AppState { assembler })).await?;

    Ok(())
}
