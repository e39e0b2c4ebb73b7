//! Standalone development server.
//!
//! ## Purpose
//! Runs the chunkd REST API on its own with an in-memory progress store.
//!
//! ## Intended use
//! Development and debugging: uploads work end to end (chunks and merged
//! artifacts land in the upload directory), but resume state does not
//! survive a restart. The workspace's main `chunkd-run` binary is the
//! production entry point with the durable store.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{app, AppState};
use chunkd_core::{ChunkAssembler, UploadConfig, UploadTracker};
use chunkd_store::MemoryStore;

/// # Environment Variables
/// - `CHUNKD_ADDR`: server address (default: "0.0.0.0:3000")
/// - `CHUNKD_UPLOAD_DIR`: chunk/artifact directory (default: "./data/uploads")
/// - `CHUNKD_MAX_CHUNK_BYTES`: per-chunk payload ceiling
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("chunkd=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CHUNKD_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let upload_dir: PathBuf = std::env::var("CHUNKD_UPLOAD_DIR")
        .unwrap_or_else(|_| "./data/uploads".into())
        .into();
    let max_chunk_bytes = match std::env::var("CHUNKD_MAX_CHUNK_BYTES") {
        Ok(value) => value.parse()?,
        Err(_) => chunkd_core::DEFAULT_MAX_CHUNK_BYTES,
    };

    tracing::info!("-- Starting chunkd dev REST API on {}", addr);
    tracing::warn!("-- Using in-memory progress store; resume state will not survive restart");

    let config = Arc::new(UploadConfig::new(upload_dir, max_chunk_bytes)?);
    let tracker = UploadTracker::new(Arc::new(MemoryStore::new()));
    let assembler = Arc::new(ChunkAssembler::new(config, tracker));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(AppState { assembler })).await?;

    Ok(())
}
