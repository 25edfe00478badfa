//! Doctracer client - demo upload driver.
//!
//! Uploads the files given as arguments through the real workflow and
//! reports per-file outcome.
//!
//! ## Running against a non-default service
//!
//! ```bash
//! DOCTRACER_API_URL=http://localhost:8000 cargo run -- notes.txt photo.png
//! ```
//!
//! Two instances on one machine can keep separate sessions:
//! ```bash
//! DOCTRACER_CONFIG_DIR=/tmp/dt1 cargo run -- a.txt
//! DOCTRACER_CONFIG_DIR=/tmp/dt2 cargo run -- b.txt
//! ```

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use doctracer_client::app::{AppState, SessionStore};
use doctracer_client::files::SelectedFile;
use doctracer_client::net::{ApiClient, UploadManager};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        bail!("usage: doctracer <file> [<file> ...]");
    }

    let session = SessionStore::load()
        .await
        .context("failed to load session")?;
    if !session.has_token() {
        warn!("no access token on file; the service will likely refuse the upload");
    }
    let client = ApiClient::from_env(session);

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = SelectedFile::from_path(path)
            .await
            .with_context(|| format!("failed to read {path}"))?;
        info!(name = %file.name, size = file.size, mime = %file.mime_type, "selected");
        files.push(file);
    }

    let state = AppState::new();
    state.open_upload_modal();
    state
        .select_files(files)
        .context("selection refused")?;
    info!(count = state.selected_count(), "selection ready");

    let manager = UploadManager::new(client, state.clone());
    let outcome = manager
        .upload_selected()
        .await
        .context("upload batch refused")?;

    for upload in &outcome.uploaded {
        println!("uploaded  {} ({} bytes)", upload.meta.name, upload.meta.size);
    }
    for error in &outcome.errors {
        println!("failed    {error}");
    }
    info!(
        uploaded = outcome.uploaded.len(),
        failed = outcome.errors.len(),
        "done"
    );

    if outcome.uploaded.is_empty() {
        bail!("no file made it");
    }
    Ok(())
}

/// Initialize logging with tracing.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("doctracer=info,doctracer_client=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
