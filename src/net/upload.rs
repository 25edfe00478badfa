//! Upload batch workflow.
//!
//! One batch uploads every selected file concurrently, reporting per-file
//! progress into [`AppState`] as bytes leave the transport. Failures never
//! abort the batch: each file settles on its own, failed ones contribute an
//! error line, and the listing learns about the successes exactly once.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::app::{AppState, UploadStateError};
use crate::files::record::SelectedFile;
use crate::net::client::{ApiClient, ApiError, FileMeta};

/// How long the modal stays open after a successful batch, so the filled
/// progress bars are visible before it disappears.
pub const CLOSE_DELAY: Duration = Duration::from_millis(500);

/// Converts a byte count into a whole progress percent.
///
/// Rounds to the nearest percent and caps at 100. A zero-byte file is
/// complete the moment it is dispatched.
#[inline]
#[must_use]
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (sent * 100 + total / 2) / total;
    pct.min(100) as u8
}

/// Groups a selection by the synthetic folder derived from each file's
/// relative path, for display. Flat files land under the empty key, which
/// sorts first.
#[must_use]
pub fn group_by_folder(files: &[SelectedFile]) -> std::collections::BTreeMap<String, Vec<SelectedFile>> {
    let mut groups = std::collections::BTreeMap::<String, Vec<SelectedFile>>::new();
    for file in files {
        groups
            .entry(file.folder_path().unwrap_or_default())
            .or_default()
            .push(file.clone());
    }
    groups
}

/// One successfully uploaded file: the metadata the service echoed back,
/// paired with the original selection so the payload survives for preview.
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    pub file: SelectedFile,
    pub meta: FileMeta,
}

/// The settled result of one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successful uploads, in selection order.
    pub uploaded: Vec<CompletedUpload>,
    /// `"<filename>: <error>"` lines for the failures, in selection order.
    pub errors: Vec<String>,
}

impl BatchOutcome {
    /// Returns true if at least one file made it.
    #[inline]
    #[must_use]
    pub fn any_uploaded(&self) -> bool {
        !self.uploaded.is_empty()
    }
}

/// Dispatches every file concurrently and waits for all of them to settle.
///
/// `upload_one` is called with the file's index in the selection; results
/// come back in selection order regardless of completion order.
pub async fn run_batch<F, Fut>(files: Vec<SelectedFile>, upload_one: F) -> BatchOutcome
where
    F: Fn(usize, SelectedFile) -> Fut,
    Fut: Future<Output = Result<FileMeta, ApiError>>,
{
    let settled = join_all(files.into_iter().enumerate().map(|(index, file)| {
        let fut = upload_one(index, file.clone());
        async move { (file, fut.await) }
    }))
    .await;

    let mut outcome = BatchOutcome::default();
    for (file, result) in settled {
        match result {
            Ok(meta) => outcome.uploaded.push(CompletedUpload { file, meta }),
            Err(e) => {
                warn!(name = %file.name, error = %e, "upload failed");
                outcome.errors.push(format!("{}: {e}", file.name));
            }
        }
    }
    outcome
}

/// Runs one batch through the upload modal lifecycle.
///
/// Marks the batch in flight, settles every file, records the error lines,
/// and then, if anything succeeded, holds the modal open for [`CLOSE_DELAY`]
/// before handing the successes to `on_uploaded` (called exactly once) and
/// closing the modal. With zero successes the modal stays open showing the
/// errors.
pub async fn run_modal_batch<F, Fut, C>(
    state: &AppState,
    upload_one: F,
    on_uploaded: C,
) -> Result<BatchOutcome, UploadStateError>
where
    F: Fn(usize, SelectedFile) -> Fut,
    Fut: Future<Output = Result<FileMeta, ApiError>>,
    C: FnOnce(&[CompletedUpload]),
{
    let files = state.begin_upload_batch()?;
    let count = files.len();

    let outcome = run_batch(files, upload_one).await;
    for line in &outcome.errors {
        state.push_upload_error(line.clone());
    }
    state.finish_upload_batch();

    info!(
        uploaded = outcome.uploaded.len(),
        failed = outcome.errors.len(),
        total = count,
        "upload batch settled"
    );

    if outcome.any_uploaded() {
        tokio::time::sleep(CLOSE_DELAY).await;
        on_uploaded(&outcome.uploaded);
        state.clear_upload_selection();
        state.close_upload_modal();
    }

    Ok(outcome)
}

/// Drives uploads of the current selection against the live service.
#[derive(Clone)]
pub struct UploadManager {
    client: ApiClient,
    state: AppState,
}

impl UploadManager {
    #[must_use]
    pub fn new(client: ApiClient, state: AppState) -> Self {
        Self { client, state }
    }

    /// Uploads the current selection as one batch, feeding progress and
    /// results back into the shared state.
    #[instrument(skip(self))]
    pub async fn upload_selected(&self) -> Result<BatchOutcome, UploadStateError> {
        let client = self.client.clone();
        let progress_state = self.state.clone();
        let listing_state = self.state.clone();

        run_modal_batch(
            &self.state,
            move |index, file| {
                let client = client.clone();
                let state = progress_state.clone();
                async move {
                    client
                        .upload(&file, move |sent, total| {
                            state.set_upload_progress(index, percent(sent, total));
                        })
                        .await
                }
            },
            move |uploaded| listing_state.ingest_uploaded(uploaded.to_vec()),
        )
        .await
    }
}
