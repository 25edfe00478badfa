//! Shared view state for the file browser.
//!
//! [`AppState`] is a cheap-to-clone handle over the listing collections and
//! the upload modal. All mutation happens behind one lock, so progress ticks
//! arriving from concurrent upload tasks never race the rendering layer.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::files::listing::{self, FilterKey, Section, SortKey};
use crate::files::record::{FileRecord, FolderRecord, SelectedFile};
use crate::net::upload::CompletedUpload;

/// Default capacity for the file listing.
const DEFAULT_FILES_CAPACITY: usize = 32;
/// Default capacity for the upload selection.
const DEFAULT_SELECTION_CAPACITY: usize = 16;

/// Errors raised by upload modal operations.
///
/// These mirror disabled-control preconditions rather than runtime failures:
/// the upload button is disabled for an empty selection, and selection is
/// refused while a batch is outstanding.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStateError {
    #[error("an upload batch is already in flight")]
    BatchInFlight,

    #[error("no files selected")]
    EmptySelection,
}

/// Contextual menu actions on a file row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Download,
    Rename,
    Delete,
}

/// Contextual menu actions on a folder row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderAction {
    Rename,
    Delete,
}

/// Upload modal state: one instance, one batch at a time.
#[derive(Debug, Default)]
struct UploadModal {
    open: bool,
    selected: Vec<SelectedFile>,
    /// Per-file progress percent, index-aligned with `selected`.
    progress: Vec<u8>,
    errors: Vec<String>,
    uploading: bool,
}

struct AppStateInner {
    section: Section,
    folders: Vec<FolderRecord>,
    files: Vec<FileRecord>,
    sort_key: SortKey,
    filter_key: FilterKey,
    upload: UploadModal,
}

/// Shared application state accessible across the client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<AppStateInner>>,
}

impl AppState {
    /// Creates fresh state showing the My Files section.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppStateInner {
                section: Section::MyFiles,
                folders: Vec::new(),
                files: Vec::with_capacity(DEFAULT_FILES_CAPACITY),
                sort_key: SortKey::default(),
                filter_key: FilterKey::default(),
                upload: UploadModal {
                    selected: Vec::with_capacity(DEFAULT_SELECTION_CAPACITY),
                    ..UploadModal::default()
                },
            })),
        }
    }

    // ===== Listing =====

    /// Gets the active section.
    #[inline]
    #[must_use]
    pub fn section(&self) -> Section {
        self.inner.read().section
    }

    /// Switches the active section.
    #[inline]
    pub fn set_section(&self, section: Section) {
        self.inner.write().section = section;
    }

    /// Sets the sort key.
    #[inline]
    pub fn set_sort_key(&self, key: SortKey) {
        self.inner.write().sort_key = key;
    }

    /// Sets the filter key.
    #[inline]
    pub fn set_filter_key(&self, key: FilterKey) {
        self.inner.write().filter_key = key;
    }

    /// Files after the current filter and sort, recomputed on every call.
    #[must_use]
    pub fn displayed_files(&self) -> Vec<FileRecord> {
        let inner = self.inner.read();
        listing::displayed_files(&inner.files, inner.filter_key, inner.sort_key)
    }

    /// Folders in name order.
    #[must_use]
    pub fn displayed_folders(&self) -> Vec<FolderRecord> {
        listing::displayed_folders(&self.inner.read().folders)
    }

    /// Gets the count of files held, before filtering.
    #[inline]
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.inner.read().files.len()
    }

    /// Ingests completed uploads as listing records.
    pub fn ingest_uploaded(&self, uploads: Vec<CompletedUpload>) {
        let now = SystemTime::now();
        let mut inner = self.inner.write();
        let iter = uploads
            .into_iter()
            .map(|u| FileRecord::from_upload(&u.meta, u.file.payload, now));
        inner.files.extend(iter);
    }

    /// Creates a folder, refusing empty or oversized names.
    pub fn create_folder(&self, name: impl AsRef<str>) -> bool {
        match FolderRecord::create(name) {
            Some(folder) => {
                debug!(name = %folder.name, "folder created");
                self.inner.write().folders.push(folder);
                true
            }
            None => false,
        }
    }

    /// Dispatches a file row menu action. Download and rename are
    /// placeholders until the service grows those calls.
    pub fn handle_file_action(&self, action: FileAction, index: usize) {
        if action == FileAction::Delete {
            let mut inner = self.inner.write();
            if index < inner.files.len() {
                inner.files.remove(index);
            }
        }
    }

    /// Dispatches a folder row menu action.
    pub fn handle_folder_action(&self, action: FolderAction, index: usize) {
        if action == FolderAction::Delete {
            let mut inner = self.inner.write();
            if index < inner.folders.len() {
                inner.folders.remove(index);
            }
        }
    }

    // ===== Upload modal =====

    /// Opens the upload modal.
    #[inline]
    pub fn open_upload_modal(&self) {
        self.inner.write().upload.open = true;
    }

    /// Closes the modal and drops its transient state. A batch already
    /// dispatched keeps running; only its view state disappears.
    pub fn close_upload_modal(&self) {
        let mut inner = self.inner.write();
        inner.upload.open = false;
        inner.upload.selected.clear();
        inner.upload.progress.clear();
        inner.upload.errors.clear();
    }

    /// Returns true if the modal is open.
    #[inline]
    #[must_use]
    pub fn upload_modal_open(&self) -> bool {
        self.inner.read().upload.open
    }

    /// Replaces the selection, resetting progress and errors.
    ///
    /// Refused while a batch is outstanding; the modal disables selection
    /// during an upload.
    pub fn select_files(&self, files: Vec<SelectedFile>) -> Result<(), UploadStateError> {
        let mut inner = self.inner.write();
        if inner.upload.uploading {
            return Err(UploadStateError::BatchInFlight);
        }
        inner.upload.progress = vec![0; files.len()];
        inner.upload.errors.clear();
        inner.upload.selected = files;
        Ok(())
    }

    /// Gets the current selection.
    #[must_use]
    pub fn selected_files(&self) -> Vec<SelectedFile> {
        self.inner.read().upload.selected.clone()
    }

    /// Gets the count of selected files.
    #[inline]
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.inner.read().upload.selected.len()
    }

    /// Marks the batch as started and hands back the files to upload.
    ///
    /// Resets progress to zero and clears errors from the previous attempt,
    /// matching the upload button handler.
    pub fn begin_upload_batch(&self) -> Result<Vec<SelectedFile>, UploadStateError> {
        let mut inner = self.inner.write();
        if inner.upload.uploading {
            return Err(UploadStateError::BatchInFlight);
        }
        if inner.upload.selected.is_empty() {
            return Err(UploadStateError::EmptySelection);
        }
        inner.upload.uploading = true;
        inner.upload.progress = vec![0; inner.upload.selected.len()];
        inner.upload.errors.clear();
        Ok(inner.upload.selected.clone())
    }

    /// Marks the batch as settled.
    #[inline]
    pub fn finish_upload_batch(&self) {
        self.inner.write().upload.uploading = false;
    }

    /// Returns true if a batch is outstanding.
    #[inline]
    #[must_use]
    pub fn is_uploading(&self) -> bool {
        self.inner.read().upload.uploading
    }

    /// Records a progress percent for one file. Progress never moves
    /// backwards and never exceeds 100.
    pub fn set_upload_progress(&self, index: usize, percent: u8) {
        let mut inner = self.inner.write();
        if let Some(slot) = inner.upload.progress.get_mut(index) {
            *slot = (*slot).max(percent.min(100));
        }
    }

    /// Per-file progress, index-aligned with the selection.
    #[must_use]
    pub fn upload_progress(&self) -> Vec<u8> {
        self.inner.read().upload.progress.clone()
    }

    /// Appends a batch error line.
    pub fn push_upload_error(&self, message: impl Into<String>) {
        self.inner.write().upload.errors.push(message.into());
    }

    /// Accumulated `"<filename>: <error>"` lines for the current batch.
    #[must_use]
    pub fn upload_errors(&self) -> Vec<String> {
        self.inner.read().upload.errors.clone()
    }

    /// Clears selection and progress after a successful batch.
    pub fn clear_upload_selection(&self) {
        let mut inner = self.inner.write();
        inner.upload.selected.clear();
        inner.upload.progress.clear();
    }
}

impl Default for AppState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn selected(name: &str) -> SelectedFile {
        SelectedFile::new(name, "text/plain", None, "data")
    }

    // ===== Upload modal =====

    #[test]
    fn selection_resets_progress_and_errors() {
        let state = AppState::new();
        state.push_upload_error("old: boom");
        state
            .select_files(vec![selected("a"), selected("b"), selected("c")])
            .unwrap();

        assert_eq!(state.upload_progress(), vec![0, 0, 0]);
        assert!(state.upload_errors().is_empty());
    }

    #[test]
    fn progress_entries_match_selection_count() {
        let state = AppState::new();
        for count in [1usize, 4, 9] {
            let files = (0..count).map(|i| selected(&format!("f{i}"))).collect();
            state.select_files(files).unwrap();
            assert_eq!(state.selected_count(), count);
            assert_eq!(state.upload_progress().len(), count);
        }
    }

    #[test]
    fn selection_refused_while_uploading() {
        let state = AppState::new();
        state.select_files(vec![selected("a")]).unwrap();
        let _files = state.begin_upload_batch().unwrap();

        assert_eq!(
            state.select_files(vec![selected("b")]).unwrap_err(),
            UploadStateError::BatchInFlight
        );
        assert_eq!(
            state.begin_upload_batch().unwrap_err(),
            UploadStateError::BatchInFlight
        );

        state.finish_upload_batch();
        assert!(state.select_files(vec![selected("b")]).is_ok());
    }

    #[test]
    fn empty_selection_cannot_start_batch() {
        let state = AppState::new();
        assert_eq!(
            state.begin_upload_batch().unwrap_err(),
            UploadStateError::EmptySelection
        );
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let state = AppState::new();
        state.select_files(vec![selected("a")]).unwrap();

        state.set_upload_progress(0, 40);
        state.set_upload_progress(0, 30); // stale tick must not regress
        assert_eq!(state.upload_progress(), vec![40]);

        state.set_upload_progress(0, 200);
        assert_eq!(state.upload_progress(), vec![100]);

        // Out-of-range index is ignored.
        state.set_upload_progress(5, 50);
        assert_eq!(state.upload_progress(), vec![100]);
    }

    #[test]
    fn close_modal_drops_transient_state() {
        let state = AppState::new();
        state.open_upload_modal();
        state.select_files(vec![selected("a")]).unwrap();
        state.push_upload_error("a: boom");

        state.close_upload_modal();
        assert!(!state.upload_modal_open());
        assert!(state.selected_files().is_empty());
        assert!(state.upload_progress().is_empty());
        assert!(state.upload_errors().is_empty());
    }

    // ===== Listing =====

    #[test]
    fn folder_create_and_delete() {
        let state = AppState::new();
        assert!(state.create_folder("projects"));
        assert!(!state.create_folder("   "));
        assert_eq!(state.displayed_folders().len(), 1);

        state.handle_folder_action(FolderAction::Rename, 0); // no-op
        assert_eq!(state.displayed_folders().len(), 1);

        state.handle_folder_action(FolderAction::Delete, 0);
        assert!(state.displayed_folders().is_empty());
    }

    #[test]
    fn file_delete_out_of_range_is_ignored() {
        let state = AppState::new();
        state.handle_file_action(FileAction::Delete, 3);
        assert_eq!(state.file_count(), 0);
    }

    #[test]
    fn section_switching() {
        let state = AppState::new();
        assert_eq!(state.section(), Section::MyFiles);
        state.set_section(Section::Trash);
        assert_eq!(state.section(), Section::Trash);
        assert_eq!(state.section().empty_state().0, "Trash is empty");
    }

    // ===== Concurrent access =====

    #[test]
    fn concurrent_progress_ticks() {
        let state = AppState::new();
        state
            .select_files((0..4).map(|i| selected(&format!("f{i}"))).collect())
            .unwrap();
        let _files = state.begin_upload_batch().unwrap();

        let mut handles = vec![];
        for i in 0..4 {
            let state = state.clone();
            handles.push(thread::spawn(move || {
                for pct in [10u8, 50, 100] {
                    state.set_upload_progress(i, pct);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(state.upload_progress(), vec![100, 100, 100, 100]);
    }
}
