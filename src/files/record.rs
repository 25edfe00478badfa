//! File and folder records.
//!
//! [`SelectedFile`] is a user-chosen file reference that lives only for one
//! upload session. [`FileRecord`] is a successfully uploaded file as the
//! listing knows it, and [`FolderRecord`] is a user-created folder. Records
//! are never mutated after creation except by deletion.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::net::client::FileMeta;

/// Fallback MIME type when nothing better is known.
const OCTET_STREAM: &str = "application/octet-stream";

/// A user-chosen file reference.
///
/// Ephemeral: exists only for the duration of one upload session and is
/// discarded once the upload completes or the workflow closes. The relative
/// path is opaque to the client; it is only split to derive a synthetic
/// folder grouping for display and the `folder_path` request field.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// The file name (no directory components).
    pub name: Arc<str>,
    /// Size in bytes.
    pub size: u64,
    /// MIME type as reported at selection time.
    pub mime_type: Arc<str>,
    /// Last-modified timestamp.
    pub last_modified: SystemTime,
    /// Relative path when the file came from a folder tree, e.g.
    /// `photos/2024/cat.png`. `None` for a flat selection.
    pub relative_path: Option<String>,
    /// The raw file payload.
    pub payload: Bytes,
}

impl SelectedFile {
    /// Creates a selected file from in-memory data.
    #[must_use]
    pub fn new(
        name: impl AsRef<str>,
        mime_type: impl AsRef<str>,
        relative_path: Option<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        let payload = payload.into();
        Self {
            name: Arc::from(name.as_ref()),
            size: payload.len() as u64,
            mime_type: Arc::from(mime_type.as_ref()),
            last_modified: SystemTime::now(),
            relative_path,
            payload,
        }
    }

    /// Reads a file from disk into a selected-file reference.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to stat {}", path.display()))?;

        let name: Arc<str> = path
            .file_name()
            .map(|n| n.to_string_lossy().into())
            .unwrap_or_else(|| Arc::from("unknown"));
        let mime_type = Arc::from(mime_for_name(&name));

        Ok(Self {
            name,
            size: payload.len() as u64,
            mime_type,
            last_modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
            relative_path: None,
            payload: Bytes::from(payload),
        })
    }

    /// Best-effort parent folder derived by stripping the last path segment
    /// from the relative path. `None` when the file has no nested path.
    #[must_use]
    pub fn folder_path(&self) -> Option<String> {
        let path = self.relative_path.as_deref()?;
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() > 1 {
            Some(parts[..parts.len() - 1].join("/"))
        } else {
            None
        }
    }

    /// The path sent as `original_path`: the relative path, or the bare name
    /// when the file was selected flat.
    #[must_use]
    pub fn original_path(&self) -> String {
        self.relative_path
            .clone()
            .unwrap_or_else(|| self.name.to_string())
    }
}

/// Guesses a MIME type from the file name extension.
///
/// The service echoes the type back in upload responses; this is only used
/// when selecting files from disk where no browser-style type is available.
fn mime_for_name(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return OCTET_STREAM,
    };
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "js" => "application/javascript",
        "py" => "text/x-python",
        "txt" => "text/plain",
        _ => OCTET_STREAM,
    }
}

/// A successfully uploaded file as known to the listing view.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// The file name.
    pub name: Arc<str>,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime_type: Arc<str>,
    /// Last-modified timestamp reported by the service, millis since epoch.
    pub last_modified: Option<u64>,
    /// When the upload completed.
    pub uploaded_at: SystemTime,
    /// Download counter. Static until the service reports real numbers.
    pub downloads: u64,
    /// The original payload, kept only for local preview.
    pub payload: Bytes,
}

impl FileRecord {
    /// Builds a record from an upload response and the original payload.
    #[must_use]
    pub fn from_upload(meta: &FileMeta, payload: Bytes, uploaded_at: SystemTime) -> Self {
        Self {
            name: Arc::from(meta.name.as_str()),
            size: meta.size,
            mime_type: Arc::from(meta.mime_type.as_str()),
            last_modified: meta.last_modified,
            uploaded_at,
            downloads: 0,
            payload,
        }
    }

    /// Returns true if the file can be shown as an image thumbnail.
    #[inline]
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Maximum length accepted for a folder name.
pub const MAX_FOLDER_NAME_LEN: usize = 64;

/// A user-created folder.
///
/// The nested collections are currently never populated; the service has no
/// move-into-folder call yet.
#[derive(Debug, Clone)]
pub struct FolderRecord {
    /// The folder name, trimmed.
    pub name: Arc<str>,
    /// When the folder was created.
    pub created_at: SystemTime,
    /// Files inside the folder.
    pub files: Vec<FileRecord>,
    /// Nested folders.
    pub folders: Vec<FolderRecord>,
}

impl FolderRecord {
    /// Creates a folder record, trimming the name.
    ///
    /// Returns `None` for an empty (or whitespace-only) name or one longer
    /// than [`MAX_FOLDER_NAME_LEN`] — the create action is disabled for
    /// those, so this is a guard rather than an error.
    #[must_use]
    pub fn create(name: impl AsRef<str>) -> Option<Self> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() || trimmed.len() > MAX_FOLDER_NAME_LEN {
            return None;
        }
        Some(Self {
            name: Arc::from(trimmed),
            created_at: SystemTime::now(),
            files: Vec::new(),
            folders: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected(name: &str, rel: Option<&str>) -> SelectedFile {
        SelectedFile::new(name, "text/plain", rel.map(str::to_string), "data")
    }

    #[test]
    fn folder_path_strips_last_segment() {
        let file = selected("cat.png", Some("photos/2024/cat.png"));
        assert_eq!(file.folder_path().as_deref(), Some("photos/2024"));

        let file = selected("cat.png", Some("photos/cat.png"));
        assert_eq!(file.folder_path().as_deref(), Some("photos"));
    }

    #[test]
    fn folder_path_none_without_nesting() {
        // A bare relative path has no parent.
        let file = selected("cat.png", Some("cat.png"));
        assert_eq!(file.folder_path(), None);

        let file = selected("cat.png", None);
        assert_eq!(file.folder_path(), None);
    }

    #[test]
    fn original_path_falls_back_to_name() {
        let file = selected("cat.png", Some("photos/cat.png"));
        assert_eq!(file.original_path(), "photos/cat.png");

        let file = selected("cat.png", None);
        assert_eq!(file.original_path(), "cat.png");
    }

    #[test]
    fn selected_file_size_matches_payload() {
        let file = SelectedFile::new("a.txt", "text/plain", None, "hello");
        assert_eq!(file.size, 5);
    }

    #[test]
    fn mime_guess_by_extension() {
        assert_eq!(mime_for_name("photo.PNG"), "image/png");
        assert_eq!(mime_for_name("report.pdf"), "application/pdf");
        assert_eq!(mime_for_name("noextension"), OCTET_STREAM);
        assert_eq!(mime_for_name("archive.zip"), OCTET_STREAM);
    }

    #[test]
    fn folder_create_trims_and_validates() {
        let folder = FolderRecord::create("  projects  ").unwrap();
        assert_eq!(folder.name.as_ref(), "projects");
        assert!(folder.files.is_empty());
        assert!(folder.folders.is_empty());

        assert!(FolderRecord::create("   ").is_none());
        assert!(FolderRecord::create("x".repeat(65)).is_none());
        assert!(FolderRecord::create("x".repeat(64)).is_some());
    }

    #[test]
    fn file_record_from_upload() {
        let meta = FileMeta {
            name: "cat.png".into(),
            size: 4,
            mime_type: "image/png".into(),
            last_modified: Some(1_700_000_000_000),
        };
        let record = FileRecord::from_upload(&meta, Bytes::from_static(b"data"), SystemTime::now());
        assert_eq!(record.name.as_ref(), "cat.png");
        assert_eq!(record.downloads, 0);
        assert!(record.is_image());
    }
}
