//! Client-side sort and filter for the listing views.
//!
//! Both are pure functions over the in-memory collection, recomputed from
//! current state on every render. Nothing here persists filtered results.

use std::cmp::Ordering;

use crate::files::record::{FileRecord, FolderRecord};

/// MIME types counted as documents.
const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// MIME types counted as spreadsheets.
const SPREADSHEET_TYPES: &[&str] = &[
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// MIME types counted as presentations.
const PRESENTATION_TYPES: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

/// MIME types counted as development files.
const DEVELOPMENT_TYPES: &[&str] = &[
    "application/javascript",
    "text/x-python",
    "text/x-c",
    "text/x-c++",
    "text/x-java-source",
];

/// Sort key for the file listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Lexicographic, ascending.
    #[default]
    Name,
    /// Upload timestamp, newest first.
    Date,
    /// Largest first.
    Size,
    /// Most downloaded first.
    Downloads,
}

impl SortKey {
    /// Parses the toolbar key, defaulting to name order.
    #[must_use]
    pub fn parse(key: &str) -> Self {
        match key {
            "date" => Self::Date,
            "size" => Self::Size,
            "downloads" => Self::Downloads,
            _ => Self::Name,
        }
    }

    /// Comparator over two file records.
    #[must_use]
    pub fn compare(self, a: &FileRecord, b: &FileRecord) -> Ordering {
        match self {
            Self::Name => a.name.cmp(&b.name),
            Self::Date => b.uploaded_at.cmp(&a.uploaded_at),
            Self::Size => b.size.cmp(&a.size),
            Self::Downloads => b.downloads.cmp(&a.downloads),
        }
    }
}

/// Filter key for the file listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKey {
    #[default]
    All,
    /// Pass-through until visibility reaches the API.
    Public,
    /// Pass-through until visibility reaches the API.
    Private,
    Images,
    Video,
    Audio,
    Documents,
    Spreadsheets,
    Presentations,
    Development,
}

impl FilterKey {
    /// Parses the toolbar key, defaulting to all items.
    #[must_use]
    pub fn parse(key: &str) -> Self {
        match key {
            "public" => Self::Public,
            "private" => Self::Private,
            "images" => Self::Images,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "documents" => Self::Documents,
            "spreadsheets" => Self::Spreadsheets,
            "presentations" => Self::Presentations,
            "development" => Self::Development,
            _ => Self::All,
        }
    }

    /// Predicate over a MIME type.
    #[must_use]
    pub fn matches(self, mime_type: &str) -> bool {
        match self {
            Self::All | Self::Public | Self::Private => true,
            Self::Images => mime_type.starts_with("image/"),
            Self::Video => mime_type.starts_with("video/"),
            Self::Audio => mime_type.starts_with("audio/"),
            Self::Documents => DOCUMENT_TYPES.contains(&mime_type),
            Self::Spreadsheets => SPREADSHEET_TYPES.contains(&mime_type),
            Self::Presentations => PRESENTATION_TYPES.contains(&mime_type),
            Self::Development => DEVELOPMENT_TYPES.contains(&mime_type),
        }
    }
}

/// Applies the filter then the sort, leaving the source collection intact.
#[must_use]
pub fn displayed_files(files: &[FileRecord], filter: FilterKey, sort: SortKey) -> Vec<FileRecord> {
    let mut shown: Vec<FileRecord> = files
        .iter()
        .filter(|f| filter.matches(&f.mime_type))
        .cloned()
        .collect();
    shown.sort_by(|a, b| sort.compare(a, b));
    shown
}

/// Folders are always shown in name order.
#[must_use]
pub fn displayed_folders(folders: &[FolderRecord]) -> Vec<FolderRecord> {
    let mut shown = folders.to_vec();
    shown.sort_by(|a, b| a.name.cmp(&b.name));
    shown
}

/// The listing sections of the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    MyFiles,
    Recent,
    Shared,
    Trash,
}

impl Section {
    /// Section title shown above the listing.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::MyFiles => "My Files",
            Self::Recent => "Recent",
            Self::Shared => "Shared",
            Self::Trash => "Trash",
        }
    }

    /// Headline and detail copy shown when the section has nothing to list.
    #[must_use]
    pub fn empty_state(self) -> (&'static str, &'static str) {
        match self {
            Self::MyFiles => ("This folder is empty", "You don't have any folders"),
            Self::Recent => ("No recent files", "You haven't opened any files recently"),
            Self::Shared => ("No shared files", "Nothing has been shared with you"),
            Self::Trash => ("Trash is empty", "You haven't deleted any files"),
        }
    }
}
