//! File and folder domain model.
//!
//! - [`record`]: the records the listing views hold — selected files waiting
//!   to be uploaded, uploaded files, and user-created folders
//! - [`listing`]: client-side sort and filter applied on every render

pub mod listing;
pub mod record;

pub use listing::{FilterKey, Section, SortKey};
pub use record::{FileRecord, FolderRecord, SelectedFile};
