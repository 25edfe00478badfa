//! Application state and session lifecycle.

pub mod session;
mod state;

pub use session::{SessionStore, UserData};
pub use state::{AppState, FileAction, FolderAction, UploadStateError};
