//! Doctracer client - file storage and sharing, headless
//!
//! A client library for the Doctracer file storage service: signup with OTP
//! verification, a folder/file browser model with client-side sort and
//! filter, and a concurrent upload workflow with per-file byte progress.
//! Rendering and routing stay outside; any front end can drive the state
//! handles exposed here.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: shared view state and the persisted session
//! - [`files`]: file/folder records plus the sort and filter machinery
//! - [`net`]: the HTTP client, auth flows, and the upload workflow
//!
//! # Example
//!
//! ```rust,ignore
//! use doctracer_client::app::{AppState, SessionStore};
//! use doctracer_client::net::{ApiClient, UploadManager};
//!
//! // Load the persisted session and build the client
//! let session = SessionStore::load().await?;
//! let client = ApiClient::from_env(session);
//!
//! // Select files and run an upload batch
//! let state = AppState::new();
//! state.select_files(files)?;
//! let outcome = UploadManager::new(client, state).upload_selected().await?;
//! ```

pub mod app;
pub mod files;
pub mod net;

pub use app::{AppState, SessionStore};
pub use net::ApiClient;
