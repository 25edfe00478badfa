//! Networking module for the Doctracer client
//!
//! This module provides everything that talks to the Doctracer service:
//!
//! - **Client**: the HTTP boundary — base URL, bearer auth, typed responses
//! - **Auth**: the signup step machine and login validation
//! - **Upload**: the concurrent upload batch workflow with byte progress
//!
//! # Architecture
//!
//! All calls flow through [`client::ApiClient`], which injects the session
//! token and normalizes failures into [`client::ApiError`]. The auth and
//! upload workflows are pure state machines driven by explicit transitions;
//! their `*Flow`/`*Manager` counterparts wire them to the live service.

pub mod auth;
pub mod client;
pub mod upload;

pub use auth::{AuthError, AuthFlow, LoginForm, OtpStatus, RegisterOutcome, SignupForm, SignupStep};
pub use client::{Ack, ApiClient, ApiError, FileMeta, RegisterResponse};
pub use upload::{BatchOutcome, CompletedUpload, UploadManager};
