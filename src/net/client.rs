//! HTTP boundary with the Doctracer service.
//!
//! Every outbound call goes through [`ApiClient`]: a shared base URL, bearer
//! token injection from the session store, and a uniform [`ApiError`] shape
//! for transport and server failures. Response bodies are decoded into
//! explicit per-endpoint types rather than inspected dynamically.
//!
//! An authorization failure (401 or 403) from any call clears the persisted
//! token as a side effect; the caller must re-authenticate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::app::session::SessionStore;
use crate::files::record::SelectedFile;

/// Default service route when `DOCTRACER_API_URL` is not set.
const DEFAULT_API_ROUTE: &str = "http://20.0.0.222:8000";

/// Environment variable overriding the service route.
const API_URL_ENV: &str = "DOCTRACER_API_URL";

/// Chunk size for streamed upload bodies. Each chunk handed to the transport
/// advances the progress callback.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Errors surfaced by the API client.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(Arc<str>),

    /// The service answered with a non-success status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: Arc<str> },

    /// The service rejected the credentials; the persisted token has been
    /// cleared.
    #[error("not authorized")]
    Unauthorized,

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(Arc<str>),
}

impl ApiError {
    #[inline]
    fn transport(e: impl std::fmt::Display) -> Self {
        Self::Transport(Arc::from(e.to_string()))
    }

    #[inline]
    fn decode(e: impl std::fmt::Display) -> Self {
        Self::Decode(Arc::from(e.to_string()))
    }
}

/// Payload for `POST send-otp`.
#[derive(Debug, Clone, Serialize)]
pub struct SendOtpRequest {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Payload for `POST verify-otp`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest {
    pub otpcode: String,
    pub email: String,
}

/// Payload for the registration endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Generic `{success, message?}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Registration response carrying the optional access token.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<RegisterData>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterData {
    #[serde(default)]
    pub token: Option<String>,
}

/// File metadata returned by the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    /// Millis since epoch, when the service reports it.
    #[serde(default)]
    pub last_modified: Option<u64>,
}

/// Byte-progress callback: `(bytes_sent, total_bytes)`.
pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

/// HTTP client for the Doctracer API.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    /// Creates a client against an explicit base URL (the `/api/` prefix
    /// included). A trailing slash is ensured.
    #[must_use]
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url,
            session,
        }
    }

    /// Creates a client from `DOCTRACER_API_URL` (or the default route),
    /// appending the `/api/` prefix.
    #[must_use]
    pub fn from_env(session: SessionStore) -> Self {
        let route = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_ROUTE.to_string());
        Self::new(format!("{}/api/", route.trim_end_matches('/')), session)
    }

    /// Resolves a path against the base URL. The empty path addresses the
    /// API root itself (the registration endpoint).
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds the bearer header from the session token, if one is held.
    fn bearer(&self) -> Option<HeaderValue> {
        let token = self.session.token()?;
        HeaderValue::from_str(&format!("Bearer {token}")).ok()
    }

    /// Clears the persisted token on an authorization failure.
    async fn enforce_auth(&self, status: StatusCode) -> Result<(), ApiError> {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = %status, "authorization failure, clearing persisted token");
            self.session.clear_token().await;
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let request = match self.bearer() {
            Some(header) => request.header(AUTHORIZATION, header),
            None => request,
        };

        let response = request.send().await.map_err(ApiError::transport)?;
        let status = response.status();
        self.enforce_auth(status).await?;

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: Arc::from(server_message(&body, status)),
            });
        }

        response.json::<T>().await.map_err(ApiError::decode)
    }

    /// `GET <path>`, decoding the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(self.http.get(self.endpoint(path))).await
    }

    /// `POST <path>` with a JSON payload, decoding the JSON response.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<T, ApiError> {
        self.execute(self.http.post(self.endpoint(path)).json(payload))
            .await
    }

    /// `PUT <path>` with a JSON payload, decoding the JSON response.
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<T, ApiError> {
        self.execute(self.http.put(self.endpoint(path)).json(payload))
            .await
    }

    /// Requests a one-time code for the given identity.
    pub async fn send_otp(&self, request: &SendOtpRequest) -> Result<Ack, ApiError> {
        self.post("send-otp", request).await
    }

    /// Verifies a one-time code.
    pub async fn verify_otp(&self, request: &VerifyOtpRequest) -> Result<Ack, ApiError> {
        self.post("verify-otp", request).await
    }

    /// Submits the registration payload to the API root.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        self.post("", request).await
    }

    /// Uploads one file as multipart form data, invoking `on_progress` with
    /// `(bytes_sent, total_bytes)` as the streamed body advances.
    ///
    /// The form carries the raw payload under `file`, the derived parent
    /// folder under `folder_path` (empty for a flat selection), and the
    /// original relative path under `original_path`.
    #[instrument(skip(self, file, on_progress), fields(name = %file.name, size = file.size))]
    pub async fn upload(
        &self,
        file: &SelectedFile,
        on_progress: impl Fn(u64, u64) + Send + Sync + 'static,
    ) -> Result<FileMeta, ApiError> {
        let total = file.size;
        let on_progress: Arc<ProgressFn> = Arc::new(on_progress);
        on_progress(0, total);

        let part = Part::stream_with_length(progress_body(file.payload.clone(), on_progress), total)
            .file_name(file.name.to_string())
            .mime_str(&file.mime_type)
            .map_err(ApiError::transport)?;

        let form = Form::new()
            .part("file", part)
            .text("folder_path", file.folder_path().unwrap_or_default())
            .text("original_path", file.original_path());

        debug!("dispatching upload");
        self.execute(self.http.post(self.endpoint("upload")).multipart(form))
            .await
    }
}

/// Chunked stream over a payload that reports bytes handed to the transport.
///
/// The iterator is consumed lazily as the transport pulls chunks, so the
/// callback tracks bytes actually handed off.
fn progress_chunks(
    payload: Bytes,
    on_progress: Arc<ProgressFn>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    let total = payload.len() as u64;
    let sent = AtomicU64::new(0);

    let mut chunks = Vec::with_capacity(payload.len() / UPLOAD_CHUNK_SIZE + 1);
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + UPLOAD_CHUNK_SIZE).min(payload.len());
        chunks.push(payload.slice(offset..end));
        offset = end;
    }

    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        let so_far = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
        on_progress(so_far, total);
        Ok::<Bytes, std::io::Error>(chunk)
    }))
}

/// Wraps a payload in a chunked body that reports bytes handed to the
/// transport.
fn progress_body(payload: Bytes, on_progress: Arc<ProgressFn>) -> Body {
    Body::wrap_stream(progress_chunks(payload, on_progress))
}

/// Pulls a human-readable message out of an error body, falling back to the
/// status reason.
fn server_message(body: &str, status: StatusCode) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message {
            if !message.is_empty() {
                return message;
            }
        }
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
