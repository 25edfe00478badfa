//! Session store: the client-held record of the authenticated identity.
//!
//! The store is an explicit context object passed to the components that
//! need it — nothing reads it ambiently. Two pieces survive restarts, both
//! under the config directory:
//!
//! - `access_token`: the raw bearer token string
//! - `session.json`: a versioned snapshot of the identity (`id`, `name`)
//!
//! The config directory defaults to `~/.config/doctracer` and can be
//! overridden with `DOCTRACER_CONFIG_DIR` (useful for running two instances
//! on one machine).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default configuration directory name.
const CONFIG_DIR: &str = "doctracer";

/// Environment variable overriding the config directory.
const CONFIG_DIR_ENV: &str = "DOCTRACER_CONFIG_DIR";

/// Well-known file name for the persisted access token.
const TOKEN_FILE: &str = "access_token";

/// File name for the identity snapshot.
const SESSION_FILE: &str = "session.json";

/// Snapshot format version. Bump on incompatible changes; mismatched
/// snapshots are discarded rather than migrated.
const SNAPSHOT_VERSION: u32 = 1;

/// Cached config directory path.
static CONFIG_DIR_CACHE: OnceCell<PathBuf> = OnceCell::new();

/// Errors that can occur while loading or persisting session state.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// Failed to locate or create the configuration directory.
    #[error("failed to access configuration directory: {0}")]
    ConfigDir(Arc<str>),

    /// Failed to read or write persisted session state.
    #[error("failed to persist session state: {0}")]
    Persistence(Arc<str>),
}

impl SessionError {
    #[inline]
    fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(Arc::from(msg.into()))
    }
}

/// The authenticated identity, empty until login or signup completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    /// Service-assigned identifier.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
}

impl UserData {
    /// Returns true if an identity is present.
    #[inline]
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.id.is_some()
    }
}

/// On-disk snapshot wrapper carrying the format version.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    user: UserData,
}

#[derive(Debug, Default)]
struct SessionInner {
    user: UserData,
    token: Option<String>,
}

/// Process-held session state with persistence across restarts.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionInner>>,
    dir: PathBuf,
}

impl SessionStore {
    /// Loads the session from the default config directory, creating the
    /// directory if needed. Starts empty when nothing was persisted.
    pub async fn load() -> Result<Self, SessionError> {
        let dir = config_dir()?;
        Self::load_from(dir).await
    }

    /// Loads the session from an explicit directory.
    pub async fn load_from(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SessionError::persistence(format!("create {}: {e}", dir.display())))?;

        let token = read_optional(&dir.join(TOKEN_FILE)).await?;
        let user = match read_optional(&dir.join(SESSION_FILE)).await? {
            Some(raw) => match serde_json::from_str::<Snapshot>(&raw) {
                Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => snapshot.user,
                Ok(snapshot) => {
                    warn!(
                        found = snapshot.version,
                        expected = SNAPSHOT_VERSION,
                        "discarding session snapshot with mismatched version"
                    );
                    UserData::default()
                }
                Err(e) => {
                    warn!(error = %e, "discarding unreadable session snapshot");
                    UserData::default()
                }
            },
            None => UserData::default(),
        };

        if user.is_present() {
            debug!(name = ?user.name, "restored session identity");
        }

        Ok(Self {
            inner: Arc::new(RwLock::new(SessionInner {
                user,
                token: token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            })),
            dir,
        })
    }

    /// Creates an empty in-memory store rooted at `dir` without touching disk.
    #[must_use]
    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner::default())),
            dir: dir.into(),
        }
    }

    /// Returns the current access token, if any.
    #[inline]
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.read().token.clone()
    }

    /// Returns true if a token is held.
    #[inline]
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.inner.read().token.is_some()
    }

    /// Stores and persists a new access token.
    pub async fn set_token(&self, token: impl Into<String>) -> Result<(), SessionError> {
        let token = token.into();
        self.inner.write().token = Some(token.clone());
        tokio::fs::write(self.dir.join(TOKEN_FILE), token.as_bytes())
            .await
            .map_err(|e| SessionError::persistence(format!("write token: {e}")))?;
        info!("access token updated");
        Ok(())
    }

    /// Clears the token from memory and disk.
    ///
    /// Called by the API client when the service answers 401 or 403; the
    /// caller must re-authenticate afterwards.
    pub async fn clear_token(&self) {
        self.inner.write().token = None;
        match tokio::fs::remove_file(self.dir.join(TOKEN_FILE)).await {
            Ok(()) => info!("access token cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "failed to remove persisted token"),
        }
    }

    /// Returns the current identity.
    #[inline]
    #[must_use]
    pub fn user(&self) -> UserData {
        self.inner.read().user.clone()
    }

    /// Stores and persists the identity.
    pub async fn set_user(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<(), SessionError> {
        let user = UserData {
            id: Some(id.into()),
            name: Some(name.into()),
        };
        self.inner.write().user = user.clone();
        self.save_snapshot(user).await
    }

    /// Resets the identity to empty and persists the reset.
    pub async fn clear_user(&self) -> Result<(), SessionError> {
        self.inner.write().user = UserData::default();
        self.save_snapshot(UserData::default()).await
    }

    /// Logs out: clears both the identity and the token.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.clear_user().await?;
        self.clear_token().await;
        info!("logged out");
        Ok(())
    }

    async fn save_snapshot(&self, user: UserData) -> Result<(), SessionError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            user,
        };
        let raw = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| SessionError::persistence(format!("encode snapshot: {e}")))?;
        tokio::fs::write(self.dir.join(SESSION_FILE), raw.as_bytes())
            .await
            .map_err(|e| SessionError::persistence(format!("write snapshot: {e}")))
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SessionStore")
            .field("dir", &self.dir)
            .field("user", &inner.user)
            .field("has_token", &inner.token.is_some())
            .finish()
    }
}

/// Resolves the config directory, honoring the environment override.
fn config_dir() -> Result<PathBuf, SessionError> {
    CONFIG_DIR_CACHE
        .get_or_try_init(|| {
            if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
                return Ok(PathBuf::from(dir));
            }
            dirs::config_dir()
                .map(|d| d.join(CONFIG_DIR))
                .ok_or_else(|| {
                    SessionError::ConfigDir(Arc::from("no config directory on this platform"))
                })
        })
        .cloned()
}

async fn read_optional(path: &Path) -> Result<Option<String>, SessionError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SessionError::persistence(format!(
            "read {}: {e}",
            path.display()
        ))),
    }
}
