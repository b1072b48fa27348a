//! Persistence collaborators. The document store talks to two targets: a
//! remote row store (authoritative when a session is authenticated) and a
//! local key-value fallback that is always reachable. Both are traits so
//! tests run against the in-memory backends with failure injection.

pub mod local;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::cv::Cv;
use crate::models::version::CvVersionRow;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote call timed out")]
    Timeout,

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store error: {0}")]
    Backend(String),
}

impl RemoteError {
    /// Transient failures are worth exactly one automatic retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Timeout | RemoteError::Unavailable(_))
    }
}

impl From<sqlx::Error> for RemoteError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(e) => RemoteError::Unavailable(e.to_string()),
            sqlx::Error::PoolTimedOut => RemoteError::Unavailable("pool timed out".to_string()),
            other => RemoteError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("local store quota exceeded")]
    QuotaExceeded,

    #[error("local store error: {0}")]
    Io(String),
}

/// Fields for a freshly inserted version record.
pub struct NewVersion<'a> {
    pub cv_data: &'a Cv,
    pub template: &'a str,
    pub title: &'a str,
    pub active: bool,
}

/// Row store for version records. Implementations must make the two
/// activation-shaped operations atomic: a failure mid-way leaves the
/// previously active record active, never zero active records.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_active(&self, user: Uuid) -> Result<Option<CvVersionRow>, RemoteError>;

    async fn fetch_version(&self, user: Uuid, id: Uuid)
        -> Result<Option<CvVersionRow>, RemoteError>;

    /// All versions for the user, most recently updated first.
    async fn list_versions(&self, user: Uuid) -> Result<Vec<CvVersionRow>, RemoteError>;

    /// Inserts a record; when `new.active` is set, atomically deactivates the
    /// user's other records in the same operation.
    async fn insert_version(
        &self,
        user: Uuid,
        new: NewVersion<'_>,
    ) -> Result<CvVersionRow, RemoteError>;

    /// Rewrites an existing record's content in place, refreshing its
    /// timestamp. Returns `None` for an unknown id.
    async fn update_version(
        &self,
        user: Uuid,
        id: Uuid,
        cv_data: &Cv,
        template: &str,
        title: &str,
    ) -> Result<Option<CvVersionRow>, RemoteError>;

    /// Atomically deactivates all of the user's records and activates the
    /// target. Returns `None` (with nothing changed) for an unknown id.
    async fn set_active(&self, user: Uuid, id: Uuid) -> Result<Option<CvVersionRow>, RemoteError>;

    /// Returns whether a record was deleted.
    async fn delete_version(&self, user: Uuid, id: Uuid) -> Result<bool, RemoteError>;
}

/// Session identity. `None` is guest mode, an expected branch rather than
/// an error.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<Uuid>, RemoteError>;
}

/// Fixed session identity: `Some(user)` for an authenticated session,
/// `None` for guest mode. The HTTP layer binds one per session store.
pub struct StaticAuth {
    user: Option<Uuid>,
}

impl StaticAuth {
    pub fn authenticated(user: Uuid) -> Self {
        StaticAuth { user: Some(user) }
    }

    pub fn guest() -> Self {
        StaticAuth { user: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user(&self) -> Result<Option<Uuid>, RemoteError> {
        Ok(self.user)
    }
}

/// Synchronous string key-value store holding the single current-document
/// slot. Quota exhaustion must be distinguishable from other I/O failures.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;
}
