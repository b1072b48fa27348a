//! Named full-document snapshots held in the
//! remote store only, with exactly one active record per user. There is no
//! local fallback here: versions are a remote concept and failures surface
//! as explicit errors.

pub mod handlers;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::cv::Cv;
use crate::models::version::CvVersionRow;
use crate::storage::{NewVersion, RemoteError, RemoteStore};

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("version {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub struct VersionManager {
    remote: Arc<dyn RemoteStore>,
    call_timeout: Duration,
}

impl VersionManager {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        VersionManager {
            remote,
            call_timeout: Duration::from_secs(10),
        }
    }

    #[cfg(test)]
    pub fn with_timeout(remote: Arc<dyn RemoteStore>, call_timeout: Duration) -> Self {
        VersionManager {
            remote,
            call_timeout,
        }
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, VersionError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(VersionError::Remote(RemoteError::Timeout)),
        }
    }

    /// All versions for the user, most recently updated first.
    pub async fn list(&self, user: Uuid) -> Result<Vec<CvVersionRow>, VersionError> {
        self.call(self.remote.list_versions(user)).await
    }

    /// Snapshots the given document as a new version and makes it the active
    /// one. Deactivation of the previous active record happens atomically
    /// inside the store operation.
    pub async fn create(
        &self,
        user: Uuid,
        cv: &Cv,
        template: &str,
        title: &str,
    ) -> Result<CvVersionRow, VersionError> {
        let row = self
            .call(self.remote.insert_version(
                user,
                NewVersion {
                    cv_data: cv,
                    template,
                    title,
                    active: true,
                },
            ))
            .await?;
        info!("created version {} ({title}) for user {user}", row.id);
        Ok(row)
    }

    /// Makes the target version active. Reloading the document into the
    /// session store is the caller's separate step, so the UI can show a
    /// loading transition between the two.
    pub async fn switch_active(&self, user: Uuid, id: Uuid) -> Result<CvVersionRow, VersionError> {
        match self.call(self.remote.set_active(user, id)).await? {
            Some(row) => {
                info!("switched active version to {id} for user {user}");
                Ok(row)
            }
            None => Err(VersionError::NotFound(id)),
        }
    }

    /// Copies an existing version into a new inactive record titled
    /// `"<title> (Copy)"`. The source's active flag is untouched.
    pub async fn duplicate(&self, user: Uuid, id: Uuid) -> Result<CvVersionRow, VersionError> {
        let source = self
            .call(self.remote.fetch_version(user, id))
            .await?
            .ok_or(VersionError::NotFound(id))?;

        let title = format!("{} (Copy)", source.title);
        self.call(self.remote.insert_version(
            user,
            NewVersion {
                cv_data: &source.cv_data.0,
                template: &source.template,
                title: &title,
                active: false,
            },
        ))
        .await
    }

    /// Deletes the record. Deleting the active version auto-activates the
    /// most recently updated remaining version, so the user is never left
    /// with zero active versions while any exist.
    pub async fn delete(&self, user: Uuid, id: Uuid) -> Result<(), VersionError> {
        let target = self
            .call(self.remote.fetch_version(user, id))
            .await?
            .ok_or(VersionError::NotFound(id))?;

        if !self.call(self.remote.delete_version(user, id)).await? {
            return Err(VersionError::NotFound(id));
        }
        info!("deleted version {id} for user {user}");

        if target.is_active {
            let remaining = self.call(self.remote.list_versions(user)).await?;
            if let Some(next) = remaining.first() {
                self.call(self.remote.set_active(user, next.id)).await?;
                info!("auto-activated version {} after deleting the active one", next.id);
            }
        }
        Ok(())
    }
}
