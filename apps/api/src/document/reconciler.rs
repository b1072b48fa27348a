//! Persistence reconciliation: every settled burst of mutations is written
//! to the local fallback store unconditionally and to the remote record
//! store when a session is authenticated. Local durability is sufficient for
//! the user to keep working, so a remote failure with a good local write
//! still reports `Saved` (with the remote error attached diagnostically).

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::canonical;
use crate::document::status::SaveStatus;
use crate::document::store::CvStore;
use crate::models::cv::Cv;
use crate::storage::{NewVersion, RemoteError};

/// Title given to the remote record the first time an authenticated session
/// saves without any existing active version.
const DEFAULT_VERSION_TITLE: &str = "My CV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTarget {
    Remote,
    LocalOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub target: SaveTarget,
    /// Remote failure that was absorbed because the local write succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save already in progress")]
    InProgress,

    #[error("save failed: {0}")]
    Failed(String),
}

enum RemoteOutcome {
    Written,
    SkippedGuest,
    Failed(RemoteError),
}

struct Attempt {
    local_ok: bool,
    local_error: Option<String>,
    remote: RemoteOutcome,
}

async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout),
    }
}

impl CvStore {
    /// Runs the full save algorithm immediately, bypassing the debounce.
    /// A save arriving while another is in flight is rejected outright; the
    /// internal transient-failure retry does not re-trigger that guard.
    pub async fn save_now(&self) -> Result<SaveReport, SaveError> {
        if self.saving.swap(true, Ordering::SeqCst) {
            return Err(SaveError::InProgress);
        }
        self.status.set(SaveStatus::Saving);

        let mut attempt = self.save_once().await;
        if let RemoteOutcome::Failed(error) = &attempt.remote {
            if error.is_transient() {
                debug!("transient remote failure ({error}); retrying once");
                tokio::time::sleep(self.opts.retry_backoff).await;
                // Status stays `Saving` across the retry; no UI flicker.
                attempt = self.save_once().await;
            }
        }

        let result = self.classify(attempt);
        let (status, reset_after) = match &result {
            Ok(_) => (SaveStatus::Saved, self.opts.saved_reset_after),
            Err(_) => (SaveStatus::Error, self.opts.error_reset_after),
        };
        let generation = self.status.set(status);
        self.status.settle_to_idle(reset_after, generation);
        self.saving.store(false, Ordering::SeqCst);
        result
    }

    fn classify(&self, attempt: Attempt) -> Result<SaveReport, SaveError> {
        match attempt.remote {
            RemoteOutcome::Written => Ok(SaveReport {
                target: SaveTarget::Remote,
                remote_error: None,
            }),
            RemoteOutcome::SkippedGuest if attempt.local_ok => Ok(SaveReport {
                target: SaveTarget::LocalOnly,
                remote_error: None,
            }),
            RemoteOutcome::Failed(error) if attempt.local_ok => {
                warn!("remote save failed, local copy is current: {error}");
                Ok(SaveReport {
                    target: SaveTarget::LocalOnly,
                    remote_error: Some(error.to_string()),
                })
            }
            RemoteOutcome::SkippedGuest => Err(SaveError::Failed(
                attempt
                    .local_error
                    .unwrap_or_else(|| "local store write failed".to_string()),
            )),
            RemoteOutcome::Failed(error) => Err(SaveError::Failed(format!(
                "remote: {error}; local: {}",
                attempt
                    .local_error
                    .unwrap_or_else(|| "write failed".to_string())
            ))),
        }
    }

    /// One pass of the save algorithm: canonicalize, local write, then the
    /// remote write if the session is authenticated.
    async fn save_once(&self) -> Attempt {
        let snapshot = canonical::canonicalize(&self.snapshot());

        let (local_ok, local_error) = match serde_json::to_string(&snapshot) {
            Ok(json) => match self.local.set(&self.opts.local_key, &json) {
                Ok(()) => (true, None),
                Err(e) => {
                    // Quota exhaustion is non-fatal; the remote path decides.
                    warn!("local store write failed: {e}");
                    (false, Some(e.to_string()))
                }
            },
            Err(e) => (false, Some(format!("serialize: {e}"))),
        };

        let remote = self.write_remote(&snapshot).await;
        Attempt {
            local_ok,
            local_error,
            remote,
        }
    }

    async fn write_remote(&self, snapshot: &Cv) -> RemoteOutcome {
        let user = match with_timeout(self.opts.auth_timeout, self.auth.current_user()).await {
            Ok(Some(user)) => user,
            Ok(None) => return RemoteOutcome::SkippedGuest,
            Err(e) => return RemoteOutcome::Failed(e),
        };

        let active = match with_timeout(
            self.opts.data_call_timeout,
            self.remote.fetch_active(user),
        )
        .await
        {
            Ok(active) => active,
            Err(e) => return RemoteOutcome::Failed(e),
        };

        let write = match active {
            Some(row) => with_timeout(
                self.opts.data_call_timeout,
                async {
                    self.remote
                        .update_version(user, row.id, snapshot, &snapshot.template_id, &row.title)
                        .await
                        .map(|_| ())
                },
            )
            .await,
            None => with_timeout(
                self.opts.data_call_timeout,
                async {
                    self.remote
                        .insert_version(
                            user,
                            NewVersion {
                                cv_data: snapshot,
                                template: &snapshot.template_id,
                                title: DEFAULT_VERSION_TITLE,
                                active: true,
                            },
                        )
                        .await
                        .map(|_| ())
                },
            )
            .await,
        };

        match write {
            Ok(()) => RemoteOutcome::Written,
            Err(e) => RemoteOutcome::Failed(e),
        }
    }

    /// Load chain: remote active record, then the local snapshot, then keep
    /// the default document. Every failure degrades to the next fallback.
    pub async fn load(&self) {
        match self.load_remote().await {
            Ok(Some(cv)) => {
                self.replace(cv);
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("remote load failed, trying local fallback: {e}"),
        }

        match self.local.get(&self.opts.local_key) {
            Ok(Some(json)) => match serde_json::from_str::<Cv>(&json) {
                Ok(cv) => self.replace(cv),
                Err(e) => warn!("local snapshot unreadable, starting blank: {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!("local store read failed, starting blank: {e}"),
        }
    }

    async fn load_remote(&self) -> Result<Option<Cv>, RemoteError> {
        let user = match with_timeout(self.opts.auth_timeout, self.auth.current_user()).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        let row =
            with_timeout(self.opts.data_call_timeout, self.remote.fetch_active(user)).await?;
        Ok(row.map(|r| r.cv_data.0))
    }

    /// Background autosave loop: waits for a mutation, lets the burst settle
    /// through the debounce window, then saves the final state. Intermediate
    /// states inside one window are intentionally never persisted.
    pub fn spawn_autosave(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                store.dirty.notified().await;
                if !store.opts.debounce.is_zero() {
                    // Every further mutation rearms the window.
                    while tokio::time::timeout(store.opts.debounce, store.dirty.notified())
                        .await
                        .is_ok()
                    {}
                }
                match store.save_now().await {
                    Ok(report) => debug!(save_target = ?report.target, "autosave complete"),
                    Err(SaveError::InProgress) => {
                        // An explicit save is in flight and its snapshot may
                        // predate the settled mutations. Re-arm the loop so
                        // the settled state is retried instead of dropped.
                        debug!("save already in flight, rescheduling autosave");
                        tokio::time::sleep(store.opts.retry_backoff).await;
                        store.dirty.notify_one();
                    }
                    Err(e) => warn!("autosave failed: {e}"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::store::StoreOptions;
    use crate::models::cv::{PersonalInfoPatch, WorkExperienceEntry, WorkExperiencePatch};
    use crate::storage::memory::{MemoryLocal, MemoryRemote};
    use crate::storage::{LocalStore, RemoteStore, StaticAuth};
    use uuid::Uuid;

    struct Harness {
        store: Arc<CvStore>,
        remote: Arc<MemoryRemote>,
        local: Arc<MemoryLocal>,
    }

    fn harness(auth: StaticAuth) -> Harness {
        let remote = Arc::new(MemoryRemote::new());
        let local = Arc::new(MemoryLocal::new());
        let store = CvStore::new(
            remote.clone(),
            local.clone(),
            Arc::new(auth),
            StoreOptions {
                retry_backoff: Duration::from_millis(10),
                ..StoreOptions::default()
            },
        );
        Harness {
            store,
            remote,
            local,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_save_writes_local_only() {
        let h = harness(StaticAuth::guest());
        h.store.update_personal_info(PersonalInfoPatch {
            full_name: Some("Jane Doe".to_string()),
            ..Default::default()
        });

        let report = h.store.save_now().await.unwrap();
        assert_eq!(report.target, SaveTarget::LocalOnly);
        assert!(report.remote_error.is_none());

        let json = h.local.get("folio.cv.current").unwrap().unwrap();
        assert!(json.contains("\"full_name\":\"Jane Doe\""));
        // Guest mode never touches the remote store.
        assert_eq!(h.remote.call_count(), 0);
        assert_eq!(h.store.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_save_inserts_then_updates_active_record() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));

        h.store.update_personal_info(PersonalInfoPatch {
            full_name: Some("Jane".to_string()),
            ..Default::default()
        });
        let report = h.store.save_now().await.unwrap();
        assert_eq!(report.target, SaveTarget::Remote);
        assert_eq!(h.remote.rows().len(), 1);
        assert!(h.remote.rows()[0].is_active);

        // Second save updates the same record in place.
        h.store.update_personal_info(PersonalInfoPatch {
            full_name: Some("Jane Doe".to_string()),
            ..Default::default()
        });
        h.store.save_now().await.unwrap();
        let rows = h.remote.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cv_data.0.personal_info.full_name, "Jane Doe");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retries_exactly_once_then_saves() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));
        h.store.update_personal_info(PersonalInfoPatch {
            full_name: Some("Jane Doe".to_string()),
            ..Default::default()
        });
        // First fetch_active call times out; the retry pass succeeds.
        h.remote.fail_next(RemoteError::Timeout);

        let report = h.store.save_now().await.unwrap();
        assert_eq!(report.target, SaveTarget::Remote);
        // Attempt one: 1 failed call. Attempt two: fetch_active + insert.
        assert_eq!(h.remote.call_count(), 3);

        let rows = h.remote.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cv_data.0.personal_info.full_name, "Jane Doe");
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_failures_degrade_to_local_with_diagnostic() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));
        h.remote.fail_next(RemoteError::Timeout);
        h.remote.fail_next(RemoteError::Timeout);

        let report = h.store.save_now().await.unwrap();
        // No third attempt: one retry only.
        assert_eq!(h.remote.call_count(), 2);
        assert_eq!(report.target, SaveTarget::LocalOnly);
        assert!(report.remote_error.is_some());
        assert_eq!(h.store.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_failure_is_not_retried() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));
        h.remote
            .fail_next(RemoteError::Backend("constraint violation".to_string()));

        let report = h.store.save_now().await.unwrap();
        assert_eq!(h.remote.call_count(), 1);
        assert_eq!(report.target, SaveTarget::LocalOnly);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_and_local_both_failing_is_an_error_status() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));
        h.local.set_quota_full(true);
        h.remote
            .fail_next(RemoteError::Backend("down".to_string()));

        let result = h.store.save_now().await;
        assert!(matches!(result, Err(SaveError::Failed(_))));
        assert_eq!(h.store.status(), SaveStatus::Error);
        // Let the reset task register its timer before the clock moves.
        tokio::task::yield_now().await;

        // Error status clears back to idle after its display window.
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(h.store.status(), SaveStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_failure_alone_does_not_fail_an_authenticated_save() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));
        h.local.set_quota_full(true);

        let report = h.store.save_now().await.unwrap();
        assert_eq!(report.target, SaveTarget::Remote);
        assert_eq!(h.store.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_save_is_rejected_while_first_is_in_flight() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));
        h.remote.set_latency(Duration::from_secs(1));

        let first = tokio::spawn({
            let store = h.store.clone();
            async move { store.save_now().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(h.store.status(), SaveStatus::Saving);

        let second = h.store.save_now().await;
        assert!(matches!(second, Err(SaveError::InProgress)));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_explicit_save_is_persisted_by_autosave() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));
        h.remote.set_latency(Duration::from_secs(3));
        let task = h.store.spawn_autosave();

        h.store.update_personal_info(PersonalInfoPatch {
            full_name: Some("Jane".to_string()),
            ..Default::default()
        });
        let explicit = tokio::spawn({
            let store = h.store.clone();
            async move { store.save_now().await }
        });
        tokio::task::yield_now().await;

        // This edit lands after the explicit save took its snapshot. The
        // debounce fires while that save is still in flight; the loop must
        // reschedule rather than drop the settled state.
        h.store.update_personal_info(PersonalInfoPatch {
            full_name: Some("Jane Doe".to_string()),
            ..Default::default()
        });

        for _ in 0..30 {
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }

        assert!(explicit.await.unwrap().is_ok());
        let rows = h.remote.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cv_data.0.personal_info.full_name, "Jane Doe");
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_canonicalized_snapshot_excludes_blank_bullets() {
        let h = harness(StaticAuth::guest());
        let exp = h
            .store
            .add_entry::<WorkExperienceEntry>(WorkExperiencePatch::default());
        h.store.add_bullet(exp, "real work".to_string()).unwrap();
        h.store.add_bullet(exp, "   ".to_string()).unwrap();

        h.store.save_now().await.unwrap();
        let json = h.local.get("folio.cv.current").unwrap().unwrap();
        let persisted: Cv = serde_json::from_str(&json).unwrap();
        assert_eq!(persisted.work_experience[0].bullets.len(), 1);
        assert_eq!(persisted.work_experience[0].bullets[0].text, "real work");
        // The in-memory document still holds the blank draft bullet.
        assert_eq!(h.store.snapshot().work_experience[0].bullets.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_prefers_remote_active_record() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));

        let mut remote_cv = Cv::default();
        remote_cv.personal_info.full_name = "Remote Jane".to_string();
        h.remote
            .insert_version(
                user,
                NewVersion {
                    cv_data: &remote_cv,
                    template: "classic",
                    title: "My CV",
                    active: true,
                },
            )
            .await
            .unwrap();
        h.local
            .set("folio.cv.current", &serde_json::to_string(&Cv::default()).unwrap())
            .unwrap();

        h.store.load().await;
        assert_eq!(h.store.snapshot().personal_info.full_name, "Remote Jane");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_falls_back_to_local_on_remote_failure() {
        let user = Uuid::new_v4();
        let h = harness(StaticAuth::authenticated(user));
        let mut local_cv = Cv::default();
        local_cv.personal_info.full_name = "Local Jane".to_string();
        h.local
            .set("folio.cv.current", &serde_json::to_string(&local_cv).unwrap())
            .unwrap();
        h.remote
            .fail_next(RemoteError::Unavailable("down".to_string()));

        h.store.load().await;
        assert_eq!(h.store.snapshot().personal_info.full_name, "Local Jane");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_with_no_data_keeps_default_document() {
        let h = harness(StaticAuth::guest());
        h.store.load().await;
        assert_eq!(h.store.snapshot(), Cv::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_coalesces_a_burst_into_one_write() {
        let h = harness(StaticAuth::guest());
        let task = h.store.spawn_autosave();

        for name in ["J", "Ja", "Jan", "Jane"] {
            h.store.update_personal_info(PersonalInfoPatch {
                full_name: Some(name.to_string()),
                ..Default::default()
            });
            tokio::time::advance(Duration::from_millis(500)).await;
        }
        // Let the window settle.
        tokio::time::advance(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;

        assert_eq!(h.local.write_count(), 1);
        let json = h.local.get("folio.cv.current").unwrap().unwrap();
        assert!(json.contains("\"full_name\":\"Jane\""));
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_does_not_schedule_a_save() {
        let h = harness(StaticAuth::guest());
        let task = h.store.spawn_autosave();

        let mut cv = Cv::default();
        cv.personal_info.full_name = "Loaded".to_string();
        h.store.replace(cv);

        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(h.local.write_count(), 0);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_debounce_saves_every_mutation() {
        let remote = Arc::new(MemoryRemote::new());
        let local = Arc::new(MemoryLocal::new());
        let store = CvStore::new(
            remote,
            local.clone(),
            Arc::new(StaticAuth::guest()),
            StoreOptions {
                debounce: Duration::ZERO,
                ..StoreOptions::default()
            },
        );
        let task = store.spawn_autosave();

        store.update_personal_info(PersonalInfoPatch {
            full_name: Some("A".to_string()),
            ..Default::default()
        });
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert!(local.write_count() >= 1);
        task.abort();
    }
}
